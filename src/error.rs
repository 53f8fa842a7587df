use crate::operation::Operation;
use thiserror::Error;

/// Where in the routing taxonomy a [`RouteError`] belongs.
///
/// Callers use this to decide whether to fix their request, follow the
/// continuation hint, or give up on the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing parameter; nothing was executed.
    Input,
    /// A dependency failed while the closure was being satisfied.
    Prerequisite,
    /// The requested operation itself failed.
    Target,
    /// The session store could not be read or written.
    SessionStore,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Input => write!(f, "input"),
            ErrorKind::Prerequisite => write!(f, "prerequisite"),
            ErrorKind::Target => write!(f, "target"),
            ErrorKind::SessionStore => write!(f, "session_store"),
        }
    }
}

/// Errors surfaced by [`Router::route`](crate::Router::route).
///
/// The router never panics or propagates handler errors directly; every
/// failure path ends up as one of these variants inside the returned
/// [`RouteOutcome`](crate::RouteOutcome).
///
/// # Non-Exhaustive
///
/// New variants may be added; match with a wildcard arm:
///
/// ```
/// use pipewright::{ErrorKind, RouteError};
///
/// fn describe(error: &RouteError) -> String {
///     match error {
///         RouteError::PrerequisiteFailed { prerequisite, requested, .. } => {
///             format!("{requested} blocked by {prerequisite}")
///         }
///         RouteError::OperationFailed { operation, details } => {
///             format!("{operation}: {details}")
///         }
///         other if other.kind() == ErrorKind::Input => format!("bad request: {other}"),
///         other => other.to_string(),
///     }
/// }
/// ```
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RouteError {
    /// A parameter required by the operation's input contract is missing
    /// or malformed.
    #[error("Invalid input for {operation}: {details}")]
    InvalidInput {
        operation: Operation,
        details: String,
    },

    /// The requested name does not identify a known operation.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The operation is known but no handler was registered for it.
    #[error("No handler registered for operation: {0}")]
    MissingHandler(Operation),

    /// A prerequisite failed, so the requested operation never ran.
    #[error("Prerequisite {prerequisite} of {requested} failed: {details}")]
    PrerequisiteFailed {
        prerequisite: Operation,
        requested: Operation,
        details: String,
    },

    /// The requested operation ran and failed.
    #[error("Operation failed: {operation}, details: {details}")]
    OperationFailed {
        operation: Operation,
        details: String,
    },

    /// The session store is unavailable.
    #[error("Session store unavailable: {0}")]
    Session(#[from] StoreError),
}

impl RouteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RouteError::InvalidInput { .. }
            | RouteError::UnknownOperation(_)
            | RouteError::MissingHandler(_) => ErrorKind::Input,
            RouteError::PrerequisiteFailed { .. } => ErrorKind::Prerequisite,
            RouteError::OperationFailed { .. } => ErrorKind::Target,
            RouteError::Session(_) => ErrorKind::SessionStore,
        }
    }

    /// The operation the recovery hint should be scoped to, if any.
    pub fn failed_operation(&self) -> Option<Operation> {
        match self {
            RouteError::PrerequisiteFailed { prerequisite, .. } => Some(*prerequisite),
            RouteError::OperationFailed { operation, .. } => Some(*operation),
            RouteError::InvalidInput { operation, .. } => Some(*operation),
            RouteError::MissingHandler(operation) => Some(*operation),
            RouteError::UnknownOperation(_) | RouteError::Session(_) => None,
        }
    }
}

/// Errors returned by an [`OperationHandler`](crate::OperationHandler).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The handler rejected its input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The handler ran and failed.
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(details: impl Into<String>) -> Self {
        HandlerError::Failed(details.into())
    }

    pub fn invalid_input(details: impl Into<String>) -> Self {
        HandlerError::InvalidInput(details.into())
    }
}

/// Errors raised by a [`SessionStore`](crate::SessionStore).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("session `{0}` not found")]
    NotFound(String),

    #[error("invalid session id `{0}`")]
    InvalidId(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while assembling a [`Router`](crate::Router).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid router configuration: {0}")]
    Invalid(String),
}
