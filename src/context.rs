use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::HandlerError;
use crate::operation::Operation;
use crate::progress::{NoopReporter, ProgressEvent, ProgressReporter};
use crate::session::Session;

/// Caller-supplied parameters for an operation.
pub type Params = serde_json::Map<String, Value>;

/// Session-bound context handed to an [`OperationHandler`](crate::OperationHandler).
///
/// The session is a snapshot taken just before the handler starts, so it
/// already contains every prerequisite result written earlier in the same
/// route call. Metadata written through [`set_metadata`](Self::set_metadata)
/// is persisted together with the handler's output, and only if the
/// handler succeeds.
pub struct OperationContext {
    operation: Operation,
    session: Session,
    metadata: BTreeMap<String, Value>,
    reporter: Arc<dyn ProgressReporter>,
    started_at: Instant,
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationContext")
            .field("operation", &self.operation)
            .field("session_id", &self.session.session_id)
            .field("pending_metadata", &self.metadata.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OperationContext {
    /// Creates a context that reports nowhere; useful for exercising a
    /// handler outside a router.
    pub fn new(operation: Operation, session: Session) -> Self {
        Self::with_reporter(operation, session, Arc::new(NoopReporter))
    }

    pub fn with_reporter(
        operation: Operation,
        session: Session,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            operation,
            session,
            metadata: BTreeMap::new(),
            reporter,
            started_at: Instant::now(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn session_id(&self) -> &str {
        &self.session.session_id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The cached output of another operation, if it has succeeded.
    pub fn result(&self, op: Operation) -> Option<&Value> {
        self.session.result(op)
    }

    /// Like [`result`](Self::result), but fails the handler when the
    /// output is missing.
    pub fn require_result(&self, op: Operation) -> Result<&Value, HandlerError> {
        self.result(op)
            .ok_or_else(|| HandlerError::failed(format!("{op} must be run first")))
    }

    /// Stages a metadata entry to be written with this operation's result.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Reads metadata, preferring entries staged by this handler.
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key).or_else(|| self.session.metadata(key))
    }

    /// Emits a free-form progress message.
    pub fn report(&self, message: impl Into<String>) {
        self.reporter.report(&ProgressEvent::Message {
            session_id: self.session.session_id.clone(),
            operation: self.operation,
            message: message.into(),
        });
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn into_metadata(self) -> BTreeMap<String, Value> {
        self.metadata
    }
}
