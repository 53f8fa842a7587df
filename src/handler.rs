use async_trait::async_trait;
use serde_json::Value;

use crate::context::{OperationContext, Params};
use crate::error::HandlerError;

/// Parameters an operation needs before it can run.
///
/// The router checks the contract of the requested operation before
/// resolving any prerequisite, so a request with a missing parameter never
/// triggers side effects.
///
/// # Examples
///
/// ```
/// use pipewright::InputContract;
/// use serde_json::json;
///
/// let contract = InputContract::required(&["repo_path"]);
///
/// let params = json!({"repo_path": "/src/app"});
/// assert!(contract.check(params.as_object().unwrap()).is_ok());
///
/// let params = json!({"repo_path": ""});
/// assert!(contract.check(params.as_object().unwrap()).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputContract {
    pub required: &'static [&'static str],
}

impl InputContract {
    pub const fn none() -> Self {
        Self { required: &[] }
    }

    pub const fn required(required: &'static [&'static str]) -> Self {
        Self { required }
    }

    /// Returns a description of the first violated requirement.
    ///
    /// A parameter counts as missing when it is absent or `null`; string
    /// parameters must also be non-blank.
    pub fn check(&self, params: &Params) -> Result<(), String> {
        for name in self.required {
            match params.get(*name) {
                None | Some(Value::Null) => {
                    return Err(format!("missing required parameter: {name}"));
                }
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(format!("parameter {name} cannot be empty"));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// An operation implementation the router can execute.
///
/// Handlers must be safe to skip: once an operation has a cached result the
/// router will not call it again as a prerequisite unless the request is
/// forced. A handler reads earlier outputs through the context and returns
/// its own output, which the router persists.
///
/// # Examples
///
/// ```
/// use pipewright::prelude::*;
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
///
/// struct Analyze;
///
/// #[async_trait]
/// impl OperationHandler for Analyze {
///     async fn execute(&self, params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
///         let repo = str_param(params, "repo_path")?;
///         ctx.report(format!("scanning {repo}"));
///         ctx.set_metadata("repo_path", json!(repo));
///         Ok(json!({"language": "rust", "port": 8080}))
///     }
///
///     fn input_contract(&self) -> InputContract {
///         InputContract::required(&["repo_path"])
///     }
/// }
/// ```
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Runs the operation.
    ///
    /// # Returns
    ///
    /// - `Ok(output)` - persisted as the operation's result
    /// - `Err(error)` - recorded as the session's last error; the router
    ///   answers with a recovery hint
    async fn execute(&self, params: &Params, ctx: &mut OperationContext)
        -> Result<Value, HandlerError>;

    /// Parameters that must be present before the operation is attempted.
    fn input_contract(&self) -> InputContract {
        InputContract::none()
    }
}

/// Reads a required, non-blank string parameter.
pub fn str_param<'a>(params: &'a Params, name: &str) -> Result<&'a str, HandlerError> {
    match params.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(HandlerError::invalid_input(format!(
            "parameter {name} cannot be empty"
        ))),
        Some(Value::Null) | None => Err(HandlerError::invalid_input(format!(
            "missing required parameter: {name}"
        ))),
        Some(_) => Err(HandlerError::invalid_input(format!(
            "parameter {name} must be a string"
        ))),
    }
}

/// Reads an optional string parameter; blank strings count as absent.
pub fn opt_str_param<'a>(params: &'a Params, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}
