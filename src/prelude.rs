//! Commonly used types and traits

pub use crate::context::{OperationContext, Params};
pub use crate::error::{ErrorKind, HandlerError, RouteError};
pub use crate::handler::{str_param, InputContract, OperationHandler};
pub use crate::operation::{Operation, WorkflowKind};
pub use crate::router::{RouteOutcome, RouteRequest, Router};
pub use crate::store::{MemorySessionStore, SessionStore};
