//! # pipewright
//!
//! A resumable, self-healing router for containerization and deployment
//! pipelines.
//!
//! Callers invoke one operation at a time (`analyze`, `build`, `deploy`, ...)
//! without knowing the pipeline's ordering or recovery rules. For every
//! request the [`Router`] works out which prerequisites are missing from the
//! session, runs them in dependency order, runs the requested operation,
//! persists every result, and answers with a continuation hint saying what
//! to call next, or how to recover.
//!
//! ## Features
//!
//! - **Prerequisite closure**: an explicit dependency graph per [`Operation`];
//!   cached results are reused unless the request is forced
//! - **Recovery hints**: per-operation recovery candidates whose guards read
//!   the session history ("fix the Dockerfile first time, regenerate next")
//! - **Session stores**: in-memory and JSON-file backed, with per-session
//!   serialized updates and a retention reaper
//! - **Structured errors**: `thiserror` enums mapped onto a small taxonomy
//!   ([`ErrorKind`]); the router never panics on handler failures
//! - **Observable**: `tracing` spans the whole route, plus an injectable
//!   [`ProgressReporter`]
//!
//! ## Quick Start
//!
//! ```rust
//! use pipewright::prelude::*;
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! struct Analyze;
//!
//! #[async_trait]
//! impl OperationHandler for Analyze {
//!     async fn execute(&self, params: &Params, _ctx: &mut OperationContext) -> Result<Value, HandlerError> {
//!         let repo = str_param(params, "repo_path")?;
//!         Ok(json!({"repo": repo, "language": "go"}))
//!     }
//!
//!     fn input_contract(&self) -> InputContract {
//!         InputContract::required(&["repo_path"])
//!     }
//! }
//!
//! struct GenerateDockerfile;
//!
//! #[async_trait]
//! impl OperationHandler for GenerateDockerfile {
//!     async fn execute(&self, _params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
//!         let analysis = ctx.require_result(Operation::Analyze)?;
//!         Ok(json!({"dockerfile": format!("FROM {}:latest", analysis["language"].as_str().unwrap_or("scratch"))}))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let router = Router::builder()
//!     .store(Arc::new(MemorySessionStore::new()))
//!     .register(Operation::Analyze, Analyze)
//!     .register(Operation::GenerateDockerfile, GenerateDockerfile)
//!     .build()
//!     .expect("valid router");
//!
//! // analyze runs first because generate-dockerfile depends on it
//! let outcome = router
//!     .route(RouteRequest::new("generate-dockerfile").param("repo_path", "/src/app"))
//!     .await;
//!
//! assert!(outcome.is_success());
//! assert_eq!(
//!     outcome.executed_operations,
//!     vec![Operation::Analyze, Operation::GenerateDockerfile]
//! );
//! println!("{}", outcome.continuation_hint.unwrap_or_default());
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use pipewright::prelude::*;
//!
//! fn explain(outcome: &RouteOutcome) {
//!     let Err(error) = &outcome.result else { return };
//!     match error.kind() {
//!         ErrorKind::Input => eprintln!("fix the request: {error}"),
//!         ErrorKind::Prerequisite | ErrorKind::Target => {
//!             eprintln!("{error}");
//!             if let Some(hint) = &outcome.continuation_hint {
//!                 eprintln!("{hint}");
//!             }
//!         }
//!         ErrorKind::SessionStore => eprintln!("session store down: {error}"),
//!     }
//! }
//! ```

mod config;
mod context;
mod error;
mod file_store;
mod handler;
mod operation;
mod progress;
mod progression;
mod registry;
mod router;
mod session;
mod store;

pub mod prelude;

pub use config::{RouterConfig, StoreConfig};
pub use context::{OperationContext, Params};
pub use error::{ConfigError, ErrorKind, HandlerError, RouteError, StoreError};
pub use file_store::FileSessionStore;
pub use handler::{opt_str_param, str_param, InputContract, OperationHandler};
pub use operation::{Operation, UnknownOperation, WorkflowKind};
pub use progress::{
    NoopReporter, ProgressEvent, ProgressReporter, RecordingReporter, TracingReporter,
};
pub use progression::{
    NextOperation, Progression, ProgressionEngine, SUMMARY_FALLBACK, SUMMARY_FINISHED,
    SUMMARY_MANUAL, SUMMARY_NOT_IN_SEQUENCE, SUMMARY_NOT_STARTED,
};
pub use registry::{
    Guard, RecoveryCandidate, StandardRegistry, StepRegistry, CONTAINERIZE_SEQUENCE, FULL_SEQUENCE,
};
pub use router::{
    derive_session_id, OperationInfo, RouteOutcome, RouteRequest, Router, RouterBuilder,
    StepState, WorkflowState, WorkflowStatus, LAST_ERROR_KEY, WORKFLOW_KEY,
};
pub use session::{Session, SessionPatch, SessionSummary, StepStatus, FAILED_STEPS_KEY};
pub use store::{generate_session_id, spawn_reaper, MemorySessionStore, SessionStore};

/// Installs a `tracing` fmt subscriber for binaries and tests.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}
