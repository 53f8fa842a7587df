use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::RouterConfig;
use crate::context::{OperationContext, Params};
use crate::error::{ConfigError, HandlerError, RouteError, StoreError};
use crate::handler::{opt_str_param, OperationHandler};
use crate::operation::{Operation, WorkflowKind};
use crate::progress::{ProgressEvent, ProgressReporter, TracingReporter};
use crate::progression::{Progression, ProgressionEngine};
use crate::registry::{StandardRegistry, StepRegistry};
use crate::session::{Session, SessionPatch, StepStatus};
use crate::store::{generate_session_id, SessionStore};

/// Metadata key holding `{operation, message, at}` for the most recent failure.
pub const LAST_ERROR_KEY: &str = "lastError";

/// Metadata key holding the workflow kind a session was routed under.
pub const WORKFLOW_KEY: &str = "workflow";

/// Derives a stable session id from a target path.
///
/// Repeated calls against the same repository land in the same session
/// without the caller having to remember an id.
///
/// ```
/// use pipewright::derive_session_id;
///
/// let id = derive_session_id("/src/app");
/// assert!(id.starts_with("session-"));
/// assert_eq!(id.len(), "session-".len() + 16);
/// assert_eq!(id, derive_session_id("/src/app"));
/// ```
pub fn derive_session_id(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{b:02x}")).collect();
    format!("session-{hex}")
}

/// One call to [`Router::route`].
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    operation: String,
    params: Params,
    session_id: Option<String>,
    force: bool,
    workflow: Option<WorkflowKind>,
}

impl RouteRequest {
    /// `operation` is the external name; it is parsed when the request is routed.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Self::default()
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params.extend(params);
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Re-run every prerequisite even when its result is cached.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn workflow(mut self, kind: impl Into<WorkflowKind>) -> Self {
        self.workflow = Some(kind.into());
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

/// What a routed call did and what the caller should do next.
#[derive(Debug)]
pub struct RouteOutcome {
    pub session_id: String,
    pub result: Result<Value, RouteError>,
    /// Operations attempted, in order, up to and including a failing one.
    /// A prerequisite that fails before its handler runs (no handler, or
    /// rejected input) is still listed. Cached prerequisites are not.
    pub executed_operations: Vec<Operation>,
    pub progression: Option<Progression>,
    /// Rendered [`Progression::chain_hint`].
    pub continuation_hint: Option<String>,
}

impl RouteOutcome {
    fn new(
        session_id: String,
        result: Result<Value, RouteError>,
        executed_operations: Vec<Operation>,
        progression: Option<Progression>,
    ) -> Self {
        let continuation_hint = progression.as_ref().map(Progression::chain_hint);
        Self {
            session_id,
            result,
            executed_operations,
            progression,
            continuation_hint,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&RouteError> {
        self.result.as_ref().err()
    }

    /// The transport payload for this outcome.
    ///
    /// `{sessionId, success, data | error, executedOperations, chainHint,
    /// nextOperations}`
    pub fn to_payload(&self) -> Value {
        let next_operations = self
            .progression
            .as_ref()
            .map(|p| p.next_operations.as_slice())
            .unwrap_or_default();

        let mut payload = json!({
            "sessionId": self.session_id,
            "success": self.is_success(),
            "executedOperations": self.executed_operations,
            "chainHint": self.continuation_hint,
            "nextOperations": next_operations,
        });
        if let Value::Object(map) = &mut payload {
            match &self.result {
                Ok(data) => map.insert("data".to_string(), data.clone()),
                Err(e) => map.insert("error".to_string(), Value::String(e.to_string())),
            };
        }
        payload
    }
}

/// Overall state of a session's workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Nothing from the sequence has run yet.
    Started,
    InProgress,
    /// The most recent call failed and has not been recovered.
    Error,
    Completed,
}

/// One step of the session's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepState {
    pub operation: Operation,
    pub status: StepStatus,
}

/// Snapshot returned by [`Router::status`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub session_id: String,
    pub workflow: WorkflowKind,
    pub status: WorkflowState,
    /// Every step of `workflow`'s sequence, in order.
    pub steps: Vec<StepState>,
    pub completed_steps: Vec<String>,
    pub current_step: Option<String>,
    pub last_error: Option<Value>,
    pub progression: Progression,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered operation as listed by [`Router::operations`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationInfo {
    pub operation: Operation,
    pub description: &'static str,
    pub prerequisites: Vec<Operation>,
    pub required_params: Vec<&'static str>,
}

/// Failure carried out of the closure walk.
struct Halt {
    error: RouteError,
    progression: Option<Progression>,
}

impl From<StoreError> for Halt {
    fn from(e: StoreError) -> Self {
        Halt {
            error: RouteError::Session(e),
            progression: None,
        }
    }
}

/// Resolves prerequisites, runs the requested operation and tells the
/// caller what to do next.
///
/// # Examples
///
/// ```
/// use pipewright::prelude::*;
/// use async_trait::async_trait;
/// use serde_json::{json, Value};
/// use std::sync::Arc;
///
/// struct Analyze;
///
/// #[async_trait]
/// impl OperationHandler for Analyze {
///     async fn execute(&self, _params: &Params, _ctx: &mut OperationContext) -> Result<Value, HandlerError> {
///         Ok(json!({"language": "go"}))
///     }
/// }
///
/// # #[tokio::main]
/// # async fn main() {
/// let router = Router::builder()
///     .store(Arc::new(MemorySessionStore::new()))
///     .register(Operation::Analyze, Analyze)
///     .build()
///     .expect("valid router");
///
/// let outcome = router.route(RouteRequest::new("analyze").session("wf_demo")).await;
/// assert!(outcome.is_success());
/// assert_eq!(outcome.executed_operations, vec![Operation::Analyze]);
/// assert!(outcome.continuation_hint.unwrap().contains("resolve-base-images"));
/// # }
/// ```
pub struct Router {
    store: Arc<dyn SessionStore>,
    engine: ProgressionEngine,
    handlers: HashMap<Operation, Arc<dyn OperationHandler>>,
    reporter: Arc<dyn ProgressReporter>,
    config: RouterConfig,
    instance_session: String,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers: Vec<_> = self.handlers.keys().collect();
        handlers.sort();
        f.debug_struct("Router")
            .field("handlers", &handlers)
            .field("config", &self.config)
            .field("instance_session", &self.instance_session)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// The session id a request will run under: the caller's, else one
    /// derived from a target path parameter, else this router's own.
    pub fn session_id_for(&self, request: &RouteRequest) -> String {
        if let Some(id) = request.session_id.as_deref().filter(|id| !id.trim().is_empty()) {
            return id.to_string();
        }
        self.config
            .session_path_keys
            .iter()
            .find_map(|key| opt_str_param(&request.params, key))
            .map_or_else(|| self.instance_session.clone(), derive_session_id)
    }

    /// Routes one request. Never panics and never returns early with an
    /// error: every failure is reported inside the outcome.
    pub async fn route(&self, request: RouteRequest) -> RouteOutcome {
        let started = Instant::now();
        let session_id = self.session_id_for(&request);

        let op = match self.validate(&request) {
            Ok(op) => op,
            Err(error) => {
                warn!(
                    session_id = %session_id,
                    operation = %request.operation,
                    error = %error,
                    "Rejected request"
                );
                return RouteOutcome::new(session_id, Err(error), Vec::new(), None);
            }
        };

        let mut executed = Vec::new();
        let result = self.run(op, &request, &session_id, &mut executed).await;
        let outcome = match result {
            Ok((value, progression)) => {
                RouteOutcome::new(session_id, Ok(value), executed, Some(progression))
            }
            Err(halt) => RouteOutcome::new(session_id, Err(halt.error), executed, halt.progression),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome.result {
            Ok(_) => info!(
                session_id = %outcome.session_id,
                operation = %op,
                executed = ?outcome.executed_operations,
                elapsed_ms,
                "Route completed"
            ),
            Err(e) => warn!(
                session_id = %outcome.session_id,
                operation = %op,
                executed = ?outcome.executed_operations,
                elapsed_ms,
                kind = %e.kind(),
                failed = ?e.failed_operation(),
                error = %e,
                "Route failed"
            ),
        }
        outcome
    }

    fn validate(&self, request: &RouteRequest) -> Result<Operation, RouteError> {
        let op = Operation::parse(request.operation.trim())
            .ok_or_else(|| RouteError::UnknownOperation(request.operation.clone()))?;
        let handler = self.handlers.get(&op).ok_or(RouteError::MissingHandler(op))?;
        handler
            .input_contract()
            .check(&request.params)
            .map_err(|details| RouteError::InvalidInput {
                operation: op,
                details,
            })?;
        Ok(op)
    }

    async fn run(
        &self,
        op: Operation,
        request: &RouteRequest,
        session_id: &str,
        executed: &mut Vec<Operation>,
    ) -> Result<(Value, Progression), Halt> {
        self.store.ensure(Some(session_id)).await?;
        if let Some(kind) = &request.workflow {
            let patch = SessionPatch::new().metadata(WORKFLOW_KEY, json!(kind.as_str()));
            self.store.update(session_id, patch).await?;
        }

        let closure = self.engine.registry().closure_of(op);
        self.reporter.report(&ProgressEvent::ClosureResolved {
            session_id: session_id.to_string(),
            requested: op,
            prerequisites: closure.clone(),
        });

        for prerequisite in closure {
            // Re-read every time: the previous prerequisite may have just
            // written the result this one would otherwise need.
            let session = self.snapshot(session_id).await?;
            if !request.force && session.has_result(prerequisite) {
                self.reporter.report(&ProgressEvent::OperationSkipped {
                    session_id: session_id.to_string(),
                    operation: prerequisite,
                });
                continue;
            }

            if let Err(details) = self
                .execute_prerequisite(prerequisite, &request.params, session, executed)
                .await
            {
                let session = self.record_failure(session_id, prerequisite, &details, false).await?;
                let progression = self
                    .engine
                    .on_failure(prerequisite.as_str(), &details, &session);
                return Err(Halt {
                    error: RouteError::PrerequisiteFailed {
                        prerequisite,
                        requested: op,
                        details,
                    },
                    progression: Some(progression),
                });
            }
        }

        let session = self.snapshot(session_id).await?;
        let kind = self.workflow_of(&session);

        match self
            .execute_target(op, &request.params, session, executed)
            .await
        {
            Ok((value, session)) => {
                let progression = self.engine.on_success(op.as_str(), &session, &kind);
                Ok((value, progression))
            }
            Err(HandlerFailure { details, invalid_input }) => {
                let session = self.record_failure(session_id, op, &details, true).await?;
                let progression = self.engine.on_failure(op.as_str(), &details, &session);
                let error = if invalid_input {
                    RouteError::InvalidInput {
                        operation: op,
                        details,
                    }
                } else {
                    RouteError::OperationFailed {
                        operation: op,
                        details,
                    }
                };
                Err(Halt {
                    error,
                    progression: Some(progression),
                })
            }
        }
    }

    async fn snapshot(&self, session_id: &str) -> Result<Session, StoreError> {
        self.store
            .read(session_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }

    /// Runs a prerequisite and persists its result. The error is the
    /// failure text used for the hint.
    async fn execute_prerequisite(
        &self,
        op: Operation,
        params: &Params,
        session: Session,
        executed: &mut Vec<Operation>,
    ) -> Result<Session, String> {
        let session_id = session.session_id.clone();
        executed.push(op);
        let Some(handler) = self.handlers.get(&op) else {
            return Err(format!("no handler registered for {op}"));
        };
        handler.input_contract().check(params)?;

        let (output, ctx) = self.invoke(handler.as_ref(), op, true, params, session).await;
        match output {
            Ok(value) => {
                let patch = SessionPatch::new()
                    .complete(op)
                    .result(op, value)
                    .current_step(op)
                    .recover(op)
                    .extend_metadata(ctx.into_metadata());
                self.store
                    .update(&session_id, patch)
                    .await
                    .map_err(|e| format!("failed to persist {op}: {e}"))
            }
            Err(e) => Err(e.to_string()),
        }
    }

    async fn execute_target(
        &self,
        op: Operation,
        params: &Params,
        session: Session,
        executed: &mut Vec<Operation>,
    ) -> Result<(Value, Session), HandlerFailure> {
        let session_id = session.session_id.clone();
        let Some(handler) = self.handlers.get(&op) else {
            return Err(HandlerFailure::failed(format!("no handler registered for {op}")));
        };

        executed.push(op);
        let (output, ctx) = self.invoke(handler.as_ref(), op, false, params, session).await;
        let value = output.map_err(HandlerFailure::from)?;

        let patch = SessionPatch::new()
            .complete(op)
            .result(op, value.clone())
            .current_step(op)
            .recover(op)
            .extend_metadata(ctx.into_metadata())
            .metadata(LAST_ERROR_KEY, Value::Null);
        match self.store.update(&session_id, patch).await {
            Ok(session) => Ok((value, session)),
            Err(e) => Err(HandlerFailure::failed(format!("failed to persist {op}: {e}"))),
        }
    }

    async fn invoke(
        &self,
        handler: &dyn OperationHandler,
        op: Operation,
        prerequisite: bool,
        params: &Params,
        session: Session,
    ) -> (Result<Value, HandlerError>, OperationContext) {
        let session_id = session.session_id.clone();
        self.reporter.report(&ProgressEvent::OperationStarted {
            session_id: session_id.clone(),
            operation: op,
            prerequisite,
        });

        let mut ctx = OperationContext::with_reporter(op, session, Arc::clone(&self.reporter));
        let output = handler.execute(params, &mut ctx).await;
        let elapsed = ctx.elapsed();

        let event = match &output {
            Ok(_) => ProgressEvent::OperationSucceeded {
                session_id,
                operation: op,
                elapsed,
            },
            Err(e) => ProgressEvent::OperationFailed {
                session_id,
                operation: op,
                error: e.to_string(),
                elapsed,
            },
        };
        self.reporter.report(&event);
        (output, ctx)
    }

    /// Writes `lastError`, bumps the failure count of `op` and, for the
    /// requested operation, records the attempt in `completed_steps`.
    async fn record_failure(
        &self,
        session_id: &str,
        op: Operation,
        details: &str,
        attempted: bool,
    ) -> Result<Session, StoreError> {
        let mut patch = SessionPatch::new().fail(op).metadata(
            LAST_ERROR_KEY,
            json!({
                "operation": op,
                "message": details,
                "at": Utc::now().to_rfc3339(),
            }),
        );
        if attempted {
            patch = patch.complete(op).current_step(op);
        }
        self.store.update(session_id, patch).await
    }

    /// The kind recorded for the session, else the configured default.
    fn workflow_of(&self, session: &Session) -> WorkflowKind {
        session
            .metadata(WORKFLOW_KEY)
            .and_then(Value::as_str)
            .map_or_else(|| self.config.default_workflow.clone(), WorkflowKind::from)
    }

    /// Progress of a session: what has run, the last failure, and what to
    /// call next.
    ///
    /// While a failure is outstanding the progression is the same recovery
    /// suggestion the failing call returned.
    pub async fn status(&self, session_id: &str) -> Result<WorkflowStatus, RouteError> {
        let session = self.snapshot(session_id).await?;
        let kind = self.workflow_of(&session);
        let sequence = self.engine.registry().sequence_for(&kind);
        let last_error = session.metadata(LAST_ERROR_KEY).cloned();

        let failed = last_error.as_ref().and_then(|e| {
            let operation = e.get("operation")?.as_str()?;
            let message = e.get("message").and_then(Value::as_str).unwrap_or_default();
            Some((operation, message))
        });
        let latest = session
            .completed_steps
            .iter()
            .rev()
            .find(|step| sequence.iter().any(|op| op.as_str() == step.as_str()));
        let progression = match (failed, latest) {
            (Some((operation, message)), _) => {
                self.engine.on_failure(operation, message, &session)
            }
            (None, Some(step)) => self.engine.on_success(step, &session, &kind),
            (None, None) => self.engine.on_start(&kind),
        };

        let status = if failed.is_some() {
            WorkflowState::Error
        } else if progression.is_finished() {
            WorkflowState::Completed
        } else if latest.is_none() {
            WorkflowState::Started
        } else {
            WorkflowState::InProgress
        };
        let steps = sequence
            .iter()
            .map(|op| StepState {
                operation: *op,
                status: session.step_status(*op),
            })
            .collect();

        Ok(WorkflowStatus {
            session_id: session.session_id.clone(),
            workflow: kind,
            status,
            steps,
            last_error,
            completed_steps: session.completed_steps,
            current_step: session.current_step,
            progression,
            created_at: session.created_at,
            updated_at: session.updated_at,
        })
    }

    /// Registered operations in pipeline order.
    pub fn operations(&self) -> Vec<OperationInfo> {
        Operation::ALL
            .into_iter()
            .filter_map(|op| {
                let handler = self.handlers.get(&op)?;
                Some(OperationInfo {
                    operation: op,
                    description: op.description(),
                    prerequisites: self.engine.registry().prerequisites_of(op).to_vec(),
                    required_params: handler.input_contract().required.to_vec(),
                })
            })
            .collect()
    }
}

struct HandlerFailure {
    details: String,
    invalid_input: bool,
}

impl HandlerFailure {
    fn failed(details: String) -> Self {
        Self {
            details,
            invalid_input: false,
        }
    }
}

impl From<HandlerError> for HandlerFailure {
    fn from(e: HandlerError) -> Self {
        let invalid_input = matches!(e, HandlerError::InvalidInput(_));
        Self {
            details: e.to_string(),
            invalid_input,
        }
    }
}

/// Assembles a [`Router`].
pub struct RouterBuilder {
    store: Option<Arc<dyn SessionStore>>,
    registry: Arc<dyn StepRegistry>,
    handlers: HashMap<Operation, Arc<dyn OperationHandler>>,
    reporter: Arc<dyn ProgressReporter>,
    config: RouterConfig,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            registry: Arc::new(StandardRegistry),
            handlers: HashMap::new(),
            reporter: Arc::new(TracingReporter),
            config: RouterConfig::default(),
        }
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Replaces the standard sequence, prerequisite and recovery tables.
    pub fn registry(mut self, registry: Arc<dyn StepRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Registers the handler for `op`, replacing any earlier one.
    pub fn register<H: OperationHandler + 'static>(mut self, op: Operation, handler: H) -> Self {
        self.handlers.insert(op, Arc::new(handler));
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Router, ConfigError> {
        let store = self
            .store
            .ok_or_else(|| ConfigError::Invalid("session store must be specified".to_string()))?;

        if self.handlers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one operation handler must be registered".to_string(),
            ));
        }

        Ok(Router {
            store,
            engine: ProgressionEngine::new(self.registry),
            handlers: self.handlers,
            reporter: self.reporter,
            config: self.config,
            instance_session: generate_session_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use async_trait::async_trait;

    struct Constant(Value);

    #[async_trait]
    impl OperationHandler for Constant {
        async fn execute(
            &self,
            _params: &Params,
            _ctx: &mut OperationContext,
        ) -> Result<Value, HandlerError> {
            Ok(self.0.clone())
        }
    }

    fn router() -> Router {
        Router::builder()
            .store(Arc::new(MemorySessionStore::new()))
            .register(Operation::Analyze, Constant(json!({"language": "go"})))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_store() {
        let result = Router::builder()
            .register(Operation::Analyze, Constant(Value::Null))
            .build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::Invalid("session store must be specified".to_string())
        );
    }

    #[test]
    fn test_builder_requires_handlers() {
        let result = Router::builder()
            .store(Arc::new(MemorySessionStore::new()))
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_session_id_precedence() {
        let router = router();

        let explicit = RouteRequest::new("analyze")
            .session("wf_given")
            .param("repo_path", "/src/app");
        assert_eq!(router.session_id_for(&explicit), "wf_given");

        let by_path = RouteRequest::new("analyze").param("repo_path", "/src/app");
        assert_eq!(router.session_id_for(&by_path), derive_session_id("/src/app"));

        let by_fallback_key = RouteRequest::new("analyze").param("path", "/src/app");
        assert_eq!(
            router.session_id_for(&by_fallback_key),
            derive_session_id("/src/app")
        );

        let bare = RouteRequest::new("analyze");
        let id = router.session_id_for(&bare);
        assert!(id.starts_with("wf_"));
        assert_eq!(router.session_id_for(&RouteRequest::new("build")), id);
    }

    #[test]
    fn test_derived_ids_differ_per_path() {
        assert_ne!(derive_session_id("/a"), derive_session_id("/b"));
    }

    #[tokio::test]
    async fn test_payload_shape() {
        let router = router();
        let outcome = router
            .route(RouteRequest::new("analyze").session("wf_payload"))
            .await;
        let payload = outcome.to_payload();

        assert_eq!(payload["sessionId"], json!("wf_payload"));
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["data"], json!({"language": "go"}));
        assert_eq!(payload["executedOperations"], json!(["analyze"]));
        assert_eq!(
            payload["nextOperations"][0]["operation"],
            json!("resolve-base-images")
        );
        assert!(payload.get("error").is_none());
    }

    #[tokio::test]
    async fn test_unknown_operation_payload() {
        let router = router();
        let outcome = router
            .route(RouteRequest::new("teleport").session("wf_x"))
            .await;
        let payload = outcome.to_payload();

        assert_eq!(payload["success"], json!(false));
        assert_eq!(payload["error"], json!("Unknown operation: teleport"));
        assert_eq!(payload["chainHint"], Value::Null);
        assert_eq!(payload["nextOperations"], json!([]));
    }

    #[test]
    fn test_operations_listing() {
        let router = router();
        let listed = router.operations();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].operation, Operation::Analyze);
        assert!(listed[0].prerequisites.is_empty());
    }
}
