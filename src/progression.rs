//! Pure "what next" computations.
//!
//! Nothing here touches the session store: the engine reads a session
//! snapshot and the registry and returns a fresh [`Progression`]. Calling
//! it twice with the same inputs yields the same answer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::operation::{Operation, WorkflowKind};
use crate::registry::{StandardRegistry, StepRegistry};
use crate::session::Session;

/// Longest error excerpt embedded in a failure summary.
const ERROR_EXCERPT_LIMIT: usize = 200;

pub const SUMMARY_NOT_IN_SEQUENCE: &str = "operation not in standard sequence";
pub const SUMMARY_FINISHED: &str = "workflow finished";
pub const SUMMARY_FALLBACK: &str = "fallback to analysis";
pub const SUMMARY_MANUAL: &str = "manual intervention needed";
pub const SUMMARY_NOT_STARTED: &str = "workflow not started";

/// A suggested next call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextOperation {
    pub operation: Operation,
    pub description: String,
}

/// The engine's suggestion for the caller's next action. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub next_operations: Vec<NextOperation>,
    pub summary: String,
}

impl Progression {
    fn terminal(summary: impl Into<String>) -> Self {
        Self {
            next_operations: Vec::new(),
            summary: summary.into(),
        }
    }

    fn single(operation: Operation, description: impl Into<String>, summary: String) -> Self {
        Self {
            next_operations: vec![NextOperation {
                operation,
                description: description.into(),
            }],
            summary,
        }
    }

    pub fn next(&self) -> Option<Operation> {
        self.next_operations.first().map(|next| next.operation)
    }

    pub fn is_finished(&self) -> bool {
        self.next_operations.is_empty() && self.summary == SUMMARY_FINISHED
    }

    pub fn needs_manual_intervention(&self) -> bool {
        self.next_operations.is_empty() && self.summary == SUMMARY_MANUAL
    }

    /// Renders the human-readable chain hint embedded in result payloads.
    ///
    /// # Examples
    ///
    /// ```
    /// use pipewright::{Operation, ProgressionEngine, Session, SessionPatch, WorkflowKind};
    ///
    /// let engine = ProgressionEngine::standard();
    /// let mut session = Session::new("wf_demo");
    /// session.apply(SessionPatch::new().complete(Operation::Analyze));
    ///
    /// let progression = engine.on_success("analyze", &session, &WorkflowKind::Full);
    /// let hint = progression.chain_hint();
    /// assert!(hint.contains("Next: call resolve-base-images"));
    /// ```
    pub fn chain_hint(&self) -> String {
        let mut hint = self.summary.clone();
        for next in &self.next_operations {
            hint.push_str(&format!("\nNext: call {} ({})", next.operation, next.description));
        }
        hint
    }
}

impl fmt::Display for Progression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.chain_hint())
    }
}

/// Computes progressions from a registry.
#[derive(Clone)]
pub struct ProgressionEngine {
    registry: Arc<dyn StepRegistry>,
}

impl fmt::Debug for ProgressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressionEngine").finish_non_exhaustive()
    }
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl ProgressionEngine {
    pub fn new(registry: Arc<dyn StepRegistry>) -> Self {
        Self { registry }
    }

    /// An engine over [`StandardRegistry`].
    pub fn standard() -> Self {
        Self::new(Arc::new(StandardRegistry))
    }

    pub fn registry(&self) -> &dyn StepRegistry {
        self.registry.as_ref()
    }

    /// Suggests the opening step for a session that has not run anything
    /// from `kind`'s sequence yet.
    pub fn on_start(&self, kind: &WorkflowKind) -> Progression {
        match self.registry.sequence_for(kind).first() {
            None => Progression::terminal(SUMMARY_FINISHED),
            Some(first) => Progression::single(
                *first,
                first.description(),
                SUMMARY_NOT_STARTED.to_string(),
            ),
        }
    }

    /// Suggests the next operation after `completed` succeeded.
    ///
    /// The suggestion is the first operation after `completed` in the
    /// sequence that the session has not already completed, so steps
    /// satisfied out of order are skipped.
    pub fn on_success(&self, completed: &str, session: &Session, kind: &WorkflowKind) -> Progression {
        let sequence = self.registry.sequence_for(kind);
        let Some(index) = sequence.iter().position(|op| op.as_str() == completed) else {
            return Progression::terminal(SUMMARY_NOT_IN_SEQUENCE);
        };

        match sequence[index + 1..]
            .iter()
            .find(|op| !session.has_completed(op.as_str()))
        {
            None => Progression::terminal(SUMMARY_FINISHED),
            Some(next) => Progression::single(
                *next,
                next.description(),
                format!("{completed} completed, continue with {next}"),
            ),
        }
    }

    /// Chooses a recovery target after `failed` failed with `error`.
    ///
    /// Candidates are evaluated in declaration order and the first whose
    /// guard holds wins. Operations without a recovery table fall back to
    /// the first step of the pipeline.
    pub fn on_failure(&self, failed: &str, error: &str, session: &Session) -> Progression {
        let candidates = Operation::parse(failed).and_then(|op| self.registry.recovery_for(op));
        let Some(candidates) = candidates else {
            let first = self.registry.first_step();
            return Progression::single(first, first.description(), SUMMARY_FALLBACK.to_string());
        };

        match candidates.iter().find(|candidate| candidate.applies_to(session)) {
            None => Progression::terminal(SUMMARY_MANUAL),
            Some(candidate) => Progression::single(
                candidate.target,
                candidate.reason,
                format!(
                    "{failed} failed, recover with {}: {}",
                    candidate.target,
                    excerpt(error)
                ),
            ),
        }
    }
}

fn excerpt(error: &str) -> String {
    let trimmed = error.trim();
    if trimmed.is_empty() {
        return "unknown error".to_string();
    }
    match trimmed.char_indices().nth(ERROR_EXCERPT_LIMIT) {
        None => trimmed.to_string(),
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
    }
}
