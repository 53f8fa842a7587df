use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::operation::Operation;

/// Metadata key holding consecutive failure counts per operation,
/// `{"deploy": 2}`. An entry is dropped when its operation next succeeds.
pub const FAILED_STEPS_KEY: &str = "failedSteps";

/// Where one step stands within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Completed,
    Failed,
    NotStarted,
}

/// Durable state tying together every operation performed against one target.
///
/// Sessions are owned by a [`SessionStore`](crate::SessionStore) and only
/// change through [`Session::apply`], which the store calls while holding
/// the session's lock. The serialized form is the shape inspection tooling
/// reads:
///
/// ```json
/// {"sessionId": "...", "completedSteps": ["analyze"], "results": {...},
///  "metadata": {...}, "currentStep": "analyze",
///  "createdAt": "...", "updatedAt": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    /// Ordered set: insertion order is completion (or attempt) order.
    #[serde(default)]
    pub completed_steps: Vec<String>,
    /// Most recent successful output per operation.
    #[serde(default)]
    pub results: BTreeMap<String, Value>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(default)]
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            completed_steps: Vec::new(),
            results: BTreeMap::new(),
            metadata: BTreeMap::new(),
            current_step: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_completed(&self, step: &str) -> bool {
        self.completed_steps.iter().any(|s| s == step)
    }

    /// Returns `true` if the operation has been attempted in this session.
    ///
    /// Requested operations are recorded even when they fail, so this is
    /// also the "already tried" check recovery guards rely on.
    pub fn attempted(&self, op: Operation) -> bool {
        self.has_completed(op.as_str())
    }

    pub fn result(&self, op: Operation) -> Option<&Value> {
        self.results.get(op.as_str())
    }

    pub fn has_result(&self, op: Operation) -> bool {
        self.results.contains_key(op.as_str())
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Failures of `op` since it last succeeded.
    pub fn failure_count(&self, op: Operation) -> u64 {
        self.metadata(FAILED_STEPS_KEY)
            .and_then(|failed| failed.get(op.as_str()))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    pub fn is_failed(&self, op: Operation) -> bool {
        self.failure_count(op) > 0
    }

    /// A failure outranks an earlier completion: a step that succeeded and
    /// then failed on a forced re-run reports as failed.
    pub fn step_status(&self, op: Operation) -> StepStatus {
        if self.is_failed(op) {
            StepStatus::Failed
        } else if self.attempted(op) {
            StepStatus::Completed
        } else {
            StepStatus::NotStarted
        }
    }

    /// Merges a patch into the session.
    ///
    /// `completed_steps` is an ordered union, `results` and `metadata` merge
    /// key-wise (a `Null` metadata value deletes the key), `current_step`
    /// is overwritten when the patch carries one. Failure counts under
    /// [`FAILED_STEPS_KEY`] are cleared for recovered steps and then bumped
    /// for failed ones. `updated_at` is always refreshed.
    pub fn apply(&mut self, patch: SessionPatch) {
        for step in patch.completed_steps {
            if !self.has_completed(&step) {
                self.completed_steps.push(step);
            }
        }
        self.results.extend(patch.results);
        for (key, value) in patch.metadata {
            if value.is_null() {
                self.metadata.remove(&key);
            } else {
                self.metadata.insert(key, value);
            }
        }
        if let Some(step) = patch.current_step {
            self.current_step = Some(step);
        }
        self.apply_failures(&patch.recovered, &patch.failed);
        self.updated_at = Utc::now();
    }

    fn apply_failures(&mut self, recovered: &[String], failed: &[String]) {
        if recovered.is_empty() && failed.is_empty() {
            return;
        }
        let mut counts = match self.metadata.remove(FAILED_STEPS_KEY) {
            Some(Value::Object(counts)) => counts,
            _ => serde_json::Map::new(),
        };
        for step in recovered {
            counts.remove(step);
        }
        for step in failed {
            let count = counts.get(step).and_then(Value::as_u64).unwrap_or(0);
            counts.insert(step.clone(), Value::from(count + 1));
        }
        if !counts.is_empty() {
            self.metadata
                .insert(FAILED_STEPS_KEY.to_string(), Value::Object(counts));
        }
    }

    /// A one-line view used by listings.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            completed_steps: self.completed_steps.len(),
            current_step: self.current_step.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A partial update to a [`Session`].
///
/// # Examples
///
/// ```
/// use pipewright::{Operation, Session, SessionPatch};
/// use serde_json::json;
///
/// let mut session = Session::new("wf_demo");
/// session.apply(
///     SessionPatch::new()
///         .complete(Operation::Analyze)
///         .result(Operation::Analyze, json!({"language": "go"}))
///         .current_step(Operation::Analyze),
/// );
///
/// assert!(session.has_result(Operation::Analyze));
/// assert_eq!(session.completed_steps, vec!["analyze".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    pub completed_steps: Vec<String>,
    pub results: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
    pub current_step: Option<String>,
    /// Steps whose failure count is bumped.
    pub failed: Vec<String>,
    /// Steps whose failure count is cleared.
    pub recovered: Vec<String>,
}

impl SessionPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(mut self, op: Operation) -> Self {
        self.completed_steps.push(op.as_str().to_string());
        self
    }

    pub fn result(mut self, op: Operation, value: Value) -> Self {
        self.results.insert(op.as_str().to_string(), value);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn extend_metadata(mut self, entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.metadata.extend(entries);
        self
    }

    pub fn current_step(mut self, op: Operation) -> Self {
        self.current_step = Some(op.as_str().to_string());
        self
    }

    /// Counts one more consecutive failure of `op`.
    pub fn fail(mut self, op: Operation) -> Self {
        self.failed.push(op.as_str().to_string());
        self
    }

    /// Clears the failure count of `op` after it succeeded.
    pub fn recover(mut self, op: Operation) -> Self {
        self.recovered.push(op.as_str().to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub completed_steps: usize,
    pub current_step: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completed_steps_stay_unique_and_ordered() {
        let mut session = Session::new("s1");
        session.apply(SessionPatch::new().complete(Operation::Analyze));
        session.apply(
            SessionPatch::new()
                .complete(Operation::GenerateDockerfile)
                .complete(Operation::Analyze),
        );
        session.apply(SessionPatch::new().complete(Operation::Build));

        assert_eq!(
            session.completed_steps,
            vec!["analyze", "generate-dockerfile", "build"]
        );
    }

    #[test]
    fn test_results_keep_latest_output() {
        let mut session = Session::new("s1");
        session.apply(SessionPatch::new().result(Operation::Build, json!({"image": "a"})));
        session.apply(SessionPatch::new().result(Operation::Build, json!({"image": "b"})));

        assert_eq!(session.result(Operation::Build), Some(&json!({"image": "b"})));
    }

    #[test]
    fn test_metadata_merges_key_wise() {
        let mut session = Session::new("s1");
        session.apply(SessionPatch::new().metadata("a", json!(1)).metadata("b", json!(2)));
        session.apply(SessionPatch::new().metadata("b", json!(3)).metadata("a", Value::Null));

        assert_eq!(session.metadata("a"), None);
        assert_eq!(session.metadata("b"), Some(&json!(3)));
    }

    #[test]
    fn test_current_step_only_overwritten_when_present() {
        let mut session = Session::new("s1");
        session.apply(SessionPatch::new().current_step(Operation::Tag));
        session.apply(SessionPatch::new().metadata("k", json!("v")));

        assert_eq!(session.current_step.as_deref(), Some("tag"));
    }

    #[test]
    fn test_apply_refreshes_updated_at() {
        let mut session = Session::new("s1");
        let before = session.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.apply(SessionPatch::new());

        assert!(session.updated_at > before);
        assert_eq!(session.created_at, before);
    }

    #[test]
    fn test_failure_counts_accumulate_until_recovery() {
        let mut session = Session::new("s1");
        session.apply(SessionPatch::new().complete(Operation::Deploy).fail(Operation::Deploy));
        session.apply(SessionPatch::new().fail(Operation::Deploy).fail(Operation::Push));

        assert_eq!(session.failure_count(Operation::Deploy), 2);
        assert_eq!(session.failure_count(Operation::Push), 1);
        assert_eq!(session.step_status(Operation::Deploy), StepStatus::Failed);
        assert_eq!(session.step_status(Operation::Build), StepStatus::NotStarted);

        session.apply(SessionPatch::new().recover(Operation::Deploy));
        assert_eq!(session.failure_count(Operation::Deploy), 0);
        assert_eq!(session.step_status(Operation::Deploy), StepStatus::Completed);
        assert_eq!(session.metadata(FAILED_STEPS_KEY), Some(&json!({"push": 1})));

        session.apply(SessionPatch::new().recover(Operation::Push));
        assert_eq!(session.metadata(FAILED_STEPS_KEY), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut session = Session::new("wf_1");
        session.apply(
            SessionPatch::new()
                .complete(Operation::Analyze)
                .current_step(Operation::Analyze),
        );
        let value = serde_json::to_value(&session).unwrap();

        assert_eq!(value["sessionId"], json!("wf_1"));
        assert_eq!(value["completedSteps"], json!(["analyze"]));
        assert_eq!(value["currentStep"], json!("analyze"));
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
    }
}
