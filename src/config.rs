use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::operation::WorkflowKind;

/// Router settings.
///
/// # Examples
///
/// ```
/// use pipewright::{RouterConfig, WorkflowKind};
///
/// let config = RouterConfig {
///     default_workflow: WorkflowKind::Containerize,
///     ..RouterConfig::default()
/// };
/// assert_eq!(config.session_path_keys, vec!["repo_path", "path"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Sequence used when a request does not name one.
    pub default_workflow: WorkflowKind,
    /// Parameters checked, in order, for a target path when deriving a
    /// session id for a request that does not carry one.
    pub session_path_keys: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_workflow: WorkflowKind::Full,
            session_path_keys: vec!["repo_path".to_string(), "path".to_string()],
        }
    }
}

/// Session retention settings shared by the session stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Sessions untouched for longer than this are evicted by the reaper.
    pub retention: Duration,
    /// Upper bound on retained sessions; the least recently updated go first.
    pub max_sessions: usize,
    /// How often [`spawn_reaper`](crate::spawn_reaper) runs.
    pub reap_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(24 * 60 * 60),
            max_sessions: 1000,
            reap_interval: Duration::from_secs(5 * 60),
        }
    }
}
