use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::session::{Session, SessionPatch, SessionSummary};

/// Per-workflow persistent state keyed by session id.
///
/// Implementations must make `ensure`, `read` and `update` appear atomic
/// per id: concurrent updates to the same session are applied one after
/// the other, and updates to different sessions never wait on each other.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns `id` if given, creating the session when absent; otherwise
    /// creates a session with a fresh id.
    async fn ensure(&self, id: Option<&str>) -> Result<String, StoreError>;

    /// Returns a snapshot of the session, or `None` if it does not exist.
    async fn read(&self, id: &str) -> Result<Option<Session>, StoreError>;

    /// Merges `patch` into the session and returns the merged state.
    async fn update(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError>;

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError>;

    async fn remove(&self, id: &str) -> Result<bool, StoreError>;

    /// Evicts sessions beyond the retention bounds, returning how many
    /// were removed. Never evicts a session while it is being updated.
    async fn reap(&self) -> Result<usize, StoreError>;
}

/// Generates a fresh workflow session id.
pub fn generate_session_id() -> String {
    format!("wf_{}", uuid::Uuid::new_v4())
}

/// Picks the sessions to evict: everything older than the retention
/// window, then the least recently updated until `max_sessions` remain.
pub(crate) fn select_evictions(
    mut entries: Vec<(String, DateTime<Utc>)>,
    config: &StoreConfig,
    now: DateTime<Utc>,
) -> Vec<String> {
    entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut evicted = Vec::new();
    let mut kept = Vec::new();
    for (id, updated_at) in entries {
        // Timestamps in the future count as fresh.
        let age = now.signed_duration_since(updated_at).to_std().unwrap_or_default();
        if age > config.retention {
            evicted.push(id);
        } else {
            kept.push(id);
        }
    }
    let overflow = kept.len().saturating_sub(config.max_sessions);
    evicted.extend(kept.into_iter().take(overflow));
    evicted
}

/// In-process session store.
///
/// Each session lives behind its own mutex, so updates to one id are
/// serialized while other ids proceed independently. The outer map lock
/// is only taken for writing when a session is created or evicted.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<Session>>>>,
    config: StoreConfig,
}

impl fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySessionStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Stores a session as-is, replacing any existing one with the same id.
    pub async fn insert(&self, session: Session) {
        let id = session.session_id.clone();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn ensure(&self, id: Option<&str>) -> Result<String, StoreError> {
        let id = id.map_or_else(generate_session_id, str::to_string);
        if self.sessions.read().await.contains_key(&id) {
            return Ok(id);
        }

        let mut sessions = self.sessions.write().await;
        sessions.entry(id.clone()).or_insert_with(|| {
            debug!(session_id = %id, "Created session");
            Arc::new(Mutex::new(Session::new(id.clone())))
        });
        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        match sessions.get(id) {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError> {
        // The map read lock is held for the whole merge so the reaper,
        // which needs the write lock, can never evict mid-update.
        let sessions = self.sessions.read().await;
        let entry = sessions
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut session = entry.lock().await;
        session.apply(patch);
        Ok(session.clone())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut summaries = Vec::with_capacity(sessions.len());
        for entry in sessions.values() {
            summaries.push(entry.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(summaries)
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(id).is_some())
    }

    async fn reap(&self) -> Result<usize, StoreError> {
        let mut sessions = self.sessions.write().await;
        let mut entries = Vec::with_capacity(sessions.len());
        for (id, entry) in sessions.iter() {
            entries.push((id.clone(), entry.lock().await.updated_at));
        }

        let evicted = select_evictions(entries, &self.config, Utc::now());
        for id in &evicted {
            sessions.remove(id);
            warn!(session_id = %id, "Evicted session");
        }
        Ok(evicted.len())
    }
}

/// Runs [`SessionStore::reap`] every `config.reap_interval` until the
/// returned handle is aborted.
pub fn spawn_reaper(store: Arc<dyn SessionStore>, config: &StoreConfig) -> JoinHandle<()> {
    let period = config.reap_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.reap().await {
                Ok(0) => {}
                Ok(evicted) => info!(evicted, "Reaped sessions"),
                Err(e) => warn!(error = %e, "Session reaper failed"),
            }
        }
    })
}
