use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::session::{Session, SessionPatch, SessionSummary};
use crate::store::{generate_session_id, select_evictions, SessionStore};

const SESSION_EXTENSION: &str = "json";

/// Session store keeping one JSON document per session in a directory.
///
/// Writes go to a temporary file that is renamed over the session file,
/// so readers never see a half-written document. Updates to the same id
/// are serialized through a per-id lock; the reaper takes the store-wide
/// gate exclusively and therefore never runs while an update is in flight.
pub struct FileSessionStore {
    root: PathBuf,
    config: StoreConfig,
    gate: RwLock<()>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for FileSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSessionStore")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FileSessionStore {
    /// Opens (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, config: StoreConfig) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| io_error(&root, e))?;
        Ok(Self {
            root,
            config,
            gate: RwLock::new(()),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !id.starts_with('.');
        if !valid {
            return Err(StoreError::InvalidId(id.to_string()));
        }
        Ok(self.root.join(format!("{id}.{SESSION_EXTENSION}")))
    }

    async fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    async fn load(&self, path: &Path) -> Result<Option<Session>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| json_error(path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn save(&self, path: &Path, session: &Session) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(session).map_err(|e| json_error(path, e))?;
        let tmp = self
            .root
            .join(format!(".{}.tmp-{}", session.session_id, uuid::Uuid::new_v4()));
        fs::write(&tmp, &bytes).await.map_err(|e| io_error(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(io_error(path, e));
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Session>, StoreError> {
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| io_error(&self.root, e))?;
        let mut sessions = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| io_error(&self.root, e))? {
            let path = entry.path();
            let is_session = path.extension().and_then(|ext| ext.to_str()) == Some(SESSION_EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_session {
                continue;
            }
            match self.load(&path).await {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable session"),
            }
        }
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn ensure(&self, id: Option<&str>) -> Result<String, StoreError> {
        let id = id.map_or_else(generate_session_id, str::to_string);
        let path = self.path_for(&id)?;
        let _gate = self.gate.read().await;
        let lock = self.lock_for(&id).await;
        let _guard = lock.lock().await;

        if self.load(&path).await?.is_none() {
            self.save(&path, &Session::new(id.clone())).await?;
            debug!(session_id = %id, path = %path.display(), "Created session");
        }
        Ok(id)
    }

    async fn read(&self, id: &str) -> Result<Option<Session>, StoreError> {
        let path = self.path_for(id)?;
        // Saves are atomic renames, so a reader sees a whole document
        // without taking the per-session lock.
        let _gate = self.gate.read().await;
        self.load(&path).await
    }

    async fn update(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError> {
        let path = self.path_for(id)?;
        let _gate = self.gate.read().await;
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let Some(mut session) = self.load(&path).await? else {
            self.locks.lock().await.remove(id);
            return Err(StoreError::NotFound(id.to_string()));
        };
        session.apply(patch);
        self.save(&path, &session).await?;
        Ok(session)
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        let _gate = self.gate.read().await;
        let mut summaries: Vec<SessionSummary> =
            self.load_all().await?.iter().map(Session::summary).collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(summaries)
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(id)?;
        let _gate = self.gate.write().await;
        let removed = match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(io_error(&path, e)),
        };
        self.locks.lock().await.remove(id);
        Ok(removed)
    }

    async fn reap(&self) -> Result<usize, StoreError> {
        let _gate = self.gate.write().await;
        let entries = self
            .load_all()
            .await?
            .into_iter()
            .map(|session| (session.session_id, session.updated_at))
            .collect();

        let evicted = select_evictions(entries, &self.config, Utc::now());
        let mut locks = self.locks.lock().await;
        for id in &evicted {
            let path = self.path_for(id)?;
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_error(&path, e)),
            }
            locks.remove(id);
            warn!(session_id = %id, "Evicted session");
        }
        Ok(evicted.len())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> StoreError {
    StoreError::Json {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operation;
    use serde_json::json;
    use std::time::Duration;

    fn open(dir: &tempfile::TempDir) -> FileSessionStore {
        FileSessionStore::open(dir.path().join("sessions"), StoreConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        let id = store.ensure(Some("wf_disk")).await.unwrap();
        store
            .update(
                &id,
                SessionPatch::new()
                    .complete(Operation::Analyze)
                    .result(Operation::Analyze, json!({"language": "rust"})),
            )
            .await
            .unwrap();

        let reopened = open(&dir);
        let session = reopened.read(&id).await.unwrap().unwrap();
        assert_eq!(session.completed_steps, vec!["analyze"]);
        assert_eq!(
            session.result(Operation::Analyze),
            Some(&json!({"language": "rust"}))
        );
    }

    #[tokio::test]
    async fn test_persisted_document_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        let id = store.ensure(Some("wf_shape")).await.unwrap();

        let raw = std::fs::read_to_string(store.root().join(format!("{id}.json"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["sessionId"], json!("wf_shape"));
        assert_eq!(value["completedSteps"], json!([]));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        for id in ["../escape", "", ".hidden", "a/b"] {
            let err = store.ensure(Some(id)).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidId(_)), "{id}");
        }
    }

    #[tokio::test]
    async fn test_corrupt_document_surfaces_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);
        std::fs::write(store.root().join("broken.json"), b"{not json").unwrap();

        let err = store.read("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(open(&dir));
        let id = store.ensure(Some("shared")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update(&id, SessionPatch::new().metadata(format!("k{i}"), json!(i)))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let session = store.read(&id).await.unwrap().unwrap();
        assert_eq!(session.metadata.len(), 8);
    }

    #[tokio::test]
    async fn test_lookups_of_unknown_ids_leave_no_locks_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir);

        for i in 0..32 {
            let id = format!("wf_missing_{i}");
            assert!(store.read(&id).await.unwrap().is_none());
            assert!(matches!(
                store.update(&id, SessionPatch::new()).await,
                Err(StoreError::NotFound(_))
            ));
        }
        assert!(store.locks.lock().await.is_empty());

        store.ensure(Some("wf_present")).await.unwrap();
        assert_eq!(store.locks.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reap_removes_expired_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::open(
            dir.path(),
            StoreConfig {
                retention: Duration::from_secs(60),
                ..StoreConfig::default()
            },
        )
        .unwrap();

        store.ensure(Some("fresh")).await.unwrap();
        let mut stale = Session::new("stale");
        stale.updated_at = Utc::now() - chrono::Duration::hours(2);
        std::fs::write(
            dir.path().join("stale.json"),
            serde_json::to_vec(&stale).unwrap(),
        )
        .unwrap();

        assert_eq!(store.reap().await.unwrap(), 1);
        assert!(store.read("stale").await.unwrap().is_none());
        assert!(store.read("fresh").await.unwrap().is_some());
    }
}
