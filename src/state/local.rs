//! Local file-based state storage backend.
//!
//! State lives in `<state-dir>/state.json`, written to a temporary file and
//! renamed into place. A sibling `state.lock` file holds the lock.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result, StateError};

use super::lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
use super::store::StateStore;
use super::types::{STATE_VERSION, StateDocument};

/// Default state directory name.
pub const DEFAULT_STATE_DIR: &str = ".pingone";

/// State file name.
const STATE_FILE: &str = "state.json";

/// Lock file name.
const LOCK_FILE: &str = "state.lock";

/// Attempts at creating the lock file before giving up.
const LOCK_ATTEMPTS: usize = 3;

/// Local file-based state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Base directory for state files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

fn io_failure(action: &str, e: &std::io::Error) -> ProviderError {
    ProviderError::State(StateError::Corrupted {
        message: format!("Failed to {action}: {e}"),
    })
}

fn lock_failure(action: &str, e: &std::io::Error) -> ProviderError {
    ProviderError::State(StateError::LockFailed {
        message: format!("Failed to {action}: {e}"),
    })
}

impl LocalStateStore {
    /// Creates a store under `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(STATE_FILE);
        let lock_path = base_dir.join(LOCK_FILE);

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Path of the state file.
    #[must_use]
    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir)
                .await
                .map_err(|e| io_failure("create state directory", &e))?;
        }
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        read_lock_at(&self.lock_path).await
    }

    /// Serializes `lock_info` into a temporary file beside the lock file.
    async fn stage_lock_file(&self, lock_info: &LockInfo) -> Result<PathBuf> {
        self.ensure_dir().await?;

        let content = serde_json::to_string_pretty(lock_info)
            .map_err(|e| StateError::serialization(format!("Failed to serialize lock: {e}")))?;

        let staged = self.base_dir.join(format!("{LOCK_FILE}.{}.tmp", lock_info.lock_id));
        let mut file = fs::File::create(&staged)
            .await
            .map_err(|e| lock_failure("create lock file", &e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| lock_failure("write lock file", &e))?;
        file.sync_all()
            .await
            .map_err(|e| lock_failure("sync lock file", &e))?;

        Ok(staged)
    }

    /// Creates the lock file only if none exists.
    ///
    /// The record is written in full before it is linked into place, so the
    /// lock file never appears empty. Returns false when another lock exists.
    async fn create_lock_file(&self, lock_info: &LockInfo) -> Result<bool> {
        let staged = self.stage_lock_file(lock_info).await?;
        let linked = fs::hard_link(&staged, &self.lock_path).await;
        let _ = fs::remove_file(&staged).await;

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(lock_failure("create lock file", &e)),
        }
    }

    /// Overwrites the lock file with `lock_info`.
    async fn replace_lock_file(&self, lock_info: &LockInfo) -> Result<()> {
        let staged = self.stage_lock_file(lock_info).await?;
        fs::rename(&staged, &self.lock_path)
            .await
            .map_err(|e| lock_failure("replace lock file", &e))
    }

    /// Moves an expired lock out of the way.
    ///
    /// The lock file is renamed aside and checked, so a fresh lock taken by
    /// another process in the meantime is put back instead of discarded.
    /// Returns the holder of that fresh lock, if any.
    async fn evict_expired_lock(&self, expired: &LockInfo, taker: &LockInfo) -> Result<Option<LockInfo>> {
        let aside = self.base_dir.join(format!("{LOCK_FILE}.{}.stale", taker.lock_id));
        match fs::rename(&self.lock_path, &aside).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(lock_failure("remove expired lock file", &e)),
        }

        let moved = read_lock_at(&aside).await;
        match moved {
            Ok(Some(moved)) if moved.lock_id != expired.lock_id && !moved.is_expired() => {
                let _ = fs::hard_link(&aside, &self.lock_path).await;
                let _ = fs::remove_file(&aside).await;
                Ok(Some(moved))
            }
            _ => {
                let _ = fs::remove_file(&aside).await;
                Ok(None)
            }
        }
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(lock_failure("delete lock file", &e)),
        }
    }
}

/// Reads a lock record, or `None` when the file does not exist.
async fn read_lock_at(path: &Path) -> Result<Option<LockInfo>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_failure("read lock file", &e)),
    };

    let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
        ProviderError::State(StateError::Corrupted {
            message: format!("Failed to parse lock file: {e}"),
        })
    })?;

    Ok(Some(lock_info))
}

fn locked_by(existing: &LockInfo) -> ProviderError {
    ProviderError::State(StateError::LockedByOther {
        holder: existing.holder.clone(),
        since: existing.acquired_at.to_rfc3339(),
    })
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<StateDocument>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path)
            .await
            .map_err(|e| io_failure("read state file", &e))?;

        let state: StateDocument = serde_json::from_str(&content).map_err(|e| {
            ProviderError::State(StateError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })
        })?;

        if state.version > STATE_VERSION {
            return Err(ProviderError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version.to_string(),
            }));
        }

        Ok(Some(state))
    }

    async fn save(&self, state: &StateDocument) -> Result<()> {
        self.ensure_dir().await?;

        debug!(
            "Saving state serial {} to: {}",
            state.serial,
            self.state_path.display()
        );

        let content = serde_json::to_string_pretty(state)
            .map_err(|e| StateError::serialization(format!("Failed to serialize state: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| io_failure("create temp state file", &e))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| io_failure("write state file", &e))?;
        file.sync_all()
            .await
            .map_err(|e| io_failure("sync state file", &e))?;

        fs::rename(&temp_path, &self.state_path)
            .await
            .map_err(|e| io_failure("rename state file", &e))?;

        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path)
                .await
                .map_err(|e| io_failure("delete state file", &e))?;
        }

        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn acquire_lock(&self, holder: &str, operation: &str) -> Result<LockInfo> {
        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };
        let lock_info = LockInfo::new(&holder_id, operation);

        for _ in 0..LOCK_ATTEMPTS {
            if self.create_lock_file(&lock_info).await? {
                debug!(
                    "Acquired state lock {} for {operation} (expires in {LOCK_EXPIRY_SECS}s)",
                    lock_info.lock_id
                );
                return Ok(lock_info);
            }

            let Some(existing) = self.read_lock_file().await? else {
                continue;
            };
            if !existing.is_expired() {
                return Err(locked_by(&existing));
            }
            warn!(
                "Taking over expired lock held by {} for {}",
                existing.holder, existing.operation
            );
            if let Some(fresh) = self.evict_expired_lock(&existing, &lock_info).await? {
                return Err(locked_by(&fresh));
            }
        }

        Err(ProviderError::State(StateError::LockFailed {
            message: String::from("the lock file kept changing while acquiring the lock"),
        }))
    }

    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo> {
        match self.read_lock_file().await? {
            Some(current) if current.lock_id == lock.lock_id => {
                let mut refreshed = current;
                refreshed.refresh();
                self.replace_lock_file(&refreshed).await?;
                debug!("Refreshed state lock {}", refreshed.lock_id);
                Ok(refreshed)
            }
            current => Err(ProviderError::State(StateError::LockFailed {
                message: format!(
                    "lock {} is no longer held{}",
                    lock.lock_id,
                    current.map(|c| format!(" (now held by {})", c.holder)).unwrap_or_default()
                ),
            })),
        }
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                debug!("Released state lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        if let Some(lock_info) = self.read_lock_file().await? {
            return Ok(!lock_info.is_expired());
        }
        Ok(false)
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ResourceState;
    use tempfile::TempDir;

    fn create_test_store() -> (LocalStateStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStateStore::with_base_dir(temp_dir.path().join(DEFAULT_STATE_DIR));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = create_test_store();

        let mut state = StateDocument::new();
        state.set(
            "pingone_verify_voice_phrase.main",
            ResourceState {
                type_name: "pingone_verify_voice_phrase".to_string(),
                name: "main".to_string(),
                attributes: serde_json::json!({"id": "abc", "display_name": "Phrase"}),
                config_hash: "h".to_string(),
                updated_at: chrono::Utc::now(),
            },
        );
        state.bump_serial();
        store.save(&state).await.expect("Failed to save state");

        let loaded = store
            .load()
            .await
            .expect("Failed to load state")
            .expect("State should exist");

        assert_eq!(loaded, state);
        assert!(!store.state_path().with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = create_test_store();
        assert!(store.load().await.expect("Load should not fail").is_none());
        assert!(!store.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_newer_version_rejected() {
        let (store, _temp) = create_test_store();
        let mut state = StateDocument::new();
        state.version = STATE_VERSION + 1;
        store.save(&state).await.expect("save");

        assert!(matches!(
            store.load().await,
            Err(ProviderError::State(StateError::VersionMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_state() {
        let (store, _temp) = create_test_store();
        store.ensure_dir().await.expect("dir");
        std::fs::write(store.state_path(), "{not json").expect("write");

        assert!(matches!(
            store.load().await,
            Err(ProviderError::State(StateError::Corrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let (store, _temp) = create_test_store();

        let lock = store
            .acquire_lock("host:1", "apply")
            .await
            .expect("Failed to acquire lock");

        assert!(store.is_locked().await.expect("is_locked failed"));
        let info = store.get_lock_info().await.expect("info").expect("locked");
        assert_eq!(info.operation, "apply");

        store
            .release_lock(&lock.lock_id)
            .await
            .expect("Failed to release lock");

        assert!(!store.is_locked().await.expect("is_locked failed"));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = create_test_store();

        let _lock1 = store
            .acquire_lock("host:1", "apply")
            .await
            .expect("Failed to acquire first lock");

        let result = store.acquire_lock("host:2", "plan").await;
        assert!(matches!(
            result,
            Err(ProviderError::State(StateError::LockedByOther { holder, .. })) if holder == "host:1"
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_has_one_winner() {
        let temp = TempDir::new().expect("tempdir");
        let dir = temp.path().join(DEFAULT_STATE_DIR);

        for round in 0..20 {
            let tasks: Vec<_> = (0..4)
                .map(|n| {
                    let store = LocalStateStore::with_base_dir(&dir);
                    tokio::spawn(async move { store.acquire_lock(&format!("host:{n}"), "apply").await })
                })
                .collect();

            let mut winners = Vec::new();
            for task in tasks {
                if let Ok(lock) = task.await.expect("join") {
                    winners.push(lock);
                }
            }
            assert_eq!(winners.len(), 1, "round {round}");

            let store = LocalStateStore::with_base_dir(&dir);
            store.release_lock(&winners[0].lock_id).await.expect("release");
        }
    }

    #[tokio::test]
    async fn test_expired_lock_is_taken_over() {
        let (store, _temp) = create_test_store();
        let mut stale = LockInfo::new("host:1", "apply");
        stale.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
        assert!(store.create_lock_file(&stale).await.expect("seed lock"));

        let lock = store.acquire_lock("host:2", "apply").await.expect("takeover");
        let info = store.get_lock_info().await.expect("info").expect("locked");
        assert_eq!(info.lock_id, lock.lock_id);
        assert_eq!(info.holder, "host:2");

        let leftovers = std::fs::read_dir(&store.base_dir)
            .expect("read dir")
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy() != LOCK_FILE)
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_refresh_extends_held_lock() {
        let (store, _temp) = create_test_store();
        let mut lock = store.acquire_lock("host:1", "apply").await.expect("lock");
        lock.expires_at = chrono::Utc::now() + chrono::Duration::seconds(5);
        store.replace_lock_file(&lock).await.expect("shorten");

        let refreshed = store.refresh_lock(&lock).await.expect("refresh");
        assert_eq!(refreshed.lock_id, lock.lock_id);
        assert!(refreshed.expires_at > lock.expires_at);
        let info = store.get_lock_info().await.expect("info").expect("locked");
        assert_eq!(info.expires_at, refreshed.expires_at);
    }

    #[tokio::test]
    async fn test_refresh_fails_once_lock_is_lost() {
        let (store, _temp) = create_test_store();
        let lock = store.acquire_lock("host:1", "apply").await.expect("lock");
        store.release_lock(&lock.lock_id).await.expect("release");
        store.acquire_lock("host:2", "apply").await.expect("second holder");

        let err = store.refresh_lock(&lock).await.expect_err("lost");
        assert!(matches!(err, ProviderError::State(StateError::LockFailed { .. })));
        let info = store.get_lock_info().await.expect("info").expect("locked");
        assert_eq!(info.holder, "host:2");
    }

    #[tokio::test]
    async fn test_release_with_wrong_id_keeps_lock() {
        let (store, _temp) = create_test_store();
        store.acquire_lock("", "apply").await.expect("lock");
        store.release_lock("other").await.expect("release");
        assert!(store.is_locked().await.expect("is_locked"));
    }
}
