//! Persistent key-value storage for credentials.
//!
//! Two string-keyed entries back the whole session: the bearer token
//! and the serialized user record. Operations are individually atomic
//! but there is no cross-key transaction; callers tolerate partial
//! records (hydration treats them as "no session").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use swwap_shared::ClientError;

/// Storage key for the opaque bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";
/// Storage key for the JSON-serialized user record.
pub const USER_DATA_KEY: &str = "user_data";

/// Asynchronous key-value store for credentials.
///
/// Failures are `ClientError::Storage`; callers treat them as "session
/// not establishable" rather than crashing.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
    async fn remove(&self, key: &str) -> Result<(), ClientError>;
}

// --- File-backed store ---

/// One file per key in the platform config directory:
/// - Linux: `~/.config/swwap/`
/// - macOS: `~/Library/Application Support/swwap/`
/// - Windows: `%APPDATA%\swwap\`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open the store in the platform config directory, creating it if
    /// needed.
    pub fn new() -> Result<Self, ClientError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ClientError::Storage("no config directory on this platform".into()))?;
        Self::in_dir(config_dir.join("swwap"))
    }

    /// Open the store in an explicit directory (tests use a tempdir).
    pub fn in_dir(dir: PathBuf) -> Result<Self, ClientError> {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .map_err(|e| ClientError::Storage(format!("cannot create {}: {e}", dir.display())))?;
        }
        Ok(Self { dir })
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{safe_key}.json"))
    }
}

#[async_trait]
impl CredentialStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        match tokio::fs::read_to_string(self.file_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClientError::Storage(format!("cannot read {key}: {e}"))),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        tokio::fs::write(self.file_path(key), value)
            .await
            .map_err(|e| ClientError::Storage(format!("cannot write {key}: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        match tokio::fs::remove_file(self.file_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::Storage(format!("cannot remove {key}: {e}"))),
        }
    }
}

// --- In-memory store ---

/// In-memory store for tests and previews. `fail_next` poisons the
/// next operation to exercise storage-failure paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    fail_next: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next storage operation fail with `ClientError::Storage`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn check_poisoned(&self) -> Result<(), ClientError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            Err(ClientError::Storage("storage unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        self.check_poisoned()?;
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.check_poisoned()?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.check_poisoned()?;
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().to_path_buf()).unwrap();

        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
        store.set(AUTH_TOKEN_KEY, "t1").await.unwrap();
        assert_eq!(
            store.get(AUTH_TOKEN_KEY).await.unwrap(),
            Some("t1".to_string())
        );
        store.remove(AUTH_TOKEN_KEY).await.unwrap();
        assert_eq!(store.get(AUTH_TOKEN_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().to_path_buf()).unwrap();
        store.remove("never_written").await.unwrap();
    }

    #[tokio::test]
    async fn file_store_sanitizes_hostile_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::in_dir(dir.path().to_path_buf()).unwrap();
        store.set("../escape:attempt", "v").await.unwrap();
        assert_eq!(
            store.get("../escape:attempt").await.unwrap(),
            Some("v".to_string())
        );
        // The file must land inside the store directory.
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn memory_store_poison_fails_one_operation() {
        let store = MemoryStore::new();
        store.set("k", "v").await.unwrap();
        store.fail_next();
        assert!(matches!(
            store.get("k").await,
            Err(ClientError::Storage(_))
        ));
        // Poison clears after one failure.
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }
}
