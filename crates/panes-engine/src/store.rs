//! Persistence of the last directory used by each slot.
//!
//! From the orchestrator's point of view both calls are fire-and-forget:
//! failures are logged and never hold up a session.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use panes_core::SessionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors raised by a directory store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("directory store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("directory store at {path} is corrupt: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Remembers the last working directory of each slot.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn load_last_directory(&self, session_id: SessionId) -> Result<Option<PathBuf>, StoreError>;

    async fn save_last_directory(&self, session_id: SessionId, path: &Path) -> Result<(), StoreError>;
}

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    directories: BTreeMap<String, PathBuf>,
}

/// JSON file store, rewritten atomically on every save.
pub struct FileDirectoryStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles.
    lock: Mutex<()>,
}

impl FileDirectoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_store(path: &Path) -> Result<StoreFile, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StoreFile::default()),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if content.trim().is_empty() {
        return Ok(StoreFile::default());
    }
    serde_json::from_str(&content).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes to a sibling temp file, syncs it, then renames it into place.
fn write_store(path: &Path, store: &StoreFile) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(store).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&json).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

fn join_error(path: &Path, e: tokio::task::JoinError) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source: io::Error::other(e),
    }
}

#[async_trait]
impl DirectoryStore for FileDirectoryStore {
    async fn load_last_directory(&self, session_id: SessionId) -> Result<Option<PathBuf>, StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let store = tokio::task::spawn_blocking(move || read_store(&path))
            .await
            .map_err(|e| join_error(&self.path, e))??;
        Ok(store.directories.get(&session_id.to_string()).cloned())
    }

    async fn save_last_directory(&self, session_id: SessionId, directory: &Path) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.path.clone();
        let directory = directory.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let mut store = read_store(&path)?;
            store.directories.insert(session_id.to_string(), directory);
            write_store(&path, &store)
        })
        .await
        .map_err(|e| join_error(&self.path, e))??;
        debug!(session_id = %session_id, path = %self.path.display(), "Saved last directory");
        Ok(())
    }
}

/// In-memory store, used when no data directory is available.
#[derive(Default)]
pub struct MemoryDirectoryStore {
    directories: Mutex<HashMap<SessionId, PathBuf>>,
}

impl MemoryDirectoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectoryStore {
    async fn load_last_directory(&self, session_id: SessionId) -> Result<Option<PathBuf>, StoreError> {
        Ok(self.directories.lock().await.get(&session_id).cloned())
    }

    async fn save_last_directory(&self, session_id: SessionId, path: &Path) -> Result<(), StoreError> {
        self.directories
            .lock()
            .await
            .insert(session_id, path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDirectoryStore::new(dir.path().join("nested").join("dirs.json"));
        assert_eq!(store.load_last_directory(id(0)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load_per_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("dirs.json");
        let store = FileDirectoryStore::new(&path);

        store.save_last_directory(id(0), Path::new("/work/alpha")).await.unwrap();
        store.save_last_directory(id(2), Path::new("/work/beta")).await.unwrap();
        store.save_last_directory(id(0), Path::new("/work/gamma")).await.unwrap();

        let reopened = FileDirectoryStore::new(&path);
        assert_eq!(
            reopened.load_last_directory(id(0)).await.unwrap(),
            Some(PathBuf::from("/work/gamma"))
        );
        assert_eq!(
            reopened.load_last_directory(id(2)).await.unwrap(),
            Some(PathBuf::from("/work/beta"))
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dirs.json");
        fs::write(&path, "{not json").unwrap();

        let store = FileDirectoryStore::new(&path);
        assert!(matches!(
            store.load_last_directory(id(1)).await,
            Err(StoreError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryDirectoryStore::new();
        store.save_last_directory(id(3), Path::new("/tmp/x")).await.unwrap();
        assert_eq!(
            store.load_last_directory(id(3)).await.unwrap(),
            Some(PathBuf::from("/tmp/x"))
        );
    }
}
