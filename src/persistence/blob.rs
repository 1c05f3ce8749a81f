use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed for key `{key}`: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Asynchronous string-keyed blob storage. Each key holds one document.
pub trait BlobStore: Send + Sync + 'static {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;
    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Process-local store. Writes are counted so callers can observe how often
/// the gateway actually hit storage.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(key: &str, value: &str) -> Self {
        let store = Self::new();
        store.insert(key, value);
        store
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every operation fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        let result = self.check_available().map(|()| self.get(key));
        async move { result }
    }

    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        let result = self.check_available().map(|()| {
            self.insert(key, value);
            self.writes.fetch_add(1, Ordering::SeqCst);
        });
        async move { result }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        let result = self.check_available().map(|()| {
            self.blobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(key);
        });
        async move { result }
    }
}

/// One JSON file per key inside a data directory. Writes go to a temporary
/// sibling first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.json"))
    }
}

fn io_error(key: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |source| StorageError::Io {
        key: key.to_string(),
        source,
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send {
        let path = self.path_for(key);
        let key = key.to_string();
        async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(io_error(&key)(e)),
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        let dir = self.dir.clone();
        let key = key.to_string();
        let value = value.to_string();
        async move {
            tokio::fs::create_dir_all(&dir).await.map_err(io_error(&key))?;
            tokio::fs::write(&tmp_path, value.as_bytes())
                .await
                .map_err(io_error(&key))?;
            tokio::fs::rename(&tmp_path, &path)
                .await
                .map_err(io_error(&key))
        }
    }

    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send {
        let path = self.path_for(key);
        let key = key.to_string();
        async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_error(&key)(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_counts_successful_writes() {
        let store = MemoryBlobStore::new();
        store.write("k", "v1").await.expect("write");
        store.write("k", "v2").await.expect("write");
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.read("k").await.expect("read").as_deref(), Some("v2"));

        store.set_unavailable(true);
        assert!(matches!(
            store.write("k", "v3").await,
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(store.write_count(), 2);

        store.set_unavailable(false);
        store.remove("k").await.expect("remove");
        assert_eq!(store.read("k").await.expect("read"), None);
    }

    #[tokio::test]
    async fn file_store_round_trips_and_tolerates_missing_files() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let store = FileBlobStore::new(dir.path().join("nested"));

        assert_eq!(store.read("scenario-store").await.expect("read"), None);
        store.remove("scenario-store").await.expect("remove missing");

        store
            .write("scenario-store", "{\"version\":1}")
            .await
            .expect("write");
        assert!(store.path_for("scenario-store").exists());
        assert_eq!(
            store.read("scenario-store").await.expect("read").as_deref(),
            Some("{\"version\":1}")
        );

        store.remove("scenario-store").await.expect("remove");
        assert!(!store.path_for("scenario-store").exists());
    }

    #[test]
    fn file_names_are_sanitized() {
        let store = FileBlobStore::new("/data");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/data/___etc_passwd.json")
        );
    }
}
