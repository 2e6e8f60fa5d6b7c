use crate::error::{Result, VectorStoreError};
use crate::types::FaceEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub const COLLECTION_SCHEMA_VERSION: u32 = 1;

/// Capability contract for the durable storage engine.
///
/// Only the store writes through this trait; any engine that can list,
/// insert, delete, and count entries is substitutable. Implementations must
/// make `insert_one`/`delete_by_id` all-or-nothing: a failed call leaves the
/// persisted collection exactly as it was.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    async fn list_all(&self) -> Result<Vec<FaceEntry>>;
    async fn insert_one(&self, entry: &FaceEntry) -> Result<()>;
    async fn delete_by_id(&self, id: &str) -> Result<()>;
    async fn count(&self) -> Result<usize>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCollection {
    schema_version: u32,
    entries: Vec<FaceEntry>,
}

/// File-backed engine: the whole collection lives in one versioned JSON
/// document, rewritten atomically (tmp write + rename) on every mutation.
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    async fn read_collection(&self) -> Result<Vec<FaceEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let bytes = tokio::fs::read(&self.path).await?;
        let persisted: PersistedCollection = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != COLLECTION_SCHEMA_VERSION {
            return Err(VectorStoreError::Persistence(format!(
                "Unsupported collection schema_version {} (expected {COLLECTION_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }
        Ok(persisted.entries)
    }

    async fn write_collection(&self, entries: Vec<FaceEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let persisted = PersistedCollection {
            schema_version: COLLECTION_SCHEMA_VERSION,
            entries,
        };
        let data = serde_json::to_vec_pretty(&persisted)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl VectorBackend for JsonFileBackend {
    async fn list_all(&self) -> Result<Vec<FaceEntry>> {
        self.read_collection().await
    }

    async fn insert_one(&self, entry: &FaceEntry) -> Result<()> {
        let mut entries = self.read_collection().await?;
        entries.push(entry.clone());
        self.write_collection(entries).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        let mut entries = self.read_collection().await?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(VectorStoreError::NotFound(id.to_string()));
        }
        self.write_collection(entries).await
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read_collection().await?.len())
    }
}

/// In-process engine for tests. Writes can be switched to fail so callers
/// can verify that a persistence failure never becomes visible state.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<Vec<FaceEntry>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(VectorStoreError::Persistence(
                "injected write failure".to_string(),
            ));
        }
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FaceEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn list_all(&self) -> Result<Vec<FaceEntry>> {
        Ok(self.lock().clone())
    }

    async fn insert_one(&self, entry: &FaceEntry) -> Result<()> {
        self.check_writable()?;
        self.lock().push(entry.clone());
        Ok(())
    }

    async fn delete_by_id(&self, id: &str) -> Result<()> {
        self.check_writable()?;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(VectorStoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock().len())
    }
}
