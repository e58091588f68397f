//! Cache store: durable string-keyed blob storage shared by stages and the orchestrator

pub mod records;
#[cfg(feature = "sqlite")]
pub mod store;

pub use records::{seed_cache, CacheRecord};
#[cfg(feature = "sqlite")]
pub use store::SqliteCache;

use crate::error::CacheError;
use std::collections::HashMap;
use std::sync::Arc;

/// Keys reserved for orchestrator bookkeeping
pub mod keys {
    /// Serialized DAG snapshot
    pub const PIPELINE: &str = "pipeline";
    /// Stage names of the group currently executing
    pub const IN_PROGRESS: &str = "in_progress";
    /// Cumulative stage names finished by completed groups
    pub const DONE: &str = "done";
}

/// A stored value; the store remembers whether it was written as text or bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl CacheValue {
    /// Raw bytes of the value regardless of how it was written
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CacheValue::Text(s) => s.as_bytes(),
            CacheValue::Bytes(b) => b,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CacheValue::Text(_))
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        CacheValue::Text(value)
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        CacheValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        CacheValue::Bytes(value)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(value: &[u8]) -> Self {
        CacheValue::Bytes(value.to_vec())
    }
}

/// Trait for cache backends
///
/// Implementations own their concurrency control: the orchestrator and every
/// stage of a group call into the same store without any outer locking.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a record; `None` when the key is absent
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError>;

    /// Write a record, replacing any previous value
    async fn write(&self, key: &str, value: CacheValue) -> Result<(), CacheError>;

    /// Delete a record; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// Cache handle shared by the pipeline, executors and stages
pub type SharedCache = Arc<dyn CacheStore>;

/// In-memory cache (for testing or ephemeral use)
pub struct InMemoryCache {
    records: tokio::sync::RwLock<HashMap<String, CacheValue>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            records: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    /// Create a shared handle to a fresh in-memory cache
    pub fn shared() -> SharedCache {
        Arc::new(Self::new())
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CacheStore for InMemoryCache {
    async fn read(&self, key: &str) -> Result<Option<CacheValue>, CacheError> {
        let records = self.records.read().await;
        Ok(records.get(key).cloned())
    }

    async fn write(&self, key: &str, value: CacheValue) -> Result<(), CacheError> {
        let mut records = self.records.write().await;
        records.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut records = self.records.write().await;
        records.remove(key);
        Ok(())
    }
}
