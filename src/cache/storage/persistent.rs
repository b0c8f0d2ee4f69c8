//! In-Memory Persistent Store
//!
//! A [`PersistentStore`] kept entirely in process. It enforces a hard quota
//! and can be switched unavailable, which makes it the store of choice for
//! exercising disk-tier degradation.

use crate::cache::storage::{sort_index, DiskIndexRecord, DiskRecord, IndexOrder, PersistentStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

const STORE_NAME: &str = "in-memory-store";

// =============================================================================
// In-Memory Store Configuration
// =============================================================================

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Hard quota in bytes; writes beyond it fail with `QuotaExceeded`
    pub quota_bytes: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            quota_bytes: 1024 * 1024 * 1024, // 1 GB
        }
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

#[derive(Debug, Clone)]
struct StoredRecord {
    record: DiskRecord,
    index: DiskIndexRecord,
}

/// Persistent store backed by a process-local map
pub struct InMemoryStore {
    records: RwLock<HashMap<String, StoredRecord>>,
    namespace: RwLock<Option<String>>,
    size_bytes: AtomicU64,
    quota_bytes: u64,
    available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self::with_config(InMemoryStoreConfig { quota_bytes })
    }

    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            namespace: RwLock::new(None),
            size_bytes: AtomicU64::new(0),
            quota_bytes: config.quota_bytes,
            available: AtomicBool::new(true),
        }
    }

    /// Set availability (for testing)
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    /// Namespace the store was opened with
    pub fn namespace(&self) -> Option<String> {
        self.namespace.read().clone()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn ensure_ready(&self) -> Result<()> {
        if !self.is_available() {
            return Err(Error::unavailable(STORE_NAME, "store is offline"));
        }
        if self.namespace.read().is_none() {
            return Err(Error::unavailable(STORE_NAME, "store has not been opened"));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistentStore for InMemoryStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        if !self.is_available() {
            return Err(Error::unavailable(STORE_NAME, "store is offline"));
        }
        *self.namespace.write() = Some(namespace.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<DiskRecord>> {
        self.ensure_ready()?;
        Ok(self.records.read().get(key).map(|stored| stored.record.clone()))
    }

    async fn put(&self, record: DiskRecord) -> Result<()> {
        self.ensure_ready()?;

        let mut records = self.records.write();
        let old_size = records.get(&record.key).map(|s| s.index.size).unwrap_or(0);
        let current = self.size_bytes.load(Ordering::Relaxed).saturating_sub(old_size);
        let new_size = record.size();

        if current + new_size > self.quota_bytes {
            return Err(Error::QuotaExceeded {
                requested: new_size,
                available: self.quota_bytes.saturating_sub(current),
            });
        }

        let index = record.index_record();
        records.insert(record.key.clone(), StoredRecord { record, index });
        self.size_bytes.store(current + new_size, Ordering::Relaxed);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_ready()?;
        match self.records.write().remove(key) {
            Some(stored) => {
                self.size_bytes.fetch_sub(stored.index.size, Ordering::Relaxed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn touch(&self, key: &str, at_ms: u64) -> Result<()> {
        self.ensure_ready()?;
        if let Some(stored) = self.records.write().get_mut(key) {
            stored.index.last_accessed = at_ms;
            stored.index.access_count += 1;
        }
        Ok(())
    }

    async fn scan_index(&self, order: IndexOrder) -> Result<Vec<DiskIndexRecord>> {
        self.ensure_ready()?;
        let mut index: Vec<DiskIndexRecord> = self
            .records
            .read()
            .values()
            .map(|stored| stored.index.clone())
            .collect();
        sort_index(&mut index, order);
        Ok(index)
    }

    async fn size_bytes(&self) -> Result<u64> {
        self.ensure_ready()?;
        Ok(self.size_bytes.load(Ordering::Relaxed))
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_ready()?;
        self.records.write().clear();
        self.size_bytes.store(0, Ordering::Relaxed);
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.is_available())
    }
}
