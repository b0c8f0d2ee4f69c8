//! Cache Storage Backends
//!
//! The memory tier lives in-process ([`MemoryTier`]); the disk tier is any
//! [`PersistentStore`] implementation.

mod local;
mod memory;
mod persistent;

pub use local::FileStore;
pub use memory::{InsertOutcome, MemoryTier};
pub use persistent::InMemoryStore;

use crate::cache::entry::{CacheData, CacheEntry, CompressionAlgorithm, EntryMetadata};
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Disk Records
// =============================================================================

/// A persisted cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct DiskRecord {
    /// Cache key
    pub key: String,
    /// Entry metadata (expiry, sizes, response metadata)
    pub metadata: EntryMetadata,
    /// Algorithm the body is compressed with
    pub algorithm: CompressionAlgorithm,
    /// Stored body
    pub body: Bytes,
}

impl DiskRecord {
    /// Stored size in bytes
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    /// Index record written alongside this entry
    pub fn index_record(&self) -> DiskIndexRecord {
        DiskIndexRecord {
            key: self.key.clone(),
            timestamp: self.metadata.timestamp,
            last_accessed: self.metadata.timestamp,
            access_count: 1,
            size: self.size(),
        }
    }

    /// Rebuild the in-memory entry
    pub fn into_entry(self) -> CacheEntry {
        let data = match self.algorithm {
            CompressionAlgorithm::None => CacheData::uncompressed(self.body),
            algorithm => CacheData::compressed(self.body, self.metadata.original_size, algorithm),
        };
        CacheEntry::new(self.key, data, self.metadata)
    }
}

impl From<&CacheEntry> for DiskRecord {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            metadata: entry.metadata.clone(),
            algorithm: entry.data.algorithm(),
            body: entry.data.bytes.clone(),
        }
    }
}

/// Secondary index row used for eviction and cleanup without reading bodies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskIndexRecord {
    pub key: String,
    /// Creation time (Unix millis)
    pub timestamp: u64,
    /// Last access (Unix millis)
    pub last_accessed: u64,
    pub access_count: u64,
    /// Stored size in bytes
    pub size: u64,
}

/// Ordering for index scans (ascending)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Timestamp,
    LastAccessed,
}

pub(crate) fn sort_index(records: &mut [DiskIndexRecord], order: IndexOrder) {
    match order {
        IndexOrder::Timestamp => records.sort_by(|a, b| {
            a.timestamp.cmp(&b.timestamp).then_with(|| a.key.cmp(&b.key))
        }),
        IndexOrder::LastAccessed => records.sort_by(|a, b| {
            a.last_accessed
                .cmp(&b.last_accessed)
                .then_with(|| a.key.cmp(&b.key))
        }),
    }
}

// =============================================================================
// PersistentStore Trait
// =============================================================================

/// Key/record store with an ordered secondary index backing the disk tier.
///
/// A store is opened once per cache instance. Every operation on a store
/// that is closed or unreachable fails with `Error::StorageUnavailable`.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Open (or create) the namespace
    async fn open(&self, namespace: &str) -> Result<()>;

    /// Get a record by key
    async fn get(&self, key: &str) -> Result<Option<DiskRecord>>;

    /// Store a record and its index row together, replacing any previous one
    async fn put(&self, record: DiskRecord) -> Result<()>;

    /// Delete a record and its index row; returns whether it existed
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Update access bookkeeping for a key
    async fn touch(&self, key: &str, at_ms: u64) -> Result<()>;

    /// Read the whole index in ascending `order`
    async fn scan_index(&self, order: IndexOrder) -> Result<Vec<DiskIndexRecord>>;

    /// Aggregate stored size in bytes
    async fn size_bytes(&self) -> Result<u64>;

    /// Remove every record in the namespace
    async fn clear(&self) -> Result<()>;

    /// Check if the store is reachable
    async fn health_check(&self) -> Result<bool>;
}

/// Shared persistent store handle
pub type SharedPersistentStore = Arc<dyn PersistentStore>;
