//! File-Backed Persistent Store
//!
//! Each entry is a body file plus a JSON `.meta` sidecar under
//! `root/namespace/`, both named after the SHA-256 of the key:
//!
//! ```text
//! <sha256>.meta          sidecar: key, metadata, body generation
//! <sha256>.<gen>.bin     body written by generation <gen>
//! ```
//!
//! A put stages a fresh body file, then atomically renames the sidecar into
//! place; that rename commits the entry. Bodies no sidecar refers to, and
//! staging files, are removed when the index is rebuilt on open.

use crate::cache::entry::{CompressionAlgorithm, EntryMetadata};
use crate::cache::storage::{sort_index, DiskIndexRecord, DiskRecord, IndexOrder, PersistentStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

const STORE_NAME: &str = "file-store";

const META_EXTENSION: &str = "meta";
const BODY_EXTENSION: &str = "bin";
const STAGING_EXTENSION: &str = "tmp";

// =============================================================================
// File Store Configuration
// =============================================================================

/// Configuration for the file store
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Root directory; namespaces are created beneath it
    pub root_path: PathBuf,
    /// Whether to sync files to disk before they are renamed into place
    pub sync_writes: bool,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from(".stac-cache"),
            sync_writes: false,
        }
    }
}

// =============================================================================
// Sidecar Metadata
// =============================================================================

/// Metadata stored next to each body file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredMetadata {
    key: String,
    metadata: EntryMetadata,
    algorithm: CompressionAlgorithm,
    generation: u64,
    body_size: u64,
    last_accessed: u64,
    access_count: u64,
}

impl StoredMetadata {
    fn index_record(&self) -> DiskIndexRecord {
        DiskIndexRecord {
            key: self.key.clone(),
            timestamp: self.metadata.timestamp,
            last_accessed: self.last_accessed,
            access_count: self.access_count,
            size: self.body_size,
        }
    }
}

#[derive(Debug, Clone)]
struct IndexSlot {
    meta_path: PathBuf,
    body_path: PathBuf,
    record: DiskIndexRecord,
}

// =============================================================================
// File Store
// =============================================================================

/// Persistent store on the local filesystem
pub struct FileStore {
    root_path: PathBuf,
    sync_writes: bool,
    namespace_dir: RwLock<Option<PathBuf>>,
    index: RwLock<HashMap<String, IndexSlot>>,
    next_generation: AtomicU64,
}

impl FileStore {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self::with_config(FileStoreConfig {
            root_path: root_path.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: FileStoreConfig) -> Self {
        Self {
            root_path: config.root_path,
            sync_writes: config.sync_writes,
            namespace_dir: RwLock::new(None),
            index: RwLock::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    /// Number of indexed records
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn dir(&self) -> Result<PathBuf> {
        self.namespace_dir
            .read()
            .clone()
            .ok_or_else(|| Error::unavailable(STORE_NAME, "store has not been opened"))
    }

    /// File stem for a key; stable across builds and platforms
    fn stem(key: &str) -> String {
        hex::encode(Sha256::digest(key.as_bytes()))
    }

    fn meta_path(dir: &Path, key: &str) -> PathBuf {
        dir.join(format!("{}.{}", Self::stem(key), META_EXTENSION))
    }

    fn body_path(dir: &Path, key: &str, generation: u64) -> PathBuf {
        dir.join(format!("{}.{}.{}", Self::stem(key), generation, BODY_EXTENSION))
    }

    fn io_error(reason: std::io::Error) -> Error {
        Error::unavailable(STORE_NAME, reason.to_string())
    }

    /// Write `contents` to a staging file, then rename it over `path`
    async fn write_atomic(path: &Path, contents: &[u8], sync: bool) -> Result<()> {
        let mut staging = path.as_os_str().to_owned();
        staging.push(".");
        staging.push(STAGING_EXTENSION);
        let staging = PathBuf::from(staging);

        let written = async {
            let mut file = fs::File::create(&staging).await?;
            file.write_all(contents).await?;
            if sync {
                file.sync_all().await?;
            }
            drop(file);
            fs::rename(&staging, path).await
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&staging).await;
            return Err(Self::io_error(e));
        }
        Ok(())
    }

    async fn write_meta(&self, path: &Path, meta: &StoredMetadata) -> Result<()> {
        let json = serde_json::to_vec(meta)?;
        Self::write_atomic(path, &json, self.sync_writes).await
    }

    async fn remove_if_present(path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(e)),
        }
    }

    /// Read and validate the sidecar at `meta_path`
    async fn load_meta(dir: &Path, meta_path: &Path) -> Option<(StoredMetadata, PathBuf)> {
        let json = fs::read_to_string(meta_path).await.ok()?;
        let meta: StoredMetadata = serde_json::from_str(&json).ok()?;
        if Self::meta_path(dir, &meta.key) != meta_path {
            return None;
        }
        let body_path = Self::body_path(dir, &meta.key, meta.generation);
        let size = fs::metadata(&body_path).await.ok()?.len();
        (size == meta.body_size).then_some((meta, body_path))
    }

    /// Rebuild the index from the sidecars, removing everything that is not
    /// part of a committed entry
    async fn rebuild_index(&self, dir: &Path) -> Result<()> {
        let mut metas = Vec::new();
        let mut bodies = Vec::new();
        let mut entries = fs::read_dir(dir).await.map_err(Self::io_error)?;

        while let Some(entry) = entries.next_entry().await.map_err(Self::io_error)? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(META_EXTENSION) => metas.push(path),
                Some(BODY_EXTENSION) => bodies.push(path),
                Some(STAGING_EXTENSION) => {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
                _ => {}
            }
        }

        let mut rebuilt = HashMap::new();
        let mut committed = HashSet::new();
        let mut max_generation = None;

        for meta_path in metas {
            match Self::load_meta(dir, &meta_path).await {
                Some((meta, body_path)) => {
                    max_generation = max_generation.max(Some(meta.generation));
                    committed.insert(body_path.clone());
                    let slot = IndexSlot {
                        meta_path,
                        body_path,
                        record: meta.index_record(),
                    };
                    rebuilt.insert(meta.key, slot);
                }
                None => {
                    warn!(path = %meta_path.display(), "Removing unreadable cache record");
                    let _ = fs::remove_file(&meta_path).await;
                }
            }
        }

        for body_path in bodies.iter().filter(|path| !committed.contains(*path)) {
            debug!(path = %body_path.display(), "Removing uncommitted body");
            let _ = fs::remove_file(body_path).await;
        }

        if let Some(max) = max_generation {
            self.next_generation.fetch_max(max + 1, Ordering::SeqCst);
        }
        debug!(entries = rebuilt.len(), "Rebuilt file store index");
        *self.index.write() = rebuilt;
        Ok(())
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    fn name(&self) -> &str {
        STORE_NAME
    }

    async fn open(&self, namespace: &str) -> Result<()> {
        let dir = self.root_path.join(namespace);
        fs::create_dir_all(&dir).await.map_err(Self::io_error)?;
        self.rebuild_index(&dir).await?;
        *self.namespace_dir.write() = Some(dir);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<DiskRecord>> {
        self.dir()?;
        let (meta_path, body_path) = match self.index.read().get(key) {
            Some(slot) => (slot.meta_path.clone(), slot.body_path.clone()),
            None => return Ok(None),
        };

        let json = match fs::read_to_string(&meta_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.index.write().remove(key);
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(e)),
        };
        let meta: StoredMetadata = serde_json::from_str(&json)?;
        if meta.key != key {
            return Err(Error::Serialization(format!(
                "record for {} holds key {}",
                key, meta.key
            )));
        }

        let body = match fs::read(&body_path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::Serialization(format!("body missing for {}", key)));
            }
            Err(e) => return Err(Self::io_error(e)),
        };
        if body.len() as u64 != meta.body_size {
            return Err(Error::Serialization(format!(
                "body for {} holds {} bytes, expected {}",
                key,
                body.len(),
                meta.body_size
            )));
        }

        Ok(Some(DiskRecord {
            key: meta.key,
            metadata: meta.metadata,
            algorithm: meta.algorithm,
            body: Bytes::from(body),
        }))
    }

    async fn put(&self, record: DiskRecord) -> Result<()> {
        let dir = self.dir()?;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let meta_path = Self::meta_path(&dir, &record.key);
        let body_path = Self::body_path(&dir, &record.key, generation);

        Self::write_atomic(&body_path, &record.body, self.sync_writes).await?;

        let index_record = record.index_record();
        let body_size = record.size();
        let meta = StoredMetadata {
            key: record.key.clone(),
            metadata: record.metadata,
            algorithm: record.algorithm,
            generation,
            body_size,
            last_accessed: index_record.last_accessed,
            access_count: index_record.access_count,
        };
        if let Err(e) = self.write_meta(&meta_path, &meta).await {
            let _ = fs::remove_file(&body_path).await;
            return Err(e);
        }

        let replaced = self.index.write().insert(
            record.key,
            IndexSlot {
                meta_path,
                body_path,
                record: index_record,
            },
        );
        if let Some(previous) = replaced {
            if let Err(e) = Self::remove_if_present(&previous.body_path).await {
                warn!(path = %previous.body_path.display(), error = %e, "Failed to remove replaced body");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.dir()?;
        let slot = match self.index.write().remove(key) {
            Some(slot) => slot,
            None => return Ok(false),
        };

        // Sidecar first: without it the body is an orphan, never a record
        Self::remove_if_present(&slot.meta_path).await?;
        Self::remove_if_present(&slot.body_path).await?;
        Ok(true)
    }

    async fn touch(&self, key: &str, at_ms: u64) -> Result<()> {
        self.dir()?;
        let meta_path = {
            let mut index = self.index.write();
            match index.get_mut(key) {
                Some(slot) => {
                    slot.record.last_accessed = at_ms;
                    slot.record.access_count += 1;
                    slot.meta_path.clone()
                }
                None => return Ok(()),
            }
        };

        let json = fs::read_to_string(&meta_path).await.map_err(Self::io_error)?;
        let mut meta: StoredMetadata = serde_json::from_str(&json)?;
        meta.last_accessed = at_ms;
        meta.access_count += 1;
        self.write_meta(&meta_path, &meta).await
    }

    async fn scan_index(&self, order: IndexOrder) -> Result<Vec<DiskIndexRecord>> {
        self.dir()?;
        let mut records: Vec<DiskIndexRecord> = self
            .index
            .read()
            .values()
            .map(|slot| slot.record.clone())
            .collect();
        sort_index(&mut records, order);
        Ok(records)
    }

    async fn size_bytes(&self) -> Result<u64> {
        self.dir()?;
        Ok(self.index.read().values().map(|slot| slot.record.size).sum())
    }

    async fn clear(&self) -> Result<()> {
        let dir = self.dir()?;
        self.index.write().clear();
        fs::remove_dir_all(&dir).await.map_err(Self::io_error)?;
        fs::create_dir_all(&dir).await.map_err(Self::io_error)?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.dir() {
            Ok(dir) => Ok(fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::tests::test_record;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    async fn opened(dir: &TempDir) -> FileStore {
        let store = FileStore::new(dir.path());
        store.open("stac").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_basic_operations() {
        let dir = TempDir::new().unwrap();
        let store = opened(&dir).await;

        store.put(test_record("https://a/collections", b"hello world", 1)).await.unwrap();
        assert_eq!(store.size_bytes().await.unwrap(), 11);

        let record = store.get("https://a/collections").await.unwrap().unwrap();
        assert_eq!(record.body.as_ref(), b"hello world");
        assert_eq!(record.metadata.url, "https://a/collections");

        assert!(store.delete("https://a/collections").await.unwrap());
        assert!(store.get("https://a/collections").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_not_opened() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        assert_matches!(store.get("k").await, Err(Error::StorageUnavailable { .. }));
        assert!(!store.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_index_rebuilt_on_open() {
        let dir = TempDir::new().unwrap();
        {
            let store = opened(&dir).await;
            store.put(test_record("a", b"12345", 1)).await.unwrap();
            store.put(test_record("b", b"123", 2)).await.unwrap();
            store.touch("a", 50).await.unwrap();
        }

        let reopened = opened(&dir).await;
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.size_bytes().await.unwrap(), 8);

        let index = reopened.scan_index(IndexOrder::LastAccessed).await.unwrap();
        assert_eq!(index[0].key, "b");
        assert_eq!(index[1].last_accessed, 50);
        assert_eq!(index[1].access_count, 2);
    }

    #[tokio::test]
    async fn test_corrupt_sidecar_removed_on_open() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("stac");
        std::fs::create_dir_all(&ns).unwrap();
        std::fs::write(ns.join("deadbeef.meta"), b"{not json").unwrap();
        std::fs::write(ns.join("deadbeef.0.bin"), b"body").unwrap();

        let store = opened(&dir).await;
        assert!(store.is_empty());
        assert!(!ns.join("deadbeef.meta").exists());
        assert!(!ns.join("deadbeef.0.bin").exists());
    }

    #[tokio::test]
    async fn test_missing_data_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = opened(&dir).await;
        store.put(test_record("a", b"12345", 1)).await.unwrap();

        let body_path = store.index.read()["a"].body_path.clone();
        std::fs::remove_file(body_path).unwrap();

        let err = store.get("a").await.unwrap_err();
        assert!(err.is_corruption());
    }

    fn files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(extension))
            .collect()
    }

    #[test]
    fn test_file_names_are_stable() {
        let dir = Path::new("/cache/stac");
        assert_eq!(
            FileStore::meta_path(dir, "https://a/collections"),
            dir.join("4cef3070b6ccd3120d03c3b86e2733660166156c64f38c31ad0b0840a4f24f14.meta")
        );
        assert_eq!(
            FileStore::body_path(dir, "https://a/collections", 3),
            dir.join("4cef3070b6ccd3120d03c3b86e2733660166156c64f38c31ad0b0840a4f24f14.3.bin")
        );
    }

    #[tokio::test]
    async fn test_overwrite_replaces_body() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("stac");
        let store = opened(&dir).await;

        store.put(test_record("a", b"12345", 1)).await.unwrap();
        store.put(test_record("a", b"abc", 2)).await.unwrap();

        assert_eq!(store.get("a").await.unwrap().unwrap().body.as_ref(), b"abc");
        assert_eq!(store.size_bytes().await.unwrap(), 3);
        assert_eq!(files_with_extension(&ns, "bin").len(), 1);
        assert_eq!(files_with_extension(&ns, "meta").len(), 1);
    }

    #[tokio::test]
    async fn test_failed_sidecar_write_keeps_previous_entry() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("stac");
        let store = opened(&dir).await;
        store.put(test_record("a", b"12345", 1)).await.unwrap();

        // Occupy the sidecar's staging path so the commit fails
        let staging = ns.join(format!("{}.meta.tmp", FileStore::stem("a")));
        std::fs::create_dir(&staging).unwrap();

        assert!(store.put(test_record("a", b"abc", 2)).await.is_err());
        assert_eq!(store.get("a").await.unwrap().unwrap().body.as_ref(), b"12345");
        assert_eq!(files_with_extension(&ns, "bin").len(), 1);

        std::fs::remove_dir(&staging).unwrap();
        let reopened = opened(&dir).await;
        assert_eq!(reopened.get("a").await.unwrap().unwrap().body.as_ref(), b"12345");
    }

    #[tokio::test]
    async fn test_uncommitted_files_removed_on_open() {
        let dir = TempDir::new().unwrap();
        let ns = dir.path().join("stac");
        {
            let store = opened(&dir).await;
            store.put(test_record("a", b"12345", 1)).await.unwrap();
        }

        // A body whose sidecar never landed, and a half-written staging file
        let orphan = FileStore::body_path(&ns, "b", 41);
        std::fs::write(&orphan, b"partial").unwrap();
        let staging = ns.join(format!("{}.meta.tmp", FileStore::stem("b")));
        std::fs::write(&staging, b"{").unwrap();

        let store = opened(&dir).await;
        assert_eq!(store.len(), 1);
        assert!(!orphan.exists());
        assert!(!staging.exists());
        assert_eq!(files_with_extension(&ns, "bin").len(), 1);

        // Generations continue past what is on disk
        store.put(test_record("c", b"1", 1)).await.unwrap();
        let body = store.index.read()["c"].body_path.clone();
        assert_eq!(body, FileStore::body_path(&ns, "c", 1));
    }

    #[tokio::test]
    async fn test_truncated_body_is_corruption() {
        let dir = TempDir::new().unwrap();
        let store = opened(&dir).await;
        store.put(test_record("a", b"12345", 1)).await.unwrap();

        let body_path = store.index.read()["a"].body_path.clone();
        std::fs::write(body_path, b"12").unwrap();

        assert!(store.get("a").await.unwrap_err().is_corruption());
    }

    #[tokio::test]
    async fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = opened(&dir).await;
        store.put(test_record("a", b"1", 1)).await.unwrap();
        store.put(test_record("b", b"2", 1)).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert!(store.health_check().await.unwrap());
        assert_eq!(store.scan_index(IndexOrder::Timestamp).await.unwrap().len(), 0);
    }
}
