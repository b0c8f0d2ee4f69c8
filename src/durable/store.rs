//! Durable Value Stores
//!
//! [`SmallValueStore`] models a cookie jar: a per-item size ceiling, a
//! maximum item count and per-item expiry. [`LargeValueStore`] holds bulk
//! payloads without a practical size limit.

use crate::clock::{system_clock, ClockRef};
use crate::error::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Browser-compatible cookie value ceiling
pub const DEFAULT_MAX_ITEM_SIZE: usize = 4000;

/// Browser-compatible cookie count per domain
pub const DEFAULT_MAX_ITEMS: usize = 180;

// =============================================================================
// Store Traits
// =============================================================================

/// Small, synchronous, size-limited name/value store
pub trait SmallValueStore: Send + Sync {
    /// Read a value; expired values read as absent
    fn get(&self, name: &str) -> Result<Option<String>>;

    /// Write a value that expires at `expires_at_ms` (Unix millis)
    fn set(&self, name: &str, value: &str, expires_at_ms: u64) -> Result<()>;

    /// Delete a value, returning whether it existed
    fn delete(&self, name: &str) -> Result<bool>;

    /// Names of all live values
    fn names(&self) -> Result<Vec<String>>;

    /// Largest value accepted by `set`
    fn max_item_size(&self) -> usize;
}

/// Large key/value store for bulk payloads
#[async_trait]
pub trait LargeValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    async fn set_item(&self, key: &str, value: String) -> Result<()>;

    /// Remove an item, returning whether it existed
    async fn remove_item(&self, key: &str) -> Result<bool>;

    async fn keys(&self) -> Result<Vec<String>>;
}

pub type SharedSmallStore = Arc<dyn SmallValueStore>;
pub type SharedLargeStore = Arc<dyn LargeValueStore>;

// =============================================================================
// Cookie Jar
// =============================================================================

#[derive(Debug, Clone)]
struct Cookie {
    value: String,
    expires_at: u64,
}

/// In-process cookie jar
pub struct CookieJar {
    cookies: RwLock<HashMap<String, Cookie>>,
    max_item_size: usize,
    max_items: usize,
    clock: ClockRef,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_ITEM_SIZE, DEFAULT_MAX_ITEMS, system_clock())
    }

    pub fn with_limits(max_item_size: usize, max_items: usize, clock: ClockRef) -> Self {
        Self {
            cookies: RwLock::new(HashMap::new()),
            max_item_size,
            max_items,
            clock,
        }
    }

    /// Number of stored values, expired ones included
    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }

    fn purge_expired(cookies: &mut HashMap<String, Cookie>, now: u64) {
        cookies.retain(|_, cookie| now < cookie.expires_at);
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl SmallValueStore for CookieJar {
    fn get(&self, name: &str) -> Result<Option<String>> {
        let now = self.clock.now_ms();
        let mut cookies = self.cookies.write();
        match cookies.get(name) {
            Some(cookie) if now < cookie.expires_at => Ok(Some(cookie.value.clone())),
            Some(_) => {
                cookies.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, name: &str, value: &str, expires_at_ms: u64) -> Result<()> {
        let requested = (name.len() + value.len()) as u64;
        if name.len() + value.len() > self.max_item_size {
            return Err(Error::QuotaExceeded {
                requested,
                available: self.max_item_size as u64,
            });
        }

        let now = self.clock.now_ms();
        let mut cookies = self.cookies.write();
        if !cookies.contains_key(name) && cookies.len() >= self.max_items {
            Self::purge_expired(&mut cookies, now);
            if cookies.len() >= self.max_items {
                return Err(Error::QuotaExceeded {
                    requested,
                    available: 0,
                });
            }
        }

        cookies.insert(
            name.to_string(),
            Cookie {
                value: value.to_string(),
                expires_at: expires_at_ms,
            },
        );
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.cookies.write().remove(name).is_some())
    }

    fn names(&self) -> Result<Vec<String>> {
        let now = self.clock.now_ms();
        let mut cookies = self.cookies.write();
        Self::purge_expired(&mut cookies, now);
        Ok(cookies.keys().cloned().collect())
    }

    fn max_item_size(&self) -> usize {
        self.max_item_size
    }
}

// =============================================================================
// Memory Key/Value Store
// =============================================================================

/// Large store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: DashMap<String, String>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl LargeValueStore for MemoryKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).map(|v| v.value().clone()))
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        self.items.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<bool> {
        Ok(self.items.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.iter().map(|item| item.key().clone()).collect())
    }
}

// =============================================================================
// File Key/Value Store
// =============================================================================

const ITEM_EXTENSION: &str = "json";

/// Large store writing one file per key under a directory
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", urlencoding::encode(key), ITEM_EXTENSION))
    }

    fn io_error(e: std::io::Error) -> Error {
        Error::unavailable("file-kv-store", e.to_string())
    }
}

#[async_trait]
impl LargeValueStore for FileKeyValueStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.item_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(e)),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(Self::io_error)?;
        let path = self.item_path(key);
        let staging = path.with_extension("tmp");
        fs::write(&staging, value).await.map_err(Self::io_error)?;
        fs::rename(&staging, &path).await.map_err(Self::io_error)?;
        debug!(key = %key, path = %path.display(), "Stored bulk item");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.item_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error(e)),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(e)),
        };

        let mut keys = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(Self::io_error)? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ITEM_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(key) = urlencoding::decode(stem) {
                keys.push(key.into_owned());
            }
        }
        Ok(keys)
    }
}
