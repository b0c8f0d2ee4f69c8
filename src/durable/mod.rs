//! Durable Key/Value Cache
//!
//! Long-lived values (user preferences, catalog listings) kept in a
//! cookie-style [`SmallValueStore`], with a [`LargeValueStore`] for bulk
//! payloads.
//!
//! Small entries are serialized, optionally dictionary-compressed and, when
//! still above the per-item ceiling, split into `{name}_part{n}` chunks
//! behind a `{"chunks": N}` manifest. Every read failure is a miss that
//! removes whatever is left of the entry.

pub mod dictionary;
pub mod store;

pub use store::{
    CookieJar, FileKeyValueStore, LargeValueStore, MemoryKeyValueStore, SharedLargeStore,
    SharedSmallStore, SmallValueStore,
};

use crate::clock::{system_clock, ClockRef};
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

const DAY_MS: u64 = 86_400_000;

/// Room for `_part{n}` appended to an entry's name
const PART_NAME_RESERVE: usize = "_part".len() + 4;

/// Current entry format; entries written with another version are misses
pub const ENTRY_VERSION: u32 = 1;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the durable cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurableCacheConfig {
    /// Prefix of every small-store name owned by the cache
    pub prefix: String,
    /// Prefix of bulk entries in the large store
    pub bulk_prefix: String,
    /// Per-item ceiling of the small store
    pub max_item_size: usize,
    /// Margin reserved for the item name and store metadata in each chunk
    pub chunk_overhead: usize,
    /// Serialized size above which dictionary compression is attempted
    pub compression_threshold: usize,
    /// Serialized size above which entries go to the large store
    pub large_object_threshold: usize,
    pub default_expiration_days: u32,
    pub version: u32,
}

impl Default for DurableCacheConfig {
    fn default() -> Self {
        Self {
            prefix: "stac_".to_string(),
            bulk_prefix: "stac_bulk_".to_string(),
            max_item_size: store::DEFAULT_MAX_ITEM_SIZE,
            chunk_overhead: 200,
            compression_threshold: 1000,
            large_object_threshold: 32 * 1024,
            default_expiration_days: 30,
            version: ENTRY_VERSION,
        }
    }
}

impl DurableCacheConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_overhead >= self.max_item_size {
            return Err(Error::Configuration(format!(
                "chunk_overhead ({}) must be smaller than max_item_size ({})",
                self.chunk_overhead, self.max_item_size
            )));
        }
        if self.prefix.is_empty() || !self.bulk_prefix.starts_with(&self.prefix) {
            return Err(Error::Configuration(
                "bulk_prefix must extend a non-empty prefix".into(),
            ));
        }
        Ok(())
    }

    /// Bytes of payload carried by each chunk
    pub fn chunk_size(&self) -> usize {
        self.max_item_size - self.chunk_overhead
    }

    /// Bytes of payload each chunk of the entry stored as `name` can carry.
    ///
    /// Zero when the part names alone would fill an item.
    pub fn chunk_size_for(&self, name: &str) -> usize {
        let named = self
            .max_item_size
            .saturating_sub(name.len() + PART_NAME_RESERVE);
        self.chunk_size().min(named)
    }
}

// =============================================================================
// Entries
// =============================================================================

/// A stored value with its expiration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableEntry {
    pub data: Value,
    /// Write time (Unix millis)
    pub timestamp: u64,
    /// Expiration time (Unix millis)
    pub expires: u64,
    pub version: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChunkManifest {
    chunks: usize,
}

/// Options for [`DurableKeyValueCache::set_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurableSetOptions {
    /// Lifetime in days; the configured default when unset
    pub expiration_days: Option<u32>,
    /// Store in the large store regardless of size
    pub bulk: bool,
}

impl DurableSetOptions {
    pub fn expiring_in(days: u32) -> Self {
        Self {
            expiration_days: Some(days),
            ..Default::default()
        }
    }

    pub fn bulk() -> Self {
        Self {
            bulk: true,
            ..Default::default()
        }
    }
}

/// Storage usage of the durable cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DurableStats {
    /// Entries in the small store (chunked entries count once)
    pub entries: usize,
    pub chunks: usize,
    pub bulk_entries: usize,
    pub small_bytes: usize,
    pub bulk_bytes: usize,
}

// =============================================================================
// Durable Key/Value Cache
// =============================================================================

/// Best-effort durable cache over a small and a large store
pub struct DurableKeyValueCache {
    config: DurableCacheConfig,
    small: SharedSmallStore,
    large: SharedLargeStore,
    clock: ClockRef,
}

impl DurableKeyValueCache {
    pub fn new(
        config: DurableCacheConfig,
        small: SharedSmallStore,
        large: SharedLargeStore,
    ) -> Result<Self> {
        Self::with_clock(config, small, large, system_clock())
    }

    pub fn with_clock(
        config: DurableCacheConfig,
        small: SharedSmallStore,
        large: SharedLargeStore,
        clock: ClockRef,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            small,
            large,
            clock,
        })
    }

    pub fn config(&self) -> &DurableCacheConfig {
        &self.config
    }

    fn name(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, urlencoding::encode(key))
    }

    fn bulk_key(&self, key: &str) -> String {
        format!("{}{}", self.config.bulk_prefix, urlencoding::encode(key))
    }

    fn part_name(name: &str, index: usize) -> String {
        format!("{}_part{}", name, index)
    }

    // =========================================================================
    // Write
    // =========================================================================

    /// Store `data` with the default expiration
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T) {
        self.set_with(key, data, DurableSetOptions::default()).await
    }

    /// Store `data`; failures are logged and otherwise ignored
    pub async fn set_with<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: DurableSetOptions,
    ) {
        if let Err(e) = self.try_set(key, data, options).await {
            warn!(key = %key, error = %e, "Failed to store durable entry");
        }
    }

    async fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        data: &T,
        options: DurableSetOptions,
    ) -> Result<()> {
        let now = self.clock.now_ms();
        let days = options
            .expiration_days
            .unwrap_or(self.config.default_expiration_days);
        let entry = DurableEntry {
            data: serde_json::to_value(data)?,
            timestamp: now,
            expires: now.saturating_add(u64::from(days) * DAY_MS),
            version: self.config.version,
        };
        let serialized = serde_json::to_string(&entry)?;
        let name = self.name(key);

        let chunk_size = self.config.chunk_size_for(&name);

        if options.bulk || chunk_size == 0 || serialized.len() > self.config.large_object_threshold {
            self.remove_small(&name)?;
            self.large.set_item(&self.bulk_key(key), serialized).await?;
            debug!(key = %key, bulk = options.bulk, "Stored durable entry in large store");
            return Ok(());
        }

        // A stale bulk copy would shadow the new value on read
        self.large.remove_item(&self.bulk_key(key)).await?;
        self.remove_small(&name)?;

        let payload = if serialized.len() > self.config.compression_threshold {
            dictionary::compress(&serialized).unwrap_or(serialized)
        } else {
            serialized
        };

        if payload.len() <= self.config.max_item_size.saturating_sub(name.len()) {
            self.small.set(&name, &payload, entry.expires)?;
            debug!(key = %key, size = payload.len(), "Stored durable entry");
            return Ok(());
        }

        let chunks = split_chunks(&payload, chunk_size);
        if let Err(e) = self.write_chunks(&name, &chunks, entry.expires) {
            // Never leave a partial record behind
            self.remove_small(&name)?;
            return Err(e);
        }
        debug!(key = %key, size = payload.len(), chunks = chunks.len(), "Stored chunked durable entry");
        Ok(())
    }

    fn write_chunks(&self, name: &str, chunks: &[&str], expires: u64) -> Result<()> {
        for (index, chunk) in chunks.iter().enumerate() {
            self.small.set(&Self::part_name(name, index), chunk, expires)?;
        }
        let manifest = serde_json::to_string(&ChunkManifest {
            chunks: chunks.len(),
        })?;
        self.small.set(name, &manifest, expires)
    }

    // =========================================================================
    // Read
    // =========================================================================

    /// Read a live value; any failure is a miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = match self.try_get(key).await {
            Ok(entry) => entry?,
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding unreadable durable entry");
                self.remove(key).await;
                return None;
            }
        };

        match serde_json::from_value(entry.data) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding durable entry of unexpected shape");
                self.remove(key).await;
                None
            }
        }
    }

    /// Check if a live value exists
    pub async fn has(&self, key: &str) -> bool {
        self.get::<Value>(key).await.is_some()
    }

    async fn try_get(&self, key: &str) -> Result<Option<DurableEntry>> {
        if let Some(raw) = self.large.get_item(&self.bulk_key(key)).await? {
            let entry: DurableEntry = serde_json::from_str(&raw)?;
            return Ok(self.live(key, entry).await);
        }

        let name = self.name(key);
        let Some(raw) = self.small.get(&name)? else {
            return Ok(None);
        };

        let payload = match serde_json::from_str::<ChunkManifest>(&raw) {
            Ok(manifest) => match self.read_chunks(&name, manifest.chunks)? {
                Some(payload) => payload,
                None => {
                    debug!(key = %key, "Chunk missing, removing remnants");
                    self.remove(key).await;
                    return Ok(None);
                }
            },
            Err(_) => raw,
        };

        let payload = dictionary::decompress(&payload)?;
        let entry: DurableEntry = serde_json::from_str(&payload)?;
        Ok(self.live(key, entry).await)
    }

    fn read_chunks(&self, name: &str, count: usize) -> Result<Option<String>> {
        let mut payload = String::new();
        for index in 0..count {
            match self.small.get(&Self::part_name(name, index))? {
                Some(chunk) => payload.push_str(&chunk),
                None => return Ok(None),
            }
        }
        Ok(Some(payload))
    }

    /// Filter out expired or foreign-version entries, removing them
    async fn live(&self, key: &str, entry: DurableEntry) -> Option<DurableEntry> {
        let now = self.clock.now_ms();
        if now >= entry.expires || entry.version != self.config.version {
            debug!(key = %key, expires = entry.expires, version = entry.version, "Durable entry no longer valid");
            self.remove(key).await;
            return None;
        }
        Some(entry)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove the bulk entry, the direct entry and every chunk of `key`
    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.large.remove_item(&self.bulk_key(key)).await {
            warn!(key = %key, error = %e, "Failed to remove bulk entry");
        }
        if let Err(e) = self.remove_small(&self.name(key)) {
            warn!(key = %key, error = %e, "Failed to remove durable entry");
        }
    }

    /// Delete `name` and its chunks, walking parts until one is missing
    /// (and at least as far as the manifest reaches)
    fn remove_small(&self, name: &str) -> Result<()> {
        let manifest_chunks = self
            .small
            .get(name)?
            .and_then(|raw| serde_json::from_str::<ChunkManifest>(&raw).ok())
            .map(|manifest| manifest.chunks)
            .unwrap_or(0);
        self.small.delete(name)?;

        let mut index = 0;
        while self.small.delete(&Self::part_name(name, index))? || index < manifest_chunks {
            index += 1;
        }
        Ok(())
    }

    /// Remove everything under the cache prefix from both stores.
    ///
    /// Returns the number of items deleted.
    pub async fn clear_all(&self) -> usize {
        let mut removed = 0;

        match self.small.names() {
            Ok(names) => {
                for name in names.iter().filter(|n| n.starts_with(&self.config.prefix)) {
                    match self.small.delete(name) {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => warn!(name = %name, error = %e, "Failed to delete durable item"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list durable items"),
        }

        match self.large.keys().await {
            Ok(keys) => {
                for key in keys.iter().filter(|k| k.starts_with(&self.config.prefix)) {
                    match self.large.remove_item(key).await {
                        Ok(true) => removed += 1,
                        Ok(false) => {}
                        Err(e) => warn!(key = %key, error = %e, "Failed to delete bulk item"),
                    }
                }
            }
            Err(e) => warn!(error = %e, "Failed to list bulk items"),
        }

        debug!(removed, "Cleared durable cache");
        removed
    }

    /// Count entries, chunks and bulk items with their sizes
    pub async fn get_stats(&self) -> DurableStats {
        let mut stats = DurableStats::default();

        for name in self
            .small
            .names()
            .unwrap_or_default()
            .into_iter()
            .filter(|n| n.starts_with(&self.config.prefix))
        {
            let Ok(Some(value)) = self.small.get(&name) else {
                continue;
            };
            if is_part_name(&name) {
                stats.chunks += 1;
            } else {
                stats.entries += 1;
            }
            stats.small_bytes += value.len();
        }

        for key in self
            .large
            .keys()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|k| k.starts_with(&self.config.bulk_prefix))
        {
            if let Ok(Some(value)) = self.large.get_item(&key).await {
                stats.bulk_entries += 1;
                stats.bulk_bytes += value.len();
            }
        }
        stats
    }
}

fn is_part_name(name: &str) -> bool {
    name.rsplit_once("_part")
        .map(|(_, index)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Split on char boundaries into pieces of at most `size` bytes
fn split_chunks(payload: &str, size: usize) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let mut end = size.min(rest.len());
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // `size` is smaller than the next char; take it whole
            end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }
        let (chunk, tail) = rest.split_at(end);
        chunks.push(chunk);
        rest = tail;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        cache: DurableKeyValueCache,
        jar: Arc<CookieJar>,
        large: Arc<MemoryKeyValueStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        fixture_with(DurableCacheConfig::default())
    }

    fn fixture_with(config: DurableCacheConfig) -> Fixture {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let jar = Arc::new(CookieJar::with_limits(
            config.max_item_size,
            store::DEFAULT_MAX_ITEMS,
            clock.clone(),
        ));
        let large = Arc::new(MemoryKeyValueStore::new());
        let cache =
            DurableKeyValueCache::with_clock(config, jar.clone(), large.clone(), clock.clone())
                .unwrap();
        Fixture {
            cache,
            jar,
            large,
            clock,
        }
    }

    fn jar_names(jar: &CookieJar) -> Vec<String> {
        let mut names = jar.names().unwrap();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let f = fixture();
        f.cache.set("theme", &json!({"dark": true})).await;

        assert_eq!(f.cache.get::<Value>("theme").await, Some(json!({"dark": true})));
        assert!(f.cache.has("theme").await);
        assert_eq!(jar_names(&f.jar), vec!["stac_theme".to_string()]);
    }

    #[tokio::test]
    async fn test_expiration() {
        let f = fixture();
        f.cache
            .set_with("now", &"gone", DurableSetOptions::expiring_in(0))
            .await;
        assert_eq!(f.cache.get::<String>("now").await, None);
        assert!(!f.cache.has("now").await);

        f.cache
            .set_with("day", &"here", DurableSetOptions::expiring_in(1))
            .await;
        f.clock.advance_ms(DAY_MS - 1);
        assert_eq!(f.cache.get::<String>("day").await.as_deref(), Some("here"));
        f.clock.advance_ms(1);
        assert_eq!(f.cache.get::<String>("day").await, None);
        assert!(jar_names(&f.jar).is_empty());
    }

    #[tokio::test]
    async fn test_chunk_roundtrip() {
        let f = fixture();
        let config = f.cache.config().clone();
        let value = "x".repeat(config.max_item_size * 3);
        f.cache.set("big", &value).await;

        let manifest: ChunkManifest =
            serde_json::from_str(&f.jar.get("stac_big").unwrap().unwrap()).unwrap();
        let parts: Vec<String> = (0..manifest.chunks)
            .map(|i| f.jar.get(&format!("stac_big_part{}", i)).unwrap().unwrap())
            .collect();
        let total: usize = parts.iter().map(String::len).sum();

        assert_eq!(manifest.chunks, total.div_ceil(config.chunk_size()));
        assert!(parts[..parts.len() - 1].iter().all(|p| p.len() == config.chunk_size()));
        assert_eq!(f.cache.get::<String>("big").await, Some(value));
        assert!(f.large.is_empty());

        let stats = f.cache.get_stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.chunks, manifest.chunks);
    }

    #[tokio::test]
    async fn test_long_key_chunks_fit_ceiling() {
        let f = fixture();
        let key = format!(
            "collections_cache_https://planetarycomputer.microsoft.com/api/stac/v1/search?collections=sentinel-2-l2a&bbox={}&limit=100",
            "-122.51,37.70,-122.35,37.83&datetime=2024-01-01T00:00:00Z/2024-06-30T23:59:59Z&sortby=-properties.datetime"
        );
        assert!(key.len() > 200);
        let value = "v".repeat(9_000);
        f.cache.set(&key, &value).await;

        assert_eq!(f.cache.get::<String>(&key).await, Some(value));
        assert!(f.large.is_empty());

        let names = jar_names(&f.jar);
        assert!(names.len() > 2);
        for name in &names {
            let stored = f.jar.get(name).unwrap().unwrap();
            assert!(name.len() + stored.len() <= f.cache.config().max_item_size);
        }
    }

    #[tokio::test]
    async fn test_oversized_name_routes_to_large_store() {
        let f = fixture();
        let key = "k".repeat(4_100);
        f.cache.set(&key, &json!({"a": 1})).await;

        assert_eq!(f.cache.get::<Value>(&key).await, Some(json!({"a": 1})));
        assert!(f.jar.is_empty());
        assert_eq!(f.large.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_chunk_self_heals() {
        let f = fixture();
        let value = "y".repeat(12_000);
        f.cache.set("big", &value).await;
        assert!(f.jar.delete("stac_big_part1").unwrap());

        assert_eq!(f.cache.get::<String>("big").await, None);
        assert!(!f.cache.has("big").await);
        assert!(jar_names(&f.jar).is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_drops_stale_chunks() {
        let f = fixture();
        f.cache.set("k", &"z".repeat(12_000)).await;
        f.cache.set("k", &"small").await;

        assert_eq!(jar_names(&f.jar), vec!["stac_k".to_string()]);
        assert_eq!(f.cache.get::<String>("k").await.as_deref(), Some("small"));
    }

    #[tokio::test]
    async fn test_bulk_routing() {
        let f = fixture();
        let collections = json!({"collections": [{"id": "landsat-c2-l2"}]});
        f.cache
            .set_with("collections", &collections, DurableSetOptions::bulk())
            .await;

        assert!(f.jar.is_empty());
        assert_eq!(f.large.len(), 1);
        assert_eq!(f.cache.get::<Value>("collections").await, Some(collections));

        // Size-based routing
        let huge = "q".repeat(40_000);
        f.cache.set("huge", &huge).await;
        assert_eq!(f.large.len(), 2);
        assert_eq!(f.cache.get::<String>("huge").await, Some(huge));

        // Rewriting as a small entry removes the bulk copy
        f.cache.set("collections", &json!([])).await;
        assert_eq!(f.large.len(), 1);
        assert_eq!(f.cache.get::<Value>("collections").await, Some(json!([])));

        let stats = f.cache.get_stats().await;
        assert_eq!(stats.bulk_entries, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_dictionary_compression_applied() {
        let f = fixture();
        let links: Vec<_> = (0..20)
            .map(|i| json!({"rel": "item", "href": format!("./items/{}.json", i), "type": "application/geo+json"}))
            .collect();
        let collection = json!({"type": "Collection", "id": "naip", "links": links});
        f.cache.set("naip", &collection).await;

        let stored = f.jar.get("stac_naip").unwrap().unwrap();
        assert!(stored.starts_with(dictionary::MARKER));
        assert_eq!(f.cache.get::<Value>("naip").await, Some(collection));
    }

    #[tokio::test]
    async fn test_corrupt_and_foreign_entries_removed() {
        let f = fixture();
        let expires = f.clock.now_ms() + DAY_MS;

        f.jar.set("stac_garbage", "{not json", expires).unwrap();
        assert_eq!(f.cache.get::<Value>("garbage").await, None);
        assert!(f.jar.get("stac_garbage").unwrap().is_none());

        let old = DurableEntry {
            data: json!(1),
            timestamp: 0,
            expires,
            version: ENTRY_VERSION + 1,
        };
        f.jar
            .set("stac_old", &serde_json::to_string(&old).unwrap(), expires)
            .unwrap();
        assert_eq!(f.cache.get::<Value>("old").await, None);
        assert!(f.jar.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_miss() {
        let f = fixture();
        f.cache.set("n", &42).await;
        assert_eq!(f.cache.get::<String>("n").await, None);
        assert!(!f.cache.has("n").await);
    }

    #[tokio::test]
    async fn test_clear_all_keeps_foreign_names() {
        let f = fixture();
        f.cache.set("a", &1).await;
        f.cache.set("b", &"w".repeat(9_000)).await;
        f.cache.set_with("c", &2, DurableSetOptions::bulk()).await;
        f.jar.set("session", "abc", f.clock.now_ms() + DAY_MS).unwrap();

        assert!(f.cache.clear_all().await >= 4);
        assert_eq!(jar_names(&f.jar), vec!["session".to_string()]);
        assert!(f.large.is_empty());
        assert_eq!(f.cache.get_stats().await, DurableStats::default());
    }

    #[tokio::test]
    async fn test_full_jar_is_silent() {
        let clock = Arc::new(ManualClock::new(0));
        let jar = Arc::new(CookieJar::with_limits(4000, 2, clock.clone()));
        let cache = DurableKeyValueCache::with_clock(
            DurableCacheConfig::default(),
            jar.clone(),
            Arc::new(MemoryKeyValueStore::new()),
            clock,
        )
        .unwrap();

        cache.set("big", &"v".repeat(12_000)).await;
        assert_eq!(cache.get::<String>("big").await, None);
        assert!(jar.is_empty());
    }

    #[test]
    fn test_split_chunks() {
        assert_eq!(split_chunks("abcdefg", 3), vec!["abc", "def", "g"]);
        assert_eq!(split_chunks("aé", 2), vec!["a", "é"]);
        assert!(split_chunks("", 3).is_empty());
        assert!(is_part_name("stac_x_part12"));
        assert!(!is_part_name("stac_x_party"));
    }

    #[test]
    fn test_config_validation() {
        assert!(DurableCacheConfig::from_yaml_str("max_item_size: 100\nchunk_overhead: 100").is_err());
        let config = DurableCacheConfig::from_yaml_str("default_expiration_days: 7").unwrap();
        assert_eq!(config.default_expiration_days, 7);
        assert_eq!(config.chunk_size(), 3800);
        assert_eq!(config.chunk_size_for("stac_theme"), 3800);
        assert_eq!(config.chunk_size_for(&"n".repeat(3_000)), 991);
        assert_eq!(config.chunk_size_for(&"n".repeat(4_000)), 0);
    }
}
