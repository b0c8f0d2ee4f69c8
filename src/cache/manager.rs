//! Tiered Cache Manager
//!
//! Coordinates the memory tier, the persistent disk tier and the network:
//! lookups go memory -> disk -> network, misses are de-duplicated per key,
//! stores apply compression and eviction, and background tasks handle
//! periodic cleanup and prefetching.

use crate::cache::compression::{CompressionConfig, CompressionManager};
use crate::cache::entry::{generate_cache_key, CacheEntry, CachedValue, EntryMetadata};
use crate::cache::events::{CacheEvent, EvictionReason};
use crate::cache::eviction::{plan_disk_reclaim, EvictionPolicy};
use crate::cache::inflight::{Flight, InFlight};
use crate::cache::metrics::{CacheMetrics, MetricsSnapshot};
use crate::cache::prefetch::{EnqueueOutcome, PrefetchConfig, PrefetchQueueEntry, PrefetchSignal, Prefetcher};
use crate::cache::storage::{DiskRecord, IndexOrder, MemoryTier, SharedPersistentStore};
use crate::cache::tier::{CacheTier, TierConfig, DEFAULT_DISK_RECLAIM_FRACTION};
use crate::clock::{system_clock, ClockRef};
use crate::error::{Error, NetworkError, Result};
use crate::network::{FetchResult, RequestOptions, SharedFetcher};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the tiered cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TieredCacheConfig {
    /// Memory tier configuration
    pub memory: TierConfig,
    /// Disk tier configuration
    pub disk: TierConfig,
    /// Fraction of the disk budget reclaimed when a write overflows it
    pub disk_reclaim_fraction: f64,
    /// Default entry lifetime (milliseconds)
    pub max_age_ms: u64,
    /// Period of the background cleanup task (milliseconds)
    pub cleanup_interval_ms: u64,
    pub compression: CompressionConfig,
    pub eviction_policy: EvictionPolicy,
    pub prefetch: PrefetchConfig,
    /// Namespace the persistent store is opened with
    pub namespace: String,
    /// Network timeout applied when a request sets none (milliseconds)
    pub fetch_timeout_ms: u64,
    /// Event channel capacity
    pub event_channel_capacity: usize,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            memory: TierConfig::memory_default(),
            disk: TierConfig::disk_default(),
            disk_reclaim_fraction: DEFAULT_DISK_RECLAIM_FRACTION,
            max_age_ms: 30 * 60 * 1000,        // 30 minutes
            cleanup_interval_ms: 5 * 60 * 1000, // 5 minutes
            compression: CompressionConfig::default(),
            eviction_policy: EvictionPolicy::Lru,
            prefetch: PrefetchConfig::default(),
            namespace: "stac-cache".to_string(),
            fetch_timeout_ms: 30_000,
            event_channel_capacity: 1024,
        }
    }
}

impl TieredCacheConfig {
    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML configuration file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject values the cache cannot operate with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.disk_reclaim_fraction) {
            return Err(Error::Configuration(format!(
                "disk_reclaim_fraction must be within [0, 1], got {}",
                self.disk_reclaim_fraction
            )));
        }
        if !(self.compression.max_ratio > 0.0 && self.compression.max_ratio <= 1.0) {
            return Err(Error::Configuration(format!(
                "compression.max_ratio must be within (0, 1], got {}",
                self.compression.max_ratio
            )));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(Error::Configuration("cleanup_interval_ms must be positive".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Configuration("event_channel_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Entries removed by one cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub memory_removed: u64,
    pub disk_removed: u64,
    pub tracking_pruned: u64,
}

// =============================================================================
// Tiered Cache
// =============================================================================

/// Memory -> disk -> network cache
pub struct TieredCache {
    config: TieredCacheConfig,
    memory: Mutex<MemoryTier>,
    store: Option<SharedPersistentStore>,
    disk_active: AtomicBool,
    fetcher: SharedFetcher,
    compression: CompressionManager,
    prefetcher: Prefetcher,
    inflight: InFlight<FetchResult, NetworkError>,
    metrics: CacheMetrics,
    clock: ClockRef,
    event_tx: broadcast::Sender<CacheEvent>,
    initialized: AtomicBool,
    shutdown: CancellationToken,
}

impl TieredCache {
    /// Create a cache using the system clock
    pub fn new(
        config: TieredCacheConfig,
        fetcher: SharedFetcher,
        store: Option<SharedPersistentStore>,
    ) -> Result<Arc<Self>> {
        Self::with_clock(config, fetcher, store, system_clock())
    }

    /// Create a cache reading time from `clock`
    pub fn with_clock(
        config: TieredCacheConfig,
        fetcher: SharedFetcher,
        store: Option<SharedPersistentStore>,
        clock: ClockRef,
    ) -> Result<Arc<Self>> {
        config.validate()?;

        let memory = MemoryTier::new(config.memory.capacity_bytes, config.eviction_policy);
        let compression = CompressionManager::with_config(config.compression.clone());
        let prefetcher = Prefetcher::with_config(config.prefetch.clone());
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        Ok(Arc::new(Self {
            memory: Mutex::new(memory),
            store,
            disk_active: AtomicBool::new(false),
            fetcher,
            compression,
            prefetcher,
            inflight: InFlight::new(),
            metrics: CacheMetrics::new(),
            clock,
            event_tx,
            initialized: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            config,
        }))
    }

    /// Deterministic cache key for a URL and its parameters
    pub fn generate_cache_key(url: &str, params: &[(String, String)]) -> String {
        generate_cache_key(url, params)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the persistent store and start the cleanup task.
    ///
    /// A store that fails to open disables the disk tier; the cache keeps
    /// working from memory and network. Calling `init` again is a no-op.
    pub async fn init(self: &Arc<Self>) -> Result<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(store) = self.store.as_ref().filter(|_| self.config.disk.enabled) {
            match store.open(&self.config.namespace).await {
                Ok(()) => {
                    self.disk_active.store(true, Ordering::SeqCst);
                    info!(store = store.name(), namespace = %self.config.namespace, "Disk tier opened");
                }
                Err(e) => {
                    warn!(store = store.name(), error = %e, "Disk tier unavailable, continuing without it");
                    self.emit(CacheEvent::tier_unavailable(CacheTier::Disk, e.to_string()));
                }
            }
        }

        self.spawn_cleanup_task();
        info!(
            memory_bytes = self.config.memory.capacity_bytes,
            disk = self.disk_active(),
            policy = %self.config.eviction_policy,
            "Tiered cache initialized"
        );
        Ok(())
    }

    /// Stop the cleanup task and every pending prefetch
    pub fn dispose(&self) {
        self.shutdown.cancel();
        self.prefetcher.clear();
        info!("Tiered cache disposed");
    }

    fn spawn_cleanup_task(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let token = self.shutdown.child_token();
        let period = Duration::from_millis(self.config.cleanup_interval_ms);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = weak.upgrade() else { break };
                        cache.cleanup().await;
                    }
                }
            }
            debug!("Cleanup task stopped");
        });
    }

    /// Subscribe to cache events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: CacheEvent) {
        let _ = self.event_tx.send(event);
    }

    fn disk(&self) -> Option<&SharedPersistentStore> {
        self.store
            .as_ref()
            .filter(|_| self.disk_active.load(Ordering::SeqCst))
    }

    /// Check if the disk tier is in use
    pub fn disk_active(&self) -> bool {
        self.disk().is_some()
    }

    pub fn config(&self) -> &TieredCacheConfig {
        &self.config
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Get the value for `url`, from cache when possible.
    ///
    /// Network failures propagate; storage failures only skip their tier.
    pub async fn get(self: &Arc<Self>, url: &str, options: &RequestOptions) -> Result<CachedValue> {
        let started = Instant::now();
        let key = generate_cache_key(url, &options.params);
        self.metrics.record_request();

        let result = self.lookup(&key, url, options).await;

        if !options.prefetch {
            self.metrics.record_response_time(started.elapsed());
        }
        result
    }

    async fn lookup(self: &Arc<Self>, key: &str, url: &str, options: &RequestOptions) -> Result<CachedValue> {
        if self.config.memory.enabled && !options.skip_memory {
            if let Some(value) = self.memory_lookup(key) {
                self.metrics.record_hit();
                self.emit(CacheEvent::hit(key, CacheTier::Memory));
                debug!(key = %key, "Memory hit");
                return Ok(value);
            }
        }

        if !options.skip_disk {
            if let Some(value) = self.disk_lookup(key, options).await {
                self.metrics.record_hit();
                self.emit(CacheEvent::hit(key, CacheTier::Disk));
                debug!(key = %key, "Disk hit");
                return Ok(value);
            }
        }

        self.metrics.record_miss();
        self.emit(CacheEvent::miss(key));
        debug!(key = %key, "Cache miss");

        let fetched = self.fetch_deduplicated(key, url, options).await?;
        Ok(fetched.data)
    }

    fn memory_lookup(&self, key: &str) -> Option<CachedValue> {
        let now = self.clock.now_ms();
        let entry = {
            let mut memory = self.memory.lock();
            match memory.get(key) {
                None => return None,
                Some(entry) if entry.is_expired(now) => {
                    memory.remove(key);
                    drop(memory);
                    self.emit(CacheEvent::evicted(key, CacheTier::Memory, EvictionReason::Expired));
                    return None;
                }
                Some(entry) => {
                    let entry = entry.clone();
                    memory.touch(key, now);
                    entry
                }
            }
        };

        match self.decode(&entry) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Dropping unreadable memory entry");
                self.memory.lock().remove(key);
                self.emit(CacheEvent::evicted(key, CacheTier::Memory, EvictionReason::Corrupted));
                None
            }
        }
    }

    async fn disk_lookup(&self, key: &str, options: &RequestOptions) -> Option<CachedValue> {
        let store = self.disk()?;
        let now = self.clock.now_ms();

        let record = match store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                if e.is_corruption() {
                    self.discard_disk_entry(store, key, &e).await;
                } else {
                    self.disk_error("read", key, &e);
                }
                return None;
            }
        };

        if now >= record.metadata.expires {
            return None;
        }

        let entry = record.into_entry();
        let value = match self.decode(&entry) {
            Ok(value) => value,
            Err(e) => {
                self.discard_disk_entry(store, key, &e).await;
                return None;
            }
        };

        if self.config.memory.enabled && !options.skip_memory {
            let size_bytes = entry.stored_size();
            if self.store_in_memory(entry, now) {
                self.emit(CacheEvent::Promoted {
                    key: key.to_string(),
                    size_bytes,
                });
            }
        }
        if let Err(e) = store.touch(key, now).await {
            self.disk_error("touch", key, &e);
        }

        Some(value)
    }

    async fn fetch_deduplicated(
        self: &Arc<Self>,
        key: &str,
        url: &str,
        options: &RequestOptions,
    ) -> Result<FetchResult> {
        let fetcher = Arc::clone(&self.fetcher);
        let weak = Arc::downgrade(self);
        let key_owned = key.to_string();
        let url_owned = url.to_string();
        let store_options = options.clone();
        let mut fetch_options = options.clone();
        if fetch_options.timeout.is_none() {
            fetch_options.timeout = Some(Duration::from_millis(self.config.fetch_timeout_ms));
        }

        // Stored before the key leaves the in-flight map
        let flight = self.inflight.join_or_start(key, move || async move {
            let result = fetcher.fetch(&url_owned, &fetch_options).await;
            if let (Ok(fetched), Some(cache)) = (&result, weak.upgrade()) {
                if let Err(e) = cache.set(&key_owned, fetched.clone(), &store_options).await {
                    warn!(key = %key_owned, error = %e, "Failed to cache fetched value");
                }
            }
            result
        });

        match flight {
            Flight::Owner(shared) => {
                self.metrics.record_network_fetch();
                shared.await.map_err(Error::from)
            }
            Flight::Joined(shared) => {
                self.metrics.record_deduplicated();
                debug!(key = %key, "Joined in-flight request");
                shared.await.map_err(Error::from)
            }
        }
    }

    fn decode(&self, entry: &CacheEntry) -> Result<CachedValue> {
        let bytes = self.compression.decode(&entry.data)?;
        CachedValue::from_bytes(entry.metadata.data_type, bytes)
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Store a fetched value under `key` in every enabled, not-skipped tier
    pub async fn set(&self, key: &str, result: FetchResult, options: &RequestOptions) -> Result<()> {
        let now = self.clock.now_ms();
        let max_age_ms = options
            .max_age
            .map(|age| age.as_millis() as u64)
            .unwrap_or(self.config.max_age_ms);

        let original = result.data.to_bytes()?;
        let encoded = self.compression.encode(original);
        if encoded.skipped {
            self.metrics.record_compression_skip();
        }

        let metadata = EntryMetadata::new(
            &result.metadata,
            &encoded.data,
            result.data.data_type(),
            now,
            max_age_ms,
        );
        let entry = CacheEntry::new(key, encoded.data, metadata);

        debug!(
            key = %key,
            size = entry.metadata.size,
            original_size = entry.metadata.original_size,
            compressed = entry.metadata.compressed,
            "Storing cache entry"
        );

        if !options.skip_disk {
            if let Some(store) = self.disk() {
                if let Err(e) = self.store_on_disk(store, &entry).await {
                    self.disk_error("write", key, &e);
                }
            }
        }

        if self.config.memory.enabled && !options.skip_memory {
            self.store_in_memory(entry, now);
        }
        Ok(())
    }

    /// Insert into memory, evicting as needed; returns whether it was admitted
    fn store_in_memory(&self, entry: CacheEntry, now_ms: u64) -> bool {
        let key = entry.key.clone();
        let size_bytes = entry.stored_size();
        let compressed = entry.data.compressed;

        let outcome = self.memory.lock().insert(entry, now_ms);

        if !outcome.evicted.is_empty() {
            self.metrics.record_evictions(outcome.evicted.len() as u64);
            for victim in &outcome.evicted {
                debug!(key = %victim, policy = %self.config.eviction_policy, "Evicted from memory");
                self.emit(CacheEvent::evicted(victim, CacheTier::Memory, EvictionReason::Capacity));
            }
        }
        if outcome.admitted {
            self.emit(CacheEvent::stored(&key, CacheTier::Memory, size_bytes, compressed));
        } else {
            debug!(key = %key, size = size_bytes, "Entry exceeds memory budget, not admitted");
        }
        outcome.admitted
    }

    async fn store_on_disk(&self, store: &SharedPersistentStore, entry: &CacheEntry) -> Result<()> {
        let size = entry.stored_size();
        let budget = self.config.disk.capacity_bytes;
        if !self.config.disk.admits(size) {
            debug!(key = %entry.key, size, "Entry exceeds disk budget, not stored");
            return Ok(());
        }

        let current = store.size_bytes().await?;
        if current + size > budget {
            let index = store.scan_index(IndexOrder::LastAccessed).await?;
            let plan = plan_disk_reclaim(
                &index,
                current,
                size,
                budget,
                self.config.disk_reclaim_fraction,
            );
            for victim in plan {
                store.delete(&victim).await?;
                self.emit(CacheEvent::evicted(&victim, CacheTier::Disk, EvictionReason::Capacity));
            }
        }

        store.put(DiskRecord::from(entry)).await?;
        self.emit(CacheEvent::stored(
            &entry.key,
            CacheTier::Disk,
            size,
            entry.data.compressed,
        ));
        Ok(())
    }

    fn disk_error(&self, operation: &str, key: &str, error: &Error) {
        self.metrics.record_disk_error();
        warn!(operation, key = %key, error = %error, "Disk tier error, skipping tier");
        self.emit(CacheEvent::tier_unavailable(CacheTier::Disk, error.to_string()));
    }

    async fn discard_disk_entry(&self, store: &SharedPersistentStore, key: &str, error: &Error) {
        warn!(key = %key, error = %error, "Deleting corrupt disk entry");
        self.metrics.record_disk_error();
        if let Err(e) = store.delete(key).await {
            self.disk_error("delete", key, &e);
        }
        self.emit(CacheEvent::evicted(key, CacheTier::Disk, EvictionReason::Corrupted));
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Clear both tiers, or only keys matching a glob `pattern`.
    ///
    /// Returns the number of entries removed across tiers.
    pub async fn clear(&self, pattern: Option<&str>) -> Result<u64> {
        let removed = match pattern {
            None => {
                let memory_removed = {
                    let mut memory = self.memory.lock();
                    let count = memory.len() as u64;
                    memory.clear();
                    count
                };
                let mut disk_removed = 0;
                if let Some(store) = self.disk() {
                    let cleared = match store.scan_index(IndexOrder::Timestamp).await {
                        Ok(index) => store.clear().await.map(|_| index.len() as u64),
                        Err(e) => Err(e),
                    };
                    match cleared {
                        Ok(count) => disk_removed = count,
                        Err(e) => self.disk_error("clear", "*", &e),
                    }
                }
                memory_removed + disk_removed
            }
            Some(pattern) => {
                let glob = glob::Pattern::new(pattern).map_err(|e| {
                    Error::Configuration(format!("invalid pattern {:?}: {}", pattern, e))
                })?;
                let memory_removed = self.memory.lock().remove_matching(|key| glob.matches(key)).len() as u64;
                let mut disk_removed = 0;
                if let Some(store) = self.disk() {
                    match store.scan_index(IndexOrder::Timestamp).await {
                        Ok(index) => {
                            for record in index.iter().filter(|r| glob.matches(&r.key)) {
                                match store.delete(&record.key).await {
                                    Ok(true) => disk_removed += 1,
                                    Ok(false) => {}
                                    Err(e) => self.disk_error("delete", &record.key, &e),
                                }
                            }
                        }
                        Err(e) => self.disk_error("scan", pattern, &e),
                    }
                }
                memory_removed + disk_removed
            }
        };

        info!(pattern = ?pattern, removed, "Cleared cache entries");
        self.emit(CacheEvent::Cleared {
            pattern: pattern.map(str::to_string),
            entries_removed: removed,
        });
        Ok(removed)
    }

    /// Get current statistics
    pub fn get_stats(&self) -> MetricsSnapshot {
        let (bytes, entries) = {
            let memory = self.memory.lock();
            (memory.size_bytes(), memory.len() as u64)
        };
        self.metrics.snapshot(bytes, entries)
    }

    /// Check whether the disk tier is reachable; memory-only caches are always healthy
    pub async fn health_check(&self) -> bool {
        let Some(store) = self.disk() else {
            return self.store.is_none() || !self.config.disk.enabled;
        };
        match store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(error = %e, "Disk tier health check failed");
                false
            }
        }
    }

    /// Check if `key` is currently held in memory
    pub fn in_memory(&self, key: &str) -> bool {
        self.memory.lock().contains(key)
    }

    /// Remove expired entries from both tiers and prune stale bookkeeping
    pub async fn cleanup(&self) -> CleanupReport {
        let now = self.clock.now_ms();
        let mut report = CleanupReport::default();

        let expired = {
            let mut memory = self.memory.lock();
            let expired = memory.expired_keys(now);
            for key in &expired {
                memory.remove(key);
            }
            report.tracking_pruned = memory.prune_tracking() as u64;
            expired
        };
        report.memory_removed = expired.len() as u64;
        for key in &expired {
            self.emit(CacheEvent::evicted(key, CacheTier::Memory, EvictionReason::Expired));
        }

        if let Some(store) = self.disk() {
            let cutoff = now.saturating_sub(self.config.max_age_ms);
            match store.scan_index(IndexOrder::Timestamp).await {
                Ok(index) => {
                    for record in index.iter().take_while(|r| r.timestamp < cutoff) {
                        match store.delete(&record.key).await {
                            Ok(true) => {
                                report.disk_removed += 1;
                                self.emit(CacheEvent::evicted(
                                    &record.key,
                                    CacheTier::Disk,
                                    EvictionReason::Expired,
                                ));
                            }
                            Ok(false) => {}
                            Err(e) => self.disk_error("cleanup", &record.key, &e),
                        }
                    }
                }
                Err(e) => self.disk_error("cleanup", "*", &e),
            }
        }

        debug!(
            memory_removed = report.memory_removed,
            disk_removed = report.disk_removed,
            tracking_pruned = report.tracking_pruned,
            "Cleanup pass finished"
        );
        self.emit(CacheEvent::CleanupCompleted {
            memory_removed: report.memory_removed,
            disk_removed: report.disk_removed,
            tracking_pruned: report.tracking_pruned,
        });
        report
    }

    // =========================================================================
    // Prefetching
    // =========================================================================

    /// Feed a navigation signal to the prefetcher; returns whether a prefetch was scheduled
    pub fn observe(self: &Arc<Self>, signal: PrefetchSignal) -> bool {
        match self.prefetcher.decide(&signal, self.clock.now_ms()) {
            Some(entry) => self.schedule_prefetch(entry),
            None => false,
        }
    }

    /// Prefetch `urls` regardless of strategy (unless prefetching is off).
    ///
    /// Returns the number of URLs scheduled.
    pub fn prefetch<I, S>(self: &Arc<Self>, urls: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let now = self.clock.now_ms();
        urls.into_iter()
            .filter_map(|url| self.prefetcher.explicit(url.as_ref(), now))
            .map(|entry| self.schedule_prefetch(entry))
            .filter(|scheduled| *scheduled)
            .count()
    }

    /// Number of prefetches waiting or running
    pub fn pending_prefetches(&self) -> usize {
        self.prefetcher.queue_size()
    }

    fn schedule_prefetch(self: &Arc<Self>, entry: PrefetchQueueEntry) -> bool {
        let url = entry.url.clone();
        let delay = entry.scheduled_delay;
        match self.prefetcher.enqueue(entry) {
            EnqueueOutcome::Accepted => {}
            outcome => {
                debug!(url = %url, ?outcome, "Prefetch not scheduled");
                return false;
            }
        }

        let weak = Arc::downgrade(self);
        let token = self.shutdown.child_token();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(cache) = weak.upgrade() else { return };
            tokio::select! {
                _ = token.cancelled() => {}
                _ = cache.run_prefetch(&url) => {}
            }
        });
        true
    }

    async fn run_prefetch(self: &Arc<Self>, url: &str) {
        self.metrics.record_prefetch_request();
        let options = RequestOptions::new().for_prefetch();

        let success = match self.get(url, &options).await {
            Ok(_) => true,
            Err(e) => {
                self.metrics.record_prefetch_failure();
                debug!(url = %url, error = %e, "Prefetch failed");
                false
            }
        };

        self.prefetcher.complete(url, success);
        self.emit(CacheEvent::PrefetchCompleted {
            url: url.to_string(),
            success,
        });
    }
}

impl Drop for TieredCache {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
