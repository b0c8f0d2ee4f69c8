//! Tiered Caching System
//!
//! A memory -> disk -> network cache for STAC catalog responses:
//! - **Memory**: bounded in-process tier with LRU/LFU/FIFO eviction
//! - **Disk**: any [`storage::PersistentStore`], budgeted with fractional reclaim
//! - **Network**: the [`crate::network::NetworkFetcher`] collaborator
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             TieredCache                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────────┐  ┌──────────────────────────┐   │
//! │  │    Memory    │  │       Disk       │  │         Network          │   │
//! │  │ (MemoryTier) │  │ (PersistentStore)│  │     (NetworkFetcher)     │   │
//! │  │    50MB      │  │      200MB       │  │  de-duplicated in flight │   │
//! │  └──────────────┘  └──────────────────┘  └──────────────────────────┘   │
//! │         │                  │                       │                     │
//! │         └──────────────────┼───────────────────────┘                     │
//! │                            │                                             │
//! │            ┌───────────────┴──────────────┐                              │
//! │            │  Compression · Prefetcher    │                              │
//! │            │  Cleanup task · Event bus    │                              │
//! │            └──────────────────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use stac_cache::cache::{TieredCache, TieredCacheConfig};
//! use stac_cache::network::{HttpFetcher, RequestOptions};
//! use std::sync::Arc;
//!
//! let cache = TieredCache::new(TieredCacheConfig::default(), Arc::new(HttpFetcher::new()?), None)?;
//! cache.init().await?;
//!
//! let options = RequestOptions::new().with_param("limit", "10");
//! let collections = cache.get("https://earth-search.aws.element84.com/v1/collections", &options).await?;
//!
//! let stats = cache.get_stats();
//! println!("Hit ratio: {:.2}%", stats.hit_ratio() * 100.0);
//! cache.dispose();
//! ```

pub mod compression;
pub mod entry;
pub mod events;
pub mod eviction;
pub mod inflight;
pub mod manager;
pub mod metrics;
pub mod prefetch;
pub mod storage;
pub mod tier;

// Re-export main types
pub use compression::{CompressionAlgorithm, CompressionConfig, CompressionManager, Compressor};
pub use entry::{generate_cache_key, CacheData, CacheEntry, CachedValue, DataType, EntryMetadata};
pub use events::{CacheEvent, EvictionReason};
pub use eviction::{AccessTracker, EvictionPolicy};
pub use inflight::{Flight, InFlight};
pub use manager::{CleanupReport, TieredCache, TieredCacheConfig};
pub use metrics::{render_prometheus, CacheMetrics, MetricsSnapshot};
pub use prefetch::{PrefetchConfig, PrefetchSignal, PrefetchStrategy, Prefetcher};
pub use storage::{FileStore, InMemoryStore, MemoryTier, PersistentStore, SharedPersistentStore};
pub use tier::{CacheTier, TierConfig};
