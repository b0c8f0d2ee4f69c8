//! STAC Cache - Tiered Caching for STAC Catalog Clients
//!
//! Caching layer for clients of SpatioTemporal Asset Catalog APIs:
//! catalog responses, durable user state and presigned-URL tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                               Application                                    │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────┐  ┌─────────────────────┐  ┌─────────────────────┐  │
//! │  │    TieredCache      │  │ DurableKeyValueCache│  │ PresignedTokenCache │  │
//! │  │ memory → disk → net │  │  chunked · bulk     │  │ rate-limited tokens │  │
//! │  └──────────┬──────────┘  └──────────┬──────────┘  └──────────┬──────────┘  │
//! │             │                        │                        │              │
//! ├─────────────┼────────────────────────┼────────────────────────┼─────────────┤
//! │  ┌──────────┴──────────┐  ┌──────────┴──────────┐  ┌──────────┴──────────┐  │
//! │  │ NetworkFetcher      │  │ SmallValueStore     │  │ TokenProvider       │  │
//! │  │ PersistentStore     │  │ LargeValueStore     │  │                     │  │
//! │  └─────────────────────┘  └─────────────────────┘  └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`cache`]: Tiered cache, eviction, compression, prefetching and metrics
//! - [`durable`]: Cookie-style durable key/value cache
//! - [`signing`]: Presigned-URL token cache
//! - [`network`]: Network collaborator and HTTP implementation
//! - [`clock`]: Time source
//! - [`error`]: Error types and handling

pub mod cache;
pub mod clock;
pub mod durable;
pub mod error;
pub mod network;
pub mod signing;

// Re-export commonly used types
pub use cache::{
    CacheEvent, CacheTier, CachedValue, CleanupReport, EvictionPolicy, FileStore, InMemoryStore,
    MetricsSnapshot, PersistentStore, PrefetchSignal, PrefetchStrategy, TieredCache,
    TieredCacheConfig,
};

pub use clock::{Clock, ClockRef, ManualClock, SystemClock};

pub use durable::{
    CookieJar, DurableCacheConfig, DurableKeyValueCache, DurableSetOptions, DurableStats,
    FileKeyValueStore, LargeValueStore, MemoryKeyValueStore, SmallValueStore,
};

pub use error::{Error, ErrorHandling, NetworkError, Result};

pub use network::{FetchResult, HttpFetcher, NetworkFetcher, RequestOptions, ResponseMetadata};

pub use signing::{
    HttpTokenProvider, PresignedTokenCache, SignedToken, TokenCacheConfig, TokenProvider,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
