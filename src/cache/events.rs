//! Cache Events
//!
//! Events emitted by the tiered cache for monitoring and observability.

use crate::cache::tier::CacheTier;
use serde::{Deserialize, Serialize};

/// Events emitted by the cache system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// Entry was stored in a tier
    Stored {
        key: String,
        tier: CacheTier,
        size_bytes: u64,
        compressed: bool,
    },

    /// Cache hit
    Hit { key: String, tier: CacheTier },

    /// Cache miss (not found in any tier)
    Miss { key: String },

    /// Entry was removed from a tier
    Evicted {
        key: String,
        tier: CacheTier,
        reason: EvictionReason,
    },

    /// Disk entry was copied into memory
    Promoted { key: String, size_bytes: u64 },

    /// Tier was skipped because of an error
    TierUnavailable { tier: CacheTier, reason: String },

    /// Entries were cleared (all when `pattern` is `None`)
    Cleared {
        pattern: Option<String>,
        entries_removed: u64,
    },

    /// Prefetch finished
    PrefetchCompleted { url: String, success: bool },

    /// Cleanup pass finished
    CleanupCompleted {
        memory_removed: u64,
        disk_removed: u64,
        tracking_pruned: u64,
    },
}

/// Reason for eviction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionReason {
    /// Capacity limit reached
    Capacity,
    /// Entry expired
    Expired,
    /// Entry corrupted
    Corrupted,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionReason::Capacity => write!(f, "capacity"),
            EvictionReason::Expired => write!(f, "expired"),
            EvictionReason::Corrupted => write!(f, "corrupted"),
        }
    }
}

impl CacheEvent {
    pub fn stored(key: &str, tier: CacheTier, size_bytes: u64, compressed: bool) -> Self {
        CacheEvent::Stored {
            key: key.to_string(),
            tier,
            size_bytes,
            compressed,
        }
    }

    pub fn hit(key: &str, tier: CacheTier) -> Self {
        CacheEvent::Hit {
            key: key.to_string(),
            tier,
        }
    }

    pub fn miss(key: &str) -> Self {
        CacheEvent::Miss {
            key: key.to_string(),
        }
    }

    pub fn evicted(key: &str, tier: CacheTier, reason: EvictionReason) -> Self {
        CacheEvent::Evicted {
            key: key.to_string(),
            tier,
            reason,
        }
    }

    pub fn tier_unavailable(tier: CacheTier, reason: impl Into<String>) -> Self {
        CacheEvent::TierUnavailable {
            tier,
            reason: reason.into(),
        }
    }

    /// Get the key this event refers to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            CacheEvent::Stored { key, .. }
            | CacheEvent::Hit { key, .. }
            | CacheEvent::Miss { key }
            | CacheEvent::Evicted { key, .. }
            | CacheEvent::Promoted { key, .. } => Some(key),
            CacheEvent::PrefetchCompleted { url, .. } => Some(url),
            _ => None,
        }
    }

    /// Get the tier this event refers to, if any
    pub fn tier(&self) -> Option<CacheTier> {
        match self {
            CacheEvent::Stored { tier, .. }
            | CacheEvent::Hit { tier, .. }
            | CacheEvent::Evicted { tier, .. }
            | CacheEvent::TierUnavailable { tier, .. } => Some(*tier),
            CacheEvent::Promoted { .. } => Some(CacheTier::Memory),
            _ => None,
        }
    }

    /// Check if this is an error event
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            CacheEvent::TierUnavailable { .. }
                | CacheEvent::PrefetchCompleted { success: false, .. }
        )
    }
}
