//! Cache Tier Definitions
//!
//! Defines the two storage tiers fronting the network and their budgets.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Default Budgets
// =============================================================================

/// Default memory budget: 50 MB
pub const DEFAULT_MEMORY_BUDGET_BYTES: u64 = 50 * 1024 * 1024;

/// Default disk budget: 200 MB
pub const DEFAULT_DISK_BUDGET_BYTES: u64 = 200 * 1024 * 1024;

/// Default fraction of the disk budget reclaimed per eviction pass
pub const DEFAULT_DISK_RECLAIM_FRACTION: f64 = 0.10;

// =============================================================================
// Cache Tier
// =============================================================================

/// Storage tier consulted before going to the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    /// In-process memory (fastest, smallest)
    #[default]
    Memory,
    /// Persistent store (survives restarts)
    Disk,
}

impl fmt::Display for CacheTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTier::Memory => write!(f, "memory"),
            CacheTier::Disk => write!(f, "disk"),
        }
    }
}

// =============================================================================
// Tier Configuration
// =============================================================================

/// Configuration for a cache tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    /// Whether the tier is used at all
    pub enabled: bool,
    /// Maximum capacity in bytes for this tier
    pub capacity_bytes: u64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self::memory_default()
    }
}

impl TierConfig {
    /// Default config for the memory tier
    pub fn memory_default() -> Self {
        Self {
            enabled: true,
            capacity_bytes: DEFAULT_MEMORY_BUDGET_BYTES,
        }
    }

    /// Default config for the disk tier
    pub fn disk_default() -> Self {
        Self {
            enabled: true,
            capacity_bytes: DEFAULT_DISK_BUDGET_BYTES,
        }
    }

    /// A disabled tier
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacity_bytes: 0,
        }
    }

    /// Check if an object of this size can ever be admitted
    pub fn admits(&self, size_bytes: u64) -> bool {
        self.enabled && size_bytes <= self.capacity_bytes
    }
}
