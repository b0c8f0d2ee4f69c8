//! Eviction Policies
//!
//! Victim selection for the memory tier and reclaim planning for the disk
//! tier. Access bookkeeping (last-accessed timestamp and access count per
//! key) is kept separately from the entries so that it can survive
//! replacement of an entry and be pruned independently.

use crate::cache::entry::CacheEntry;
use crate::cache::storage::DiskIndexRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Eviction Policy
// =============================================================================

/// Policy for selecting the memory-tier victim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Least Recently Used - evict the entry with the oldest access
    #[default]
    Lru,
    /// Least Frequently Used - evict the entry with the lowest access count
    Lfu,
    /// First In First Out - evict the earliest inserted entry
    Fifo,
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionPolicy::Lru => write!(f, "lru"),
            EvictionPolicy::Lfu => write!(f, "lfu"),
            EvictionPolicy::Fifo => write!(f, "fifo"),
        }
    }
}

// =============================================================================
// Access Tracker
// =============================================================================

/// Per-key access bookkeeping
#[derive(Debug, Default)]
pub struct AccessTracker {
    last_accessed: HashMap<String, u64>,
    access_count: HashMap<String, u64>,
}

impl AccessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an access (or a store) of `key` at `now_ms`
    pub fn record(&mut self, key: &str, now_ms: u64) {
        self.last_accessed.insert(key.to_string(), now_ms);
        *self.access_count.entry(key.to_string()).or_insert(0) += 1;
    }

    pub fn last_accessed(&self, key: &str) -> Option<u64> {
        self.last_accessed.get(key).copied()
    }

    pub fn access_count(&self, key: &str) -> u64 {
        self.access_count.get(key).copied().unwrap_or(0)
    }

    /// Drop all bookkeeping for `key`
    pub fn forget(&mut self, key: &str) {
        self.last_accessed.remove(key);
        self.access_count.remove(key);
    }

    /// Keep bookkeeping only for keys accepted by `keep`; returns the number pruned
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.last_accessed.len();
        self.last_accessed.retain(|k, _| keep(k));
        let last_accessed = &self.last_accessed;
        self.access_count.retain(|k, _| last_accessed.contains_key(k));
        before - self.last_accessed.len()
    }

    pub fn len(&self) -> usize {
        self.last_accessed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accessed.is_empty()
    }

    pub fn clear(&mut self) {
        self.last_accessed.clear();
        self.access_count.clear();
    }
}

// =============================================================================
// Victim Selection
// =============================================================================

/// Pick the entry to evict next under `policy`.
///
/// `entries` must be in insertion order. Ties are broken by insertion order
/// (the earliest inserted candidate wins).
pub fn select_victim<'a>(
    policy: EvictionPolicy,
    entries: &'a IndexMap<String, CacheEntry>,
    tracker: &AccessTracker,
) -> Option<&'a str> {
    let victim = match policy {
        EvictionPolicy::Lru => entries.iter().min_by_key(|(key, entry)| {
            tracker
                .last_accessed(key)
                .unwrap_or(entry.metadata.timestamp)
        }),
        EvictionPolicy::Lfu => entries
            .iter()
            .min_by_key(|(key, _)| tracker.access_count(key)),
        EvictionPolicy::Fifo => entries.first(),
    };
    victim.map(|(key, _)| key.as_str())
}

// =============================================================================
// Disk Reclaim
// =============================================================================

/// Plan which disk entries to delete so that a write of `incoming` bytes fits.
///
/// Returns an empty plan when the write already fits. Otherwise deletes in
/// ascending last-accessed order until at least
/// `max(reclaim_fraction * budget, overflow)` bytes are freed, or the index
/// is exhausted.
pub fn plan_disk_reclaim(
    index: &[DiskIndexRecord],
    current_bytes: u64,
    incoming_bytes: u64,
    budget_bytes: u64,
    reclaim_fraction: f64,
) -> Vec<String> {
    let projected = current_bytes.saturating_add(incoming_bytes);
    if projected <= budget_bytes {
        return Vec::new();
    }

    let overflow = projected - budget_bytes;
    let fraction = (budget_bytes as f64 * reclaim_fraction.clamp(0.0, 1.0)) as u64;
    let target = overflow.max(fraction);

    let mut ordered: Vec<&DiskIndexRecord> = index.iter().collect();
    ordered.sort_by_key(|record| record.last_accessed);

    let mut freed = 0u64;
    let mut plan = Vec::new();
    for record in ordered {
        if freed >= target {
            break;
        }
        freed += record.size;
        plan.push(record.key.clone());
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{CacheData, DataType, EntryMetadata};
    use crate::network::ResponseMetadata;
    use bytes::Bytes;

    fn entry(key: &str, at: u64) -> CacheEntry {
        let response = ResponseMetadata::ok(key);
        let data = CacheData::uncompressed(Bytes::from_static(b"0123456789"));
        let metadata = EntryMetadata::new(&response, &data, DataType::Text, at, 60_000);
        CacheEntry::new(key, data, metadata)
    }

    /// A, B, C inserted at t=1,2,3 then A accessed at t=4
    fn populated() -> (IndexMap<String, CacheEntry>, AccessTracker) {
        let mut entries = IndexMap::new();
        let mut tracker = AccessTracker::new();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            let at = i as u64 + 1;
            entries.insert(key.to_string(), entry(key, at));
            tracker.record(key, at);
        }
        tracker.record("a", 4);
        (entries, tracker)
    }

    #[test]
    fn test_lru_victim() {
        let (entries, tracker) = populated();
        assert_eq!(select_victim(EvictionPolicy::Lru, &entries, &tracker), Some("b"));
    }

    #[test]
    fn test_lfu_victim_ties_by_insertion() {
        let (entries, tracker) = populated();
        assert_eq!(tracker.access_count("a"), 2);
        assert_eq!(select_victim(EvictionPolicy::Lfu, &entries, &tracker), Some("b"));
    }

    #[test]
    fn test_fifo_victim() {
        let (entries, tracker) = populated();
        assert_eq!(select_victim(EvictionPolicy::Fifo, &entries, &tracker), Some("a"));
    }

    #[test]
    fn test_empty_has_no_victim() {
        let entries = IndexMap::new();
        let tracker = AccessTracker::new();
        assert_eq!(select_victim(EvictionPolicy::Lru, &entries, &tracker), None);
    }

    #[test]
    fn test_tracker_retain() {
        let (_, mut tracker) = populated();
        let pruned = tracker.retain(|k| k != "b");
        assert_eq!(pruned, 1);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.access_count("b"), 0);
        assert_eq!(tracker.last_accessed("b"), None);
    }

    fn index(records: &[(&str, u64, u64)]) -> Vec<DiskIndexRecord> {
        records
            .iter()
            .map(|(key, last_accessed, size)| DiskIndexRecord {
                key: key.to_string(),
                timestamp: 0,
                last_accessed: *last_accessed,
                access_count: 1,
                size: *size,
            })
            .collect()
    }

    #[test]
    fn test_disk_reclaim_fits() {
        let index = index(&[("a", 1, 400)]);
        assert!(plan_disk_reclaim(&index, 400, 100, 1000, 0.1).is_empty());
    }

    #[test]
    fn test_disk_reclaim_fraction() {
        // Overflow of 50 bytes, but 10% of the budget (100 bytes) is reclaimed
        let index = index(&[("new", 9, 60), ("old", 1, 60), ("mid", 5, 60)]);
        let plan = plan_disk_reclaim(&index, 990, 60, 1000, 0.1);
        assert_eq!(plan, vec!["old".to_string(), "mid".to_string()]);
    }

    #[test]
    fn test_disk_reclaim_overflow() {
        // Overflow exceeds the fraction
        let index = index(&[("a", 1, 300), ("b", 2, 300), ("c", 3, 300)]);
        let plan = plan_disk_reclaim(&index, 900, 500, 1000, 0.1);
        assert_eq!(plan, vec!["a".to_string(), "b".to_string()]);
    }
}
