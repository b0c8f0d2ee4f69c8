//! Memory Tier
//!
//! Insertion-ordered in-process entry map with a byte budget. Callers wrap
//! it in a mutex; every method is a short synchronous critical section.

use crate::cache::entry::CacheEntry;
use crate::cache::eviction::{select_victim, AccessTracker, EvictionPolicy};
use indexmap::IndexMap;

/// Result of inserting into the memory tier
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    /// Whether the entry was stored
    pub admitted: bool,
    /// Keys evicted to make room, in eviction order
    pub evicted: Vec<String>,
}

/// In-process memory tier
#[derive(Debug)]
pub struct MemoryTier {
    entries: IndexMap<String, CacheEntry>,
    size_bytes: u64,
    capacity_bytes: u64,
    policy: EvictionPolicy,
    tracker: AccessTracker,
}

impl MemoryTier {
    pub fn new(capacity_bytes: u64, policy: EvictionPolicy) -> Self {
        Self {
            entries: IndexMap::new(),
            size_bytes: 0,
            capacity_bytes,
            policy,
            tracker: AccessTracker::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Record an access for eviction bookkeeping
    pub fn touch(&mut self, key: &str, now_ms: u64) -> bool {
        if self.entries.contains_key(key) {
            self.tracker.record(key, now_ms);
            true
        } else {
            false
        }
    }

    /// Insert or replace an entry, evicting until it fits.
    ///
    /// A replaced entry moves to the back of the insertion order. An entry
    /// larger than the whole budget is not admitted.
    pub fn insert(&mut self, entry: CacheEntry, now_ms: u64) -> InsertOutcome {
        let mut outcome = InsertOutcome::default();
        let new_size = entry.stored_size();

        if let Some(old) = self.entries.shift_remove(&entry.key) {
            self.size_bytes = self.size_bytes.saturating_sub(old.stored_size());
        }

        if new_size > self.capacity_bytes {
            self.tracker.forget(&entry.key);
            return outcome;
        }

        while self.size_bytes + new_size > self.capacity_bytes {
            let victim = match select_victim(self.policy, &self.entries, &self.tracker) {
                Some(victim) => victim.to_string(),
                None => break,
            };
            self.remove(&victim);
            outcome.evicted.push(victim);
        }

        let key = entry.key.clone();
        self.size_bytes += new_size;
        self.entries.insert(key.clone(), entry);
        self.tracker.record(&key, now_ms);
        outcome.admitted = true;
        outcome
    }

    /// Remove an entry and its bookkeeping
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.shift_remove(key);
        if let Some(entry) = &removed {
            self.size_bytes = self.size_bytes.saturating_sub(entry.stored_size());
        }
        self.tracker.forget(key);
        removed
    }

    /// Keys whose entries have expired at `now_ms`
    pub fn expired_keys(&self, now_ms: u64) -> Vec<String> {
        self.entries
            .values()
            .filter(|entry| entry.is_expired(now_ms))
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Drop bookkeeping for keys no longer held; returns the number pruned
    pub fn prune_tracking(&mut self) -> usize {
        let entries = &self.entries;
        self.tracker.retain(|key| entries.contains_key(key))
    }

    /// Remove every key accepted by `matches`; returns the removed keys
    pub fn remove_matching(&mut self, mut matches: impl FnMut(&str) -> bool) -> Vec<String> {
        let keys: Vec<String> = self
            .entries
            .keys()
            .filter(|key| matches(key))
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        keys
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.tracker.clear();
        self.size_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn tracked_keys(&self) -> usize {
        self.tracker.len()
    }

    pub fn access_count(&self, key: &str) -> u64 {
        self.tracker.access_count(key)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::{CacheData, DataType, EntryMetadata};
    use crate::network::ResponseMetadata;
    use bytes::Bytes;
    use proptest::prelude::*;

    fn test_entry(key: &str, size: usize, at: u64) -> CacheEntry {
        let response = ResponseMetadata::ok(key);
        let data = CacheData::uncompressed(Bytes::from(vec![b'x'; size]));
        let metadata = EntryMetadata::new(&response, &data, DataType::Binary, at, 1_000);
        CacheEntry::new(key, data, metadata)
    }

    #[test]
    fn test_basic_operations() {
        let mut tier = MemoryTier::new(1_000, EvictionPolicy::Lru);

        let outcome = tier.insert(test_entry("file1", 11, 0), 0);
        assert!(outcome.admitted);
        assert!(outcome.evicted.is_empty());
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.size_bytes(), 11);

        assert!(tier.contains("file1"));
        assert!(tier.touch("file1", 5));
        assert!(!tier.touch("nonexistent", 5));
        assert_eq!(tier.access_count("file1"), 2);

        let removed = tier.remove("file1").unwrap();
        assert_eq!(removed.key, "file1");
        assert_eq!(tier.size_bytes(), 0);
        assert_eq!(tier.tracked_keys(), 0);
    }

    #[test]
    fn test_update_existing() {
        let mut tier = MemoryTier::new(1_000, EvictionPolicy::Fifo);
        tier.insert(test_entry("file1", 5, 0), 0);
        tier.insert(test_entry("file2", 5, 0), 0);
        tier.insert(test_entry("file1", 21, 1), 1);

        assert_eq!(tier.size_bytes(), 26);
        assert_eq!(tier.len(), 2);

        // Replacement moved file1 behind file2
        let outcome = tier.insert(test_entry("big", 980, 2), 2);
        assert_eq!(outcome.evicted, vec!["file2".to_string(), "file1".to_string()]);
    }

    #[test]
    fn test_oversized_entry_not_admitted() {
        let mut tier = MemoryTier::new(100, EvictionPolicy::Lru);
        tier.insert(test_entry("small", 10, 0), 0);

        let outcome = tier.insert(test_entry("huge", 101, 0), 0);
        assert!(!outcome.admitted);
        assert!(outcome.evicted.is_empty());
        assert!(tier.contains("small"));
        assert!(!tier.contains("huge"));
    }

    #[test]
    fn test_lru_eviction_order() {
        let mut tier = MemoryTier::new(30, EvictionPolicy::Lru);
        tier.insert(test_entry("a", 10, 0), 1);
        tier.insert(test_entry("b", 10, 0), 2);
        tier.insert(test_entry("c", 10, 0), 3);
        tier.touch("a", 4);

        let outcome = tier.insert(test_entry("d", 10, 0), 5);
        assert_eq!(outcome.evicted, vec!["b".to_string()]);
        assert!(tier.contains("a"));
        assert!(tier.contains("c"));
        assert!(tier.contains("d"));
    }

    #[test]
    fn test_expired_keys_and_pruning() {
        let mut tier = MemoryTier::new(1_000, EvictionPolicy::Lru);
        tier.insert(test_entry("old", 10, 0), 0);
        tier.insert(test_entry("new", 10, 5_000), 5_000);

        assert_eq!(tier.expired_keys(5_500), vec!["old".to_string()]);
        assert_eq!(tier.prune_tracking(), 0);
    }

    #[test]
    fn test_remove_matching() {
        let mut tier = MemoryTier::new(1_000, EvictionPolicy::Lru);
        tier.insert(test_entry("https://a/items/1", 10, 0), 0);
        tier.insert(test_entry("https://a/items/2", 10, 0), 0);
        tier.insert(test_entry("https://a/collections", 10, 0), 0);

        let removed = tier.remove_matching(|key| key.contains("/items/"));
        assert_eq!(removed.len(), 2);
        assert_eq!(tier.len(), 1);
        assert_eq!(tier.size_bytes(), 10);

        tier.clear();
        assert!(tier.is_empty());
        assert_eq!(tier.size_bytes(), 0);
    }

    proptest! {
        #[test]
        fn prop_budget_never_exceeded(
            sizes in proptest::collection::vec(0usize..400, 1..60),
            capacity in 1u64..1_000,
        ) {
            let mut tier = MemoryTier::new(capacity, EvictionPolicy::Lru);
            for (i, size) in sizes.iter().enumerate() {
                let outcome = tier.insert(test_entry(&format!("k{}", i % 20), *size, 0), i as u64);
                prop_assert!(tier.size_bytes() <= capacity);
                prop_assert_eq!(outcome.admitted, *size as u64 <= capacity);
            }
        }
    }
}
