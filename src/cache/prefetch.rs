//! Prefetch Scheduling
//!
//! Turns navigation signals (link hover, scroll position) into prefetch
//! entries according to the configured strategy. The queue de-duplicates by
//! URL and rejects new entries when full; execution is done by the cache.

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

// =============================================================================
// Prefetch Configuration
// =============================================================================

/// When to prefetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchStrategy {
    /// Hover and scroll past the threshold, low priority, after a delay
    #[default]
    Predictive,
    /// Hover and any scroll with a next page, normal priority, immediately
    Aggressive,
    /// Only scroll past the threshold
    Conservative,
    /// Never
    Off,
}

/// Configuration for the prefetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    pub strategy: PrefetchStrategy,
    /// Delay before a signalled prefetch runs (milliseconds)
    pub delay_ms: u64,
    /// Fraction of the document height that must be scrolled past
    pub scroll_threshold: f64,
    /// Maximum prefetch queue size
    pub max_queue_size: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            strategy: PrefetchStrategy::Predictive,
            delay_ms: 100,
            scroll_threshold: 0.8,
            max_queue_size: 50,
        }
    }
}

// =============================================================================
// Signals and Queue Entries
// =============================================================================

/// Navigation signal observed by the cache
#[derive(Debug, Clone, PartialEq)]
pub enum PrefetchSignal {
    /// Pointer is hovering a link
    Hover { url: String },
    /// Scroll position changed
    Scroll {
        position: f64,
        viewport_height: f64,
        document_height: f64,
        /// URL of the next page, when there is one
        next_url: Option<String>,
    },
}

impl PrefetchSignal {
    /// Check if a scroll signal has crossed `threshold` of the document
    fn past_threshold(&self, threshold: f64) -> bool {
        match self {
            PrefetchSignal::Scroll {
                position,
                viewport_height,
                document_height,
                ..
            } => *document_height > 0.0 && position + viewport_height >= document_height * threshold,
            PrefetchSignal::Hover { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchPriority {
    Low,
    Normal,
    High,
}

/// A scheduled prefetch
#[derive(Debug, Clone, PartialEq)]
pub struct PrefetchQueueEntry {
    pub url: String,
    pub priority: PrefetchPriority,
    pub scheduled_delay: Duration,
    /// Unix millis
    pub enqueued_at: u64,
}

// =============================================================================
// Prefetch Stats
// =============================================================================

/// Statistics for prefetch scheduling
#[derive(Debug, Default)]
pub struct PrefetchStats {
    pub scheduled: AtomicU64,
    pub duplicates: AtomicU64,
    pub rejected: AtomicU64,
    pub completed: AtomicU64,
    pub failed: AtomicU64,
}

impl PrefetchStats {
    /// Create a snapshot of current stats
    pub fn snapshot(&self) -> PrefetchStatsSnapshot {
        PrefetchStatsSnapshot {
            scheduled: self.scheduled.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of prefetch statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchStatsSnapshot {
    pub scheduled: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
}

impl PrefetchStatsSnapshot {
    /// Calculate success ratio (completed / finished)
    pub fn success_ratio(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.completed as f64 / finished as f64
        }
    }
}

// =============================================================================
// Prefetcher
// =============================================================================

/// Result of offering an entry to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    Duplicate,
    QueueFull,
}

/// Prefetch scheduler
pub struct Prefetcher {
    config: PrefetchConfig,
    queue: Mutex<IndexMap<String, PrefetchQueueEntry>>,
    stats: PrefetchStats,
}

impl Prefetcher {
    pub fn new() -> Self {
        Self::with_config(PrefetchConfig::default())
    }

    pub fn with_config(config: PrefetchConfig) -> Self {
        Self {
            config,
            queue: Mutex::new(IndexMap::new()),
            stats: PrefetchStats::default(),
        }
    }

    /// Decide whether a signal warrants a prefetch under the configured strategy
    pub fn decide(&self, signal: &PrefetchSignal, now_ms: u64) -> Option<PrefetchQueueEntry> {
        let delay = Duration::from_millis(self.config.delay_ms);
        let threshold = self.config.scroll_threshold;

        let (url, priority, scheduled_delay) = match (self.config.strategy, signal) {
            (PrefetchStrategy::Off, _) => return None,

            (PrefetchStrategy::Predictive, PrefetchSignal::Hover { url }) => {
                (url.clone(), PrefetchPriority::Low, delay)
            }
            (
                PrefetchStrategy::Predictive | PrefetchStrategy::Conservative,
                PrefetchSignal::Scroll {
                    next_url: Some(url),
                    ..
                },
            ) if signal.past_threshold(threshold) => (url.clone(), PrefetchPriority::Low, delay),

            (PrefetchStrategy::Aggressive, PrefetchSignal::Hover { url })
            | (
                PrefetchStrategy::Aggressive,
                PrefetchSignal::Scroll {
                    next_url: Some(url),
                    ..
                },
            ) => (url.clone(), PrefetchPriority::Normal, Duration::ZERO),

            _ => return None,
        };

        Some(PrefetchQueueEntry {
            url,
            priority,
            scheduled_delay,
            enqueued_at: now_ms,
        })
    }

    /// Entry for an explicit prefetch request, `None` when prefetching is off
    pub fn explicit(&self, url: &str, now_ms: u64) -> Option<PrefetchQueueEntry> {
        if self.config.strategy == PrefetchStrategy::Off {
            return None;
        }
        Some(PrefetchQueueEntry {
            url: url.to_string(),
            priority: PrefetchPriority::High,
            scheduled_delay: Duration::ZERO,
            enqueued_at: now_ms,
        })
    }

    /// Offer an entry to the queue
    pub fn enqueue(&self, entry: PrefetchQueueEntry) -> EnqueueOutcome {
        let mut queue = self.queue.lock();
        if queue.contains_key(&entry.url) {
            self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
            return EnqueueOutcome::Duplicate;
        }
        if queue.len() >= self.config.max_queue_size {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            return EnqueueOutcome::QueueFull;
        }
        queue.insert(entry.url.clone(), entry);
        self.stats.scheduled.fetch_add(1, Ordering::Relaxed);
        EnqueueOutcome::Accepted
    }

    /// Remove a finished entry
    pub fn complete(&self, url: &str, success: bool) {
        if self.queue.lock().shift_remove(url).is_some() {
            let counter = if success {
                &self.stats.completed
            } else {
                &self.stats.failed
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Pending entries, highest priority first
    pub fn pending(&self) -> Vec<PrefetchQueueEntry> {
        let mut entries: Vec<PrefetchQueueEntry> = self.queue.lock().values().cloned().collect();
        entries.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.enqueued_at.cmp(&b.enqueued_at)));
        entries
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }

    /// Clear the prefetch queue
    pub fn clear(&self) {
        self.queue.lock().clear();
    }

    pub fn stats(&self) -> PrefetchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &PrefetchConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.strategy != PrefetchStrategy::Off
    }
}

impl Default for Prefetcher {
    fn default() -> Self {
        Self::new()
    }
}
