//! Cache Metrics
//!
//! Lock-free counters updated on the request path, point-in-time snapshots
//! for callers, and Prometheus text exposition of a snapshot.

use crate::error::{Error, Result};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metric name prefix used in the Prometheus exposition
pub const METRIC_PREFIX: &str = "stac_cache";

// =============================================================================
// Counters
// =============================================================================

/// Counters for one tiered cache instance, aligned to prevent false sharing
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    total_requests: AtomicU64,
    /// Sum of user-facing response times (microseconds)
    response_time_total_us: AtomicU64,
    /// Number of user-facing responses timed
    response_samples: AtomicU64,
    network_fetches: AtomicU64,
    deduplicated_requests: AtomicU64,
    prefetch_requests: AtomicU64,
    prefetch_failures: AtomicU64,
    disk_errors: AtomicU64,
    compression_skips: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    /// Record the latency of a user-facing request
    #[inline]
    pub fn record_response_time(&self, elapsed: Duration) {
        self.response_time_total_us
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        self.response_samples.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_deduplicated(&self) {
        self.deduplicated_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_prefetch_request(&self) {
        self.prefetch_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_prefetch_failure(&self) {
        self.prefetch_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_disk_error(&self) {
        self.disk_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_compression_skip(&self) {
        self.compression_skips.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset every counter to zero
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.evictions,
            &self.total_requests,
            &self.response_time_total_us,
            &self.response_samples,
            &self.network_fetches,
            &self.deduplicated_requests,
            &self.prefetch_requests,
            &self.prefetch_failures,
            &self.disk_errors,
            &self.compression_skips,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Create a snapshot, combining the counters with memory-tier gauges
    pub fn snapshot(&self, memory_bytes: u64, memory_entries: u64) -> MetricsSnapshot {
        let samples = self.response_samples.load(Ordering::Relaxed);
        let total_us = self.response_time_total_us.load(Ordering::Relaxed);
        let average_response_ms = if samples == 0 {
            0.0
        } else {
            total_us as f64 / samples as f64 / 1000.0
        };

        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            average_response_ms,
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            deduplicated_requests: self.deduplicated_requests.load(Ordering::Relaxed),
            prefetch_requests: self.prefetch_requests.load(Ordering::Relaxed),
            prefetch_failures: self.prefetch_failures.load(Ordering::Relaxed),
            disk_errors: self.disk_errors.load(Ordering::Relaxed),
            compression_skips: self.compression_skips.load(Ordering::Relaxed),
            memory_bytes,
            memory_entries,
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Point-in-time snapshot of cache metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
    /// Running average of user-facing response times
    pub average_response_ms: f64,
    pub network_fetches: u64,
    pub deduplicated_requests: u64,
    pub prefetch_requests: u64,
    pub prefetch_failures: u64,
    pub disk_errors: u64,
    pub compression_skips: u64,
    pub memory_bytes: u64,
    pub memory_entries: u64,
}

impl MetricsSnapshot {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Prometheus Exposition
// =============================================================================

fn metric_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registry: {}", e))
}

fn counter(registry: &Registry, name: &str, help: &str, value: u64) -> Result<()> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace(METRIC_PREFIX))
        .map_err(metric_error)?;
    counter.inc_by(value);
    registry.register(Box::new(counter)).map_err(metric_error)
}

fn gauge(registry: &Registry, name: &str, help: &str, value: i64) -> Result<()> {
    let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(METRIC_PREFIX))
        .map_err(metric_error)?;
    gauge.set(value);
    registry.register(Box::new(gauge)).map_err(metric_error)
}

/// Render a snapshot in the Prometheus text exposition format
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> Result<String> {
    let registry = Registry::new();

    counter(&registry, "hits_total", "Cache hits", snapshot.hits)?;
    counter(&registry, "misses_total", "Cache misses", snapshot.misses)?;
    counter(&registry, "evictions_total", "Memory tier evictions", snapshot.evictions)?;
    counter(&registry, "requests_total", "Cache lookups", snapshot.total_requests)?;
    counter(
        &registry,
        "network_fetches_total",
        "Requests sent to the network",
        snapshot.network_fetches,
    )?;
    counter(
        &registry,
        "deduplicated_requests_total",
        "Lookups joined onto an in-flight request",
        snapshot.deduplicated_requests,
    )?;
    counter(
        &registry,
        "prefetch_requests_total",
        "Prefetches executed",
        snapshot.prefetch_requests,
    )?;
    counter(
        &registry,
        "prefetch_failures_total",
        "Prefetches that failed",
        snapshot.prefetch_failures,
    )?;
    counter(&registry, "disk_errors_total", "Disk tier errors absorbed", snapshot.disk_errors)?;
    counter(
        &registry,
        "compression_skips_total",
        "Payloads stored uncompressed after a compression attempt",
        snapshot.compression_skips,
    )?;
    gauge(&registry, "memory_bytes", "Bytes held by the memory tier", snapshot.memory_bytes as i64)?;
    gauge(
        &registry,
        "memory_entries",
        "Entries held by the memory tier",
        snapshot.memory_entries as i64,
    )?;

    let average = Gauge::with_opts(
        Opts::new("average_response_ms", "Average user-facing response time").namespace(METRIC_PREFIX),
    )
    .map_err(metric_error)?;
    average.set(snapshot.average_response_ms);
    registry.register(Box::new(average)).map_err(metric_error)?;

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(metric_error)?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(format!("metrics encoding: {}", e)))
}
