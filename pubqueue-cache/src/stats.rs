//! Counters describing cache activity.

use std::sync::atomic::{AtomicU64, Ordering};

use pubqueue_core::Offset;

/// Activity counters, updated lock-free by the tail task and query callers.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    /// Tail records handled (markers included)
    pub tail_records: AtomicU64,

    /// Upstream range fetches issued by backfills
    pub backfill_fetches: AtomicU64,

    /// Backfills skipped because another caller already covered the range
    pub backfills_skipped: AtomicU64,

    /// Callers that gave up waiting for the head poller
    pub backfill_timeouts: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of agents with a queue
    pub agents: usize,
    /// Items across all agent queues
    pub items: usize,
    pub min_offset: Option<Offset>,
    pub max_offset: Option<Offset>,
    pub tail_records: u64,
    pub backfill_fetches: u64,
    pub backfills_skipped: u64,
    pub backfill_timeouts: u64,
}

impl CacheStats {
    pub(crate) fn with_metrics(mut self, metrics: &CacheMetrics) -> Self {
        self.tail_records = metrics.tail_records.load(Ordering::Relaxed);
        self.backfill_fetches = metrics.backfill_fetches.load(Ordering::Relaxed);
        self.backfills_skipped = metrics.backfills_skipped.load(Ordering::Relaxed);
        self.backfill_timeouts = metrics.backfill_timeouts.load(Ordering::Relaxed);
        self
    }

    /// Number of offsets between the watermarks, inclusive.
    ///
    /// Zero until both watermarks are known.
    pub fn covered_span(&self) -> u64 {
        match (self.min_offset, self.max_offset) {
            (Some(min), Some(max)) if max >= min => max - min + 1,
            _ => 0,
        }
    }
}
