//! Head backfill: on-demand, single-flight range fetches.
//!
//! Fetching from the journal is costly and concurrent callers usually ask
//! for roughly the same range. At most one backfill runs at a time for the
//! whole cache; other callers wait on the head poller lock (bounded), then
//! re-check the watermark and usually find their range already covered.

use std::sync::Arc;
use std::time::Duration;

use pubqueue_core::{CacheError, Offset, PubQueueResult};
use tokio::sync::Mutex;

use crate::journal::JournalClient;
use crate::merge::MergeEngine;
use crate::stats::CacheMetrics;
use crate::watermark::Watermarks;

/// Serializes backfills and extends coverage backward.
pub(crate) struct HeadPoller {
    lock: Mutex<()>,
    journal: Arc<dyn JournalClient>,
    engine: Arc<MergeEngine>,
    watermarks: Arc<Watermarks>,
    metrics: Arc<CacheMetrics>,
    max_fetch_wait: Duration,
}

impl HeadPoller {
    pub(crate) fn new(
        journal: Arc<dyn JournalClient>,
        engine: Arc<MergeEngine>,
        watermarks: Arc<Watermarks>,
        metrics: Arc<CacheMetrics>,
        max_fetch_wait: Duration,
    ) -> Self {
        Self {
            lock: Mutex::new(()),
            journal,
            engine,
            watermarks,
            metrics,
            max_fetch_wait,
        }
    }

    /// Ensure coverage reaches down to `requested`, fetching if needed.
    ///
    /// The cache must already be seeded.
    pub(crate) async fn fetch_if_needed(&self, requested: Offset) -> PubQueueResult<()> {
        let Some(cached) = self.watermarks.min_offset() else {
            return Err(CacheError::NotReady.into());
        };
        if requested >= cached {
            return Ok(());
        }

        tracing::debug!(
            requested,
            cached,
            "Requested min offset smaller than cached min offset"
        );

        let _guard = match tokio::time::timeout(self.max_fetch_wait, self.lock.lock()).await {
            Ok(guard) => guard,
            Err(_) => {
                CacheMetrics::incr(&self.metrics.backfill_timeouts);
                tracing::warn!(
                    requested,
                    waited_ms = self.max_fetch_wait.as_millis() as u64,
                    "Gave up waiting for head poller"
                );
                return Err(CacheError::BackfillTimedOut {
                    waited_ms: self.max_fetch_wait.as_millis() as u64,
                }
                .into());
            }
        };

        // The range may have been fetched while we waited on the lock.
        let cached = match self.watermarks.min_offset() {
            Some(cached) if requested < cached => cached,
            _ => {
                CacheMetrics::incr(&self.metrics.backfills_skipped);
                tracing::debug!(requested, "Range already fetched by another caller");
                return Ok(());
            }
        };

        self.fetch(requested, cached).await
    }

    /// Fetch `[requested, cached)`, merge it, then lower `min_offset`.
    async fn fetch(&self, requested: Offset, cached: Offset) -> PubQueueResult<()> {
        CacheMetrics::incr(&self.metrics.backfill_fetches);
        let messages = self.journal.fetch_range(requested, cached).await?;
        let outcome = self.engine.merge(&messages);
        self.watermarks.lower_min(requested);

        tracing::debug!(
            from = requested,
            to = cached,
            fetched = messages.len(),
            merged = outcome.merged,
            agents = outcome.agents,
            "Backfill merged"
        );
        Ok(())
    }
}
