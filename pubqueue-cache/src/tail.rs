//! Tail ingestion: follows the journal head-to-tail on a background task.

use std::sync::Arc;

use pubqueue_core::TailRecord;
use tokio::sync::{mpsc, watch};

use crate::merge::MergeEngine;
use crate::stats::CacheMetrics;
use crate::watermark::Watermarks;

/// Applies tail records to the cache.
pub(crate) struct TailIngestor {
    engine: Arc<MergeEngine>,
    watermarks: Arc<Watermarks>,
    metrics: Arc<CacheMetrics>,
}

impl TailIngestor {
    pub(crate) fn new(
        engine: Arc<MergeEngine>,
        watermarks: Arc<Watermarks>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            engine,
            watermarks,
            metrics,
        }
    }

    /// Handle one record delivered by the subscription.
    pub(crate) fn handle(&self, record: TailRecord) {
        CacheMetrics::incr(&self.metrics.tail_records);
        match record {
            TailRecord::Marker(info) => {
                // Markers only extend coverage; they never carry items.
                tracing::trace!(offset = info.offset, "Tail marker");
                self.watermarks.lower_min(info.offset);
            }
            TailRecord::Message(message) => {
                let offset = message.offset();
                tracing::trace!(offset, agent = message.pub_agent_name(), "Tail message");
                self.engine.merge(std::slice::from_ref(&message));
                self.watermarks.raise_max(offset);
            }
        }
    }

    /// Drain `records` until shutdown is signalled or the journal closes the
    /// channel.
    pub(crate) async fn run(
        self,
        mut records: mpsc::Receiver<TailRecord>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        tracing::debug!("Tail ingestion started");
        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!("Tail ingestion shutting down");
                        break;
                    }
                }

                record = records.recv() => {
                    match record {
                        Some(record) => self.handle(record),
                        None => {
                            tracing::debug!("Journal tail closed");
                            break;
                        }
                    }
                }
            }
        }
    }
}
