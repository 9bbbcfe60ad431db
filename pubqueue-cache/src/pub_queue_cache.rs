//! The cache coordinator.
//!
//! Packages are fetched by two pollers. The "tail" poller runs on a
//! background task and keeps following the newest records. The "head"
//! poller runs on demand, inside `query`, and fetches older records when a
//! caller asks for offsets below the covered range.

use std::sync::{Arc, Mutex, MutexGuard};

use pubqueue_core::{CacheError, Offset, PubQueueResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::agent_queues::{AgentQueue, AgentQueues};
use crate::backfill::HeadPoller;
use crate::config::CacheConfig;
use crate::journal::{
    ConsumerHandle, JournalClient, NoopQueueRegistry, NoopQueuedCallback, QueueRegistry,
    QueuedCallback,
};
use crate::merge::MergeEngine;
use crate::offset_queue::OffsetQueue;
use crate::stats::{CacheMetrics, CacheStats};
use crate::tail::TailIngestor;
use crate::watermark::Watermarks;

/// Running tail subscription owned by the cache.
struct TailTask {
    handle: Box<dyn ConsumerHandle>,
    task: JoinHandle<()>,
}

/// Read-through cache of per-agent package queues.
///
/// TEST packages move the watermarks like any other record but are never
/// stored.
///
/// # Example
///
/// ```ignore
/// let cache = PubQueueCache::new(journal, callback, registry, CacheConfig::default()).await?;
///
/// // Agent queue covering at least offsets >= 100
/// let queue = cache.query("publish", 100).await?;
/// for (offset, item) in queue.get_items(100, 50) {
///     println!("{} {}", offset, item.package_id);
/// }
///
/// cache.close().await;
/// ```
pub struct PubQueueCache {
    queues: Arc<AgentQueues>,
    watermarks: Arc<Watermarks>,
    metrics: Arc<CacheMetrics>,
    head_poller: HeadPoller,
    config: CacheConfig,
    shutdown_tx: watch::Sender<bool>,
    tail: Mutex<Option<TailTask>>,
}

impl PubQueueCache {
    /// Create the cache and start tail ingestion.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn new(
        journal: Arc<dyn JournalClient>,
        queued_callback: Arc<dyn QueuedCallback>,
        registry: Arc<dyn QueueRegistry>,
        config: CacheConfig,
    ) -> PubQueueResult<Self> {
        config.validate()?;

        let queues = Arc::new(AgentQueues::new(registry, config.register_queues));
        let watermarks = Arc::new(Watermarks::new());
        let metrics = Arc::new(CacheMetrics::new());
        let engine = Arc::new(MergeEngine::new(
            queues.clone(),
            watermarks.clone(),
            queued_callback,
        ));

        let subscription = journal.create_consumer().await?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ingestor = TailIngestor::new(engine.clone(), watermarks.clone(), metrics.clone());
        let task = tokio::spawn(ingestor.run(subscription.records, shutdown_rx));

        let head_poller = HeadPoller::new(
            journal,
            engine,
            watermarks.clone(),
            metrics.clone(),
            config.max_fetch_wait,
        );

        tracing::debug!(
            max_fetch_wait_ms = config.max_fetch_wait.as_millis() as u64,
            register_queues = config.register_queues,
            "Package queue cache started"
        );

        Ok(Self {
            queues,
            watermarks,
            metrics,
            head_poller,
            config,
            shutdown_tx,
            tail: Mutex::new(Some(TailTask {
                handle: subscription.handle,
                task,
            })),
        })
    }

    /// Create a cache with no-op callback and registry and default config.
    pub async fn with_defaults(journal: Arc<dyn JournalClient>) -> PubQueueResult<Self> {
        Self::new(
            journal,
            Arc::new(NoopQueuedCallback),
            Arc::new(NoopQueueRegistry),
            CacheConfig::default(),
        )
        .await
    }

    /// Get the queue of `agent`, covering at least offsets `>= min_offset`.
    ///
    /// Unknown agents yield an empty queue. Fails with
    /// [`CacheError::NotReady`] until tail ingestion has seen a record, and
    /// with [`CacheError::BackfillTimedOut`] if a backfill is needed but the
    /// head poller stays busy past `max_fetch_wait`.
    pub async fn query(&self, agent: &str, min_offset: Offset) -> PubQueueResult<AgentQueue> {
        if !self.watermarks.is_seeded() {
            return Err(CacheError::NotReady.into());
        }
        self.head_poller.fetch_if_needed(min_offset).await?;
        Ok(self
            .queues
            .get(agent)
            .unwrap_or_else(|| Arc::new(OffsetQueue::new())))
    }

    /// Number of items across all agent queues.
    pub fn size(&self) -> usize {
        self.queues.total_size()
    }

    /// Lowest fully covered offset, or `None` while unseeded.
    pub fn min_offset(&self) -> Option<Offset> {
        self.watermarks.min_offset()
    }

    /// Highest offset observed by tail ingestion.
    pub fn max_offset(&self) -> Option<Offset> {
        self.watermarks.max_offset()
    }

    pub fn is_seeded(&self) -> bool {
        self.watermarks.is_seeded()
    }

    /// Names of the agents with a queue, sorted.
    pub fn agents(&self) -> Vec<String> {
        self.queues.agent_names()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            agents: self.queues.len(),
            items: self.queues.total_size(),
            min_offset: self.watermarks.min_offset(),
            max_offset: self.watermarks.max_offset(),
            ..Default::default()
        }
        .with_metrics(&self.metrics)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lock_tail(&self) -> MutexGuard<'_, Option<TailTask>> {
        match self.tail.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stop tail ingestion and release every queue registration.
    ///
    /// Never fails; errors are logged. Safe to call more than once. Queues
    /// already cached stay readable.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);

        let tail = self.lock_tail().take();
        if let Some(TailTask { handle, mut task }) = tail {
            if let Err(e) = handle.close() {
                tracing::warn!(error = %e, "Failed to close journal consumer");
            }
            match tokio::time::timeout(self.config.close_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Tail ingestion task failed");
                }
                Err(_) => {
                    tracing::warn!(
                        close_timeout_ms = self.config.close_timeout.as_millis() as u64,
                        "Tail ingestion did not stop in time, aborting"
                    );
                    task.abort();
                }
            }
            tracing::debug!("Package queue cache closed");
        }

        self.queues.close_registrations();
    }
}

impl Drop for PubQueueCache {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        let tail = match self.tail.get_mut() {
            Ok(tail) => tail.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(TailTask { handle, task }) = tail {
            if let Err(e) = handle.close() {
                tracing::warn!(error = %e, "Failed to close journal consumer");
            }
            task.abort();
        }
        self.queues.close_registrations();
    }
}

impl std::fmt::Debug for PubQueueCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubQueueCache")
            .field("queues", &self.queues)
            .field("watermarks", &self.watermarks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
