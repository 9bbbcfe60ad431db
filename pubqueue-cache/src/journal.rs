//! Collaborator interfaces consumed by the cache.
//!
//! The cache never talks to a message broker directly. It is handed a
//! [`JournalClient`] for tail subscription and range fetches, a
//! [`QueuedCallback`] to signal new work, and a [`QueueRegistry`] for
//! per-agent introspection.

use std::sync::Arc;

use async_trait::async_trait;
use pubqueue_core::{FullMessage, Offset, PubQueueResult, QueueItem, TailRecord};
use tokio::sync::mpsc;

use crate::offset_queue::OffsetQueue;

/// Handle to an open upstream consumer.
///
/// Closing must be safe to call more than once.
pub trait ConsumerHandle: Send + Sync {
    fn close(&self) -> PubQueueResult<()>;
}

/// A live tail subscription.
///
/// Records arrive on `records` in strictly increasing offset order, each
/// offset at most once. The sender side is owned by the journal client; the
/// subscription ends when it is dropped or `handle` is closed.
pub struct TailSubscription {
    pub records: mpsc::Receiver<TailRecord>,
    pub handle: Box<dyn ConsumerHandle>,
}

impl TailSubscription {
    pub fn new(records: mpsc::Receiver<TailRecord>, handle: Box<dyn ConsumerHandle>) -> Self {
        Self { records, handle }
    }
}

impl std::fmt::Debug for TailSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TailSubscription").finish_non_exhaustive()
    }
}

/// Client for the package journal.
#[async_trait]
pub trait JournalClient: Send + Sync + 'static {
    /// Start following the journal tail.
    async fn create_consumer(&self) -> PubQueueResult<TailSubscription>;

    /// Read every message in `[from, to)`, in offset order.
    ///
    /// May block for the duration of an upstream read.
    async fn fetch_range(&self, from: Offset, to: Offset) -> PubQueueResult<Vec<FullMessage>>;
}

/// Notified once per agent group after its messages are merged.
pub trait QueuedCallback: Send + Sync {
    fn queued(&self, messages: &[FullMessage]);
}

/// Callback that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueuedCallback;

impl QueuedCallback for NoopQueuedCallback {
    fn queued(&self, _messages: &[FullMessage]) {}
}

/// Registration of an agent queue with an introspection side channel.
pub trait Registration: Send + Sync {
    fn close(&self) -> PubQueueResult<()>;
}

/// Side channel exposing agent queues for runtime introspection.
///
/// Never consulted for correctness.
pub trait QueueRegistry: Send + Sync {
    fn register(
        &self,
        agent: &str,
        queue: Arc<OffsetQueue<QueueItem>>,
    ) -> PubQueueResult<Box<dyn Registration>>;
}

/// Registry that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopQueueRegistry;

struct NoopRegistration;

impl Registration for NoopRegistration {
    fn close(&self) -> PubQueueResult<()> {
        Ok(())
    }
}

impl QueueRegistry for NoopQueueRegistry {
    fn register(
        &self,
        _agent: &str,
        _queue: Arc<OffsetQueue<QueueItem>>,
    ) -> PubQueueResult<Box<dyn Registration>> {
        Ok(Box::new(NoopRegistration))
    }
}
