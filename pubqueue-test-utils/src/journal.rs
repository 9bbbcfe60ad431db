//! In-memory journal client.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pubqueue_cache::{ConsumerHandle, JournalClient, TailSubscription};
use pubqueue_core::{
    FullMessage, JournalError, MessageInfo, Offset, PubQueueResult, TailRecord,
};
use tokio::sync::mpsc;

use crate::fixtures;

const TAIL_CAPACITY: usize = 1024;

type SharedSender = Arc<Mutex<Option<mpsc::Sender<TailRecord>>>>;

/// Journal double backed by an ordered map.
///
/// Messages added with [`append_history`](Self::append_history) exist only
/// for range fetches (they predate the tail). Messages sent with
/// [`publish`](Self::publish) are stored and delivered on the tail.
#[derive(Debug, Default)]
pub struct InMemoryJournal {
    log: Mutex<BTreeMap<Offset, FullMessage>>,
    tail_tx: SharedSender,
    fetch_calls: Mutex<Vec<(Offset, Offset)>>,
    fetch_delay: Mutex<Duration>,
    fail_fetch: AtomicBool,
    fail_subscribe: AtomicBool,
    fail_close: Arc<AtomicBool>,
    close_calls: Arc<AtomicUsize>,
}

impl InMemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every range fetch by `delay`.
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = delay;
        self
    }

    /// Store messages that are only reachable through range fetches.
    pub fn append_history(&self, messages: impl IntoIterator<Item = FullMessage>) {
        let mut log = self.log.lock().unwrap();
        for message in messages {
            log.insert(message.offset(), message);
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<TailRecord>> {
        self.tail_tx.lock().unwrap().clone()
    }

    /// Store `message` and deliver it on the tail.
    ///
    /// Returns false if no consumer is open.
    pub async fn publish(&self, message: FullMessage) -> bool {
        self.log
            .lock()
            .unwrap()
            .insert(message.offset(), message.clone());
        match self.sender() {
            Some(tx) => tx.send(TailRecord::Message(message)).await.is_ok(),
            None => false,
        }
    }

    /// Deliver an offset-only marker on the tail.
    pub async fn publish_marker(&self, offset: Offset) -> bool {
        self.publish_marker_info(fixtures::info(offset)).await
    }

    pub async fn publish_marker_info(&self, info: MessageInfo) -> bool {
        match self.sender() {
            Some(tx) => tx.send(TailRecord::Marker(info)).await.is_ok(),
            None => false,
        }
    }

    /// Every `(from, to)` passed to `fetch_range`, in call order.
    pub fn fetch_calls(&self) -> Vec<(Offset, Offset)> {
        self.fetch_calls.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Number of times a consumer handle was closed.
    pub fn close_count(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Whether a consumer is currently attached.
    pub fn has_consumer(&self) -> bool {
        self.tail_tx.lock().unwrap().is_some()
    }
}

#[async_trait]
impl JournalClient for InMemoryJournal {
    async fn create_consumer(&self) -> PubQueueResult<TailSubscription> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(JournalError::SubscribeFailed {
                reason: "journal unavailable".to_string(),
            }
            .into());
        }
        let (tx, rx) = mpsc::channel(TAIL_CAPACITY);
        *self.tail_tx.lock().unwrap() = Some(tx);
        let handle = InMemoryConsumerHandle {
            sender: self.tail_tx.clone(),
            fail: self.fail_close.clone(),
            calls: self.close_calls.clone(),
        };
        Ok(TailSubscription::new(rx, Box::new(handle)))
    }

    async fn fetch_range(&self, from: Offset, to: Offset) -> PubQueueResult<Vec<FullMessage>> {
        self.fetch_calls.lock().unwrap().push((from, to));

        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(JournalError::FetchFailed {
                from,
                to,
                reason: "injected failure".to_string(),
            }
            .into());
        }

        if from >= to {
            return Ok(Vec::new());
        }
        Ok(self
            .log
            .lock()
            .unwrap()
            .range(from..to)
            .map(|(_, message)| message.clone())
            .collect())
    }
}

struct InMemoryConsumerHandle {
    sender: SharedSender,
    fail: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl ConsumerHandle for InMemoryConsumerHandle {
    fn close(&self) -> PubQueueResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sender.lock().unwrap().take();
        if self.fail.load(Ordering::SeqCst) {
            return Err(JournalError::CloseFailed {
                reason: "consumer already closed".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
