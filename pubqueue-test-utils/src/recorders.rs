//! Recording doubles for the queued callback and queue registry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use pubqueue_cache::{AgentQueue, QueueRegistry, QueuedCallback, Registration};
use pubqueue_core::{FullMessage, Offset, PubQueueResult, RegistryError};

/// Records every `queued` notification.
#[derive(Debug, Default)]
pub struct RecordingQueuedCallback {
    calls: Mutex<Vec<Vec<FullMessage>>>,
}

impl RecordingQueuedCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Offsets of each notification, in call order.
    pub fn offsets(&self) -> Vec<Vec<Offset>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|group| group.iter().map(FullMessage::offset).collect())
            .collect()
    }

    /// Agent of each notification, in call order.
    pub fn agents(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|group| group.first().map(|m| m.pub_agent_name().to_string()))
            .collect()
    }
}

impl QueuedCallback for RecordingQueuedCallback {
    fn queued(&self, messages: &[FullMessage]) {
        self.calls.lock().unwrap().push(messages.to_vec());
    }
}

/// Registry that tracks which agent queues are registered.
#[derive(Debug, Default)]
pub struct InMemoryQueueRegistry {
    queues: Mutex<Vec<(String, AgentQueue)>>,
    unregistered: Arc<Mutex<Vec<String>>>,
    fail_register: AtomicBool,
    fail_close: Arc<AtomicBool>,
}

impl InMemoryQueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agents registered so far, in registration order.
    pub fn registered(&self) -> Vec<String> {
        self.queues
            .lock()
            .unwrap()
            .iter()
            .map(|(agent, _)| agent.clone())
            .collect()
    }

    /// The registered queue of `agent`, as an introspection client sees it.
    pub fn queue(&self, agent: &str) -> Option<AgentQueue> {
        self.queues
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| name == agent)
            .map(|(_, queue)| queue.clone())
    }

    /// Agents whose registration was closed, in close order.
    pub fn unregistered(&self) -> Vec<String> {
        self.unregistered.lock().unwrap().clone()
    }

    pub fn set_fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }
}

impl QueueRegistry for InMemoryQueueRegistry {
    fn register(&self, agent: &str, queue: AgentQueue) -> PubQueueResult<Box<dyn Registration>> {
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(RegistryError::RegisterFailed {
                agent: agent.to_string(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.queues.lock().unwrap().push((agent.to_string(), queue));
        Ok(Box::new(InMemoryRegistration {
            agent: agent.to_string(),
            unregistered: self.unregistered.clone(),
            fail: self.fail_close.clone(),
        }))
    }
}

struct InMemoryRegistration {
    agent: String,
    unregistered: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
}

impl Registration for InMemoryRegistration {
    fn close(&self) -> PubQueueResult<()> {
        self.unregistered.lock().unwrap().push(self.agent.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(RegistryError::UnregisterFailed {
                agent: self.agent.clone(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
