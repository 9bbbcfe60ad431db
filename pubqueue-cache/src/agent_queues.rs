//! Grow-only table of per-agent queues.
//!
//! Queues are created lazily the first time a message for an agent is
//! merged and are never removed while the cache is alive. The table also
//! owns every introspection registration so they can be released exactly
//! once at shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use pubqueue_core::QueueItem;

use crate::journal::{QueueRegistry, Registration};
use crate::offset_queue::OffsetQueue;

/// Shared handle to one agent's queue.
pub type AgentQueue = Arc<OffsetQueue<QueueItem>>;

/// Concurrent agent name -> queue mapping.
pub struct AgentQueues {
    queues: DashMap<String, AgentQueue>,
    registrations: DashMap<String, Box<dyn Registration>>,
    registry: Arc<dyn QueueRegistry>,
    register_queues: bool,
    /// Set once registrations are released; later queues stay unregistered.
    closed: AtomicBool,
}

impl AgentQueues {
    /// Create an empty table. When `register_queues` is set, each new queue
    /// is announced to `registry`.
    pub fn new(registry: Arc<dyn QueueRegistry>, register_queues: bool) -> Self {
        Self {
            queues: DashMap::new(),
            registrations: DashMap::new(),
            registry,
            register_queues,
            closed: AtomicBool::new(false),
        }
    }

    /// Queue for `agent`, if one exists.
    pub fn get(&self, agent: &str) -> Option<AgentQueue> {
        self.queues.get(agent).map(|queue| queue.value().clone())
    }

    /// Queue for `agent`, creating (and registering) it if absent.
    pub fn get_or_create(&self, agent: &str) -> AgentQueue {
        if let Some(queue) = self.get(agent) {
            return queue;
        }

        // The shard lock is released at the end of the match, before
        // the registry is called.
        let (queue, created) = match self.queues.entry(agent.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let queue: AgentQueue = Arc::new(OffsetQueue::new());
                entry.insert(queue.clone());
                (queue, true)
            }
        };

        if created {
            tracing::debug!(agent, "Created agent queue");
            if self.register_queues {
                self.register(agent, &queue);
            }
        }
        queue
    }

    fn register(&self, agent: &str, queue: &AgentQueue) {
        if self.closed.load(Ordering::Acquire) {
            tracing::debug!(agent, "Registrations closed, not registering agent queue");
            return;
        }
        match self.registry.register(agent, queue.clone()) {
            Ok(registration) => {
                self.registrations.insert(agent.to_string(), registration);
                // Lost a race with close_registrations; release it here.
                if self.closed.load(Ordering::Acquire) {
                    self.release(agent);
                }
            }
            Err(e) => {
                tracing::warn!(agent, error = %e, "Failed to register agent queue");
            }
        }
    }

    fn release(&self, agent: &str) {
        if let Some((agent, registration)) = self.registrations.remove(agent) {
            if let Err(e) = registration.close() {
                tracing::warn!(agent = %agent, error = %e, "Failed to close agent queue registration");
            }
        }
    }

    /// Total number of items across every agent queue.
    pub fn total_size(&self) -> usize {
        self.queues.iter().map(|queue| queue.value().size()).sum()
    }

    /// Number of known agents.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Names of every known agent, sorted.
    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.queues.iter().map(|queue| queue.key().clone()).collect();
        names.sort();
        names
    }

    /// Release every registration in agent name order. Failures are logged,
    /// never returned.
    ///
    /// Queues created afterwards are not registered, and a second call does
    /// nothing.
    pub fn close_registrations(&self) {
        self.closed.store(true, Ordering::Release);

        let mut agents: Vec<String> = self
            .registrations
            .iter()
            .map(|registration| registration.key().clone())
            .collect();
        agents.sort();
        for agent in agents {
            self.release(&agent);
        }
    }
}

impl std::fmt::Debug for AgentQueues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentQueues")
            .field("agents", &self.agent_names())
            .field("register_queues", &self.register_queues)
            .finish_non_exhaustive()
    }
}
