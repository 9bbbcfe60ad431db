//! Merge engine: the single place that writes agent queues.
//!
//! A batch is either one tail message or a whole backfill range. TEST
//! messages are dropped from insertion but still count toward coverage:
//! `min_offset` is lowered to the first offset of the batch only after every
//! agent group has landed.

use std::collections::HashMap;
use std::sync::Arc;

use pubqueue_core::{FullMessage, QueueItem};

use crate::agent_queues::AgentQueues;
use crate::journal::QueuedCallback;
use crate::offset_queue::OffsetQueue;
use crate::watermark::Watermarks;

/// Summary of one merge call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Messages inserted into agent queues
    pub merged: usize,
    /// TEST messages skipped
    pub filtered: usize,
    /// Agent groups notified
    pub agents: usize,
}

/// Filters, groups and inserts journal messages into agent queues.
pub struct MergeEngine {
    queues: Arc<AgentQueues>,
    watermarks: Arc<Watermarks>,
    queued_callback: Arc<dyn QueuedCallback>,
}

impl MergeEngine {
    pub fn new(
        queues: Arc<AgentQueues>,
        watermarks: Arc<Watermarks>,
        queued_callback: Arc<dyn QueuedCallback>,
    ) -> Self {
        Self {
            queues,
            watermarks,
            queued_callback,
        }
    }

    /// Merge an offset-ordered batch.
    pub fn merge(&self, messages: &[FullMessage]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (agent, group) in group_by_agent(messages) {
            outcome.merged += group.len();
            outcome.agents += 1;
            self.merge_by_agent(agent, &group);
        }
        outcome.filtered = messages.len() - outcome.merged;

        // Lowered only after all groups are merged, so no reader sees
        // coverage whose items are still missing.
        if let Some(first) = messages.first() {
            self.watermarks.lower_min(first.offset());
        }
        outcome
    }

    fn merge_by_agent(&self, agent: &str, group: &[FullMessage]) {
        let staging: OffsetQueue<QueueItem> = group
            .iter()
            .map(|message| (message.offset(), QueueItem::from(message)))
            .collect();
        self.queues.get_or_create(agent).put_items(staging);

        tracing::trace!(agent, count = group.len(), "Merged agent messages");
        self.queued_callback.queued(group);
    }
}

/// Group non-TEST messages by agent, keeping first-appearance order of
/// agents and delivery order within each group.
fn group_by_agent(messages: &[FullMessage]) -> Vec<(&str, Vec<FullMessage>)> {
    let mut groups: Vec<(&str, Vec<FullMessage>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for message in messages.iter().filter(|m| !m.is_test()) {
        let agent = message.pub_agent_name();
        let slot = *index.entry(agent).or_insert_with(|| {
            groups.push((agent, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(message.clone());
    }
    groups
}
