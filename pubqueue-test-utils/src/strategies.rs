//! Proptest generators for journal messages.

use proptest::prelude::*;
use pubqueue_core::{FullMessage, ReqType};

use crate::fixtures::package;

/// Any request type, TEST included.
pub fn req_type_strategy() -> impl Strategy<Value = ReqType> {
    prop_oneof![
        4 => Just(ReqType::Add),
        2 => Just(ReqType::Delete),
        2 => Just(ReqType::Test),
        1 => Just(ReqType::Invalidate),
    ]
}

/// One of a small set of agent names, so batches share agents.
pub fn agent_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("publish".to_string()),
        Just("author".to_string()),
        Just("preview".to_string()),
        "[a-z]{1,8}",
    ]
}

/// An offset-ordered batch of up to `max_len` messages with strictly
/// increasing, possibly gapped, offsets.
pub fn message_batch_strategy(max_len: usize) -> impl Strategy<Value = Vec<FullMessage>> {
    (
        0u64..1_000,
        prop::collection::vec((1u64..4, agent_strategy(), req_type_strategy()), 0..max_len),
    )
        .prop_map(|(start, entries)| {
            let mut offset = start;
            entries
                .into_iter()
                .map(|(gap, agent, req_type)| {
                    offset += gap;
                    package(offset, &agent, req_type)
                })
                .collect()
        })
}
