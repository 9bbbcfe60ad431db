//! Message fixtures.

use chrono::Utc;
use pubqueue_core::{FullMessage, MessageInfo, Offset, PackageMessage, ReqType, TailRecord};

/// Topic name used by every fixture.
pub const TOPIC: &str = "aemdistribution_package";

/// Journal metadata for `offset` on partition 0.
pub fn info(offset: Offset) -> MessageInfo {
    MessageInfo::new(TOPIC, 0, offset, Utc::now())
}

/// A package message from `agent` at `offset`.
pub fn package(offset: Offset, agent: &str, req_type: ReqType) -> FullMessage {
    FullMessage::new(
        info(offset),
        PackageMessage::new(agent, req_type, format!("pkg-{}", offset))
            .with_pkg_type("journal_distribution")
            .with_paths(vec![format!("/content/{}/{}", agent, offset)])
            .with_user_id("admin"),
    )
}

/// An offset-only tail marker.
pub fn marker(offset: Offset) -> TailRecord {
    TailRecord::Marker(info(offset))
}

/// ADD packages for `agent` at each of `offsets`.
pub fn packages(agent: &str, offsets: impl IntoIterator<Item = Offset>) -> Vec<FullMessage> {
    offsets
        .into_iter()
        .map(|offset| package(offset, agent, ReqType::Add))
        .collect()
}
