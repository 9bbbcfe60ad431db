//! Agent-visible queue items.

use crate::message::{FullMessage, ReqType};
use crate::{Offset, Timestamp};
use serde::{Deserialize, Serialize};

/// Projection of a package message as seen by queue consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub package_id: String,
    pub offset: Offset,
    pub req_type: ReqType,
    pub pkg_type: String,
    pub paths: Vec<String>,
    pub deep_paths: Vec<String>,
    pub user_id: String,
    pub pkg_length: u64,
    /// When the journal recorded the message
    pub created_at: Timestamp,
}

impl QueueItem {
    /// Queue item identifier, unique per journal offset.
    pub fn item_id(&self) -> String {
        format!("package-{}", self.offset)
    }
}

impl From<&FullMessage> for QueueItem {
    fn from(full: &FullMessage) -> Self {
        let message = &full.message;
        Self {
            package_id: message.package_id.clone(),
            offset: full.info.offset,
            req_type: message.req_type,
            pkg_type: message.pkg_type.clone(),
            paths: message.paths.clone(),
            deep_paths: message.deep_paths.clone(),
            user_id: message.user_id.clone(),
            pkg_length: message.pkg_length,
            created_at: full.info.created_time,
        }
    }
}
