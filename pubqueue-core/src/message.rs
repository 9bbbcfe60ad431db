//! Journal message types.
//!
//! A journal delivers package events as `(MessageInfo, PackageMessage)` pairs.
//! The tail subscription may also deliver offset-only markers, which are
//! modelled as an explicit [`TailRecord::Marker`] variant rather than a
//! missing payload.

use crate::{Offset, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// REQUEST TYPE
// ============================================================================

/// Kind of distribution request carried by a package message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReqType {
    /// Content added or updated
    Add,
    /// Content deleted
    Delete,
    /// Internal control message, never surfaced in agent queues
    Test,
    /// Cache invalidation request
    Invalidate,
}

impl ReqType {
    /// Convert to the wire string representation.
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            ReqType::Add => "ADD",
            ReqType::Delete => "DELETE",
            ReqType::Test => "TEST",
            ReqType::Invalidate => "INVALIDATE",
        }
    }

    /// Parse from the wire string representation (case-insensitive).
    pub fn from_wire_str(s: &str) -> Result<Self, ReqTypeParseError> {
        match s.to_lowercase().as_str() {
            "add" => Ok(ReqType::Add),
            "delete" => Ok(ReqType::Delete),
            "test" => Ok(ReqType::Test),
            "invalidate" => Ok(ReqType::Invalidate),
            _ => Err(ReqTypeParseError(s.to_string())),
        }
    }

    /// Whether messages of this type are kept out of agent queues.
    pub fn is_test(&self) -> bool {
        matches!(self, ReqType::Test)
    }
}

impl fmt::Display for ReqType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire_str())
    }
}

impl FromStr for ReqType {
    type Err = ReqTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_wire_str(s)
    }
}

/// Error when parsing an invalid request type string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqTypeParseError(pub String);

impl fmt::Display for ReqTypeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid request type: {}", self.0)
    }
}

impl std::error::Error for ReqTypeParseError {}

// ============================================================================
// MESSAGE METADATA
// ============================================================================

/// Journal-assigned metadata for a delivered record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub topic: String,
    pub partition: i32,
    pub offset: Offset,
    pub created_time: Timestamp,
}

impl MessageInfo {
    pub fn new(topic: impl Into<String>, partition: i32, offset: Offset, created_time: Timestamp) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            created_time,
        }
    }
}

/// A distribution package event as published by an agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageMessage {
    /// Name of the publishing agent that produced the package
    pub pub_agent_name: String,
    pub req_type: ReqType,
    pub package_id: String,
    pub pkg_type: String,
    pub paths: Vec<String>,
    pub deep_paths: Vec<String>,
    pub user_id: String,
    /// Size of the serialized package in bytes
    pub pkg_length: u64,
}

impl PackageMessage {
    /// Create a package message with only the routing fields set.
    pub fn new(pub_agent_name: impl Into<String>, req_type: ReqType, package_id: impl Into<String>) -> Self {
        Self {
            pub_agent_name: pub_agent_name.into(),
            req_type,
            package_id: package_id.into(),
            pkg_type: String::new(),
            paths: Vec::new(),
            deep_paths: Vec::new(),
            user_id: String::new(),
            pkg_length: 0,
        }
    }

    /// Set the package type.
    pub fn with_pkg_type(mut self, pkg_type: impl Into<String>) -> Self {
        self.pkg_type = pkg_type.into();
        self
    }

    /// Set the affected content paths.
    pub fn with_paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    /// Set the paths distributed with their whole subtree.
    pub fn with_deep_paths(mut self, deep_paths: Vec<String>) -> Self {
        self.deep_paths = deep_paths;
        self
    }

    /// Set the user that triggered the distribution.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Set the package size.
    pub fn with_pkg_length(mut self, pkg_length: u64) -> Self {
        self.pkg_length = pkg_length;
        self
    }
}

/// A package message together with its journal metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullMessage {
    pub info: MessageInfo,
    pub message: PackageMessage,
}

impl FullMessage {
    pub fn new(info: MessageInfo, message: PackageMessage) -> Self {
        Self { info, message }
    }

    pub fn offset(&self) -> Offset {
        self.info.offset
    }

    pub fn pub_agent_name(&self) -> &str {
        &self.message.pub_agent_name
    }

    pub fn is_test(&self) -> bool {
        self.message.req_type.is_test()
    }
}

/// A record delivered by the journal tail subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailRecord {
    /// Offset-only marker; carries no package payload
    Marker(MessageInfo),
    /// A complete package message
    Message(FullMessage),
}

impl TailRecord {
    /// Offset of the delivered record.
    pub fn offset(&self) -> Offset {
        match self {
            TailRecord::Marker(info) => info.offset,
            TailRecord::Message(msg) => msg.info.offset,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, TailRecord::Marker(_))
    }
}

impl From<FullMessage> for TailRecord {
    fn from(msg: FullMessage) -> Self {
        TailRecord::Message(msg)
    }
}
