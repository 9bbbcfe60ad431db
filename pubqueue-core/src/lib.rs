//! PubQueue Core - Journal and Queue Types
//!
//! Pure data structures shared by the cache and its collaborators.
//! This crate contains ONLY data types and conversions - no caching logic.

use chrono::{DateTime, Utc};

pub mod error;
pub mod item;
pub mod message;

pub use error::{
    CacheError, ConfigError, JournalError, PubQueueError, PubQueueResult, RegistryError,
};
pub use item::QueueItem;
pub use message::{
    FullMessage, MessageInfo, PackageMessage, ReqType, ReqTypeParseError, TailRecord,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Position of a record in the journal.
/// Unique and strictly increasing in delivery order.
pub type Offset = u64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Reserved offset value; never assigned by the journal.
pub const NO_OFFSET: Offset = u64::MAX;
