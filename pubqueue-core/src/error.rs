//! Error types for PubQueue operations

use crate::Offset;
use thiserror::Error;

/// Cache coordinator errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache not ready: no journal record observed yet")]
    NotReady,

    #[error("Backfill timed out after waiting {waited_ms}ms for the head poller")]
    BackfillTimedOut { waited_ms: u64 },
}

/// Journal client errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JournalError {
    #[error("Fetching range [{from}, {to}) failed: {reason}")]
    FetchFailed {
        from: Offset,
        to: Offset,
        reason: String,
    },

    #[error("Subscribing to the journal tail failed: {reason}")]
    SubscribeFailed { reason: String },

    #[error("Closing the journal consumer failed: {reason}")]
    CloseFailed { reason: String },
}

/// Observability registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registering queue for agent {agent} failed: {reason}")]
    RegisterFailed { agent: String, reason: String },

    #[error("Unregistering queue for agent {agent} failed: {reason}")]
    UnregisterFailed { agent: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all PubQueue errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PubQueueError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl PubQueueError {
    /// True if the error means the cache has not been seeded yet.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, PubQueueError::Cache(CacheError::NotReady))
    }

    /// True if the error is a head poller lock timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PubQueueError::Cache(CacheError::BackfillTimedOut { .. }))
    }
}

/// Result type alias for PubQueue operations.
pub type PubQueueResult<T> = Result<T, PubQueueError>;

// =============================================================================
// TESTS
// =============================================================================
