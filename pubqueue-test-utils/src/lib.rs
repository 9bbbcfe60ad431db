//! PubQueue Test Utilities
//!
//! Centralized test infrastructure for the PubQueue workspace:
//! - In-memory journal client with fetch counting and failure injection
//! - Recording doubles for the queued callback and queue registry
//! - Message fixtures and proptest generators
//! - Async wait helper and tracing setup

pub mod fixtures;
pub mod journal;
pub mod recorders;
pub mod strategies;

use std::time::Duration;

pub use journal::InMemoryJournal;
pub use recorders::{InMemoryQueueRegistry, RecordingQueuedCallback};

// Re-export core types for convenience
pub use pubqueue_core::{
    CacheError, FullMessage, JournalError, MessageInfo, Offset, PackageMessage, PubQueueError,
    PubQueueResult, QueueItem, ReqType, TailRecord,
};

/// Install a test-friendly tracing subscriber.
///
/// Honors `RUST_LOG`; defaults to `warn`. Safe to call from every test.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
