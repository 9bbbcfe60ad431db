//! PubQueue Cache - Per-Agent Package Queues over the Journal
//!
//! Caches the distribution packages read from the package journal, grouped
//! into one offset-ordered queue per publishing agent.
//!
//! # Coverage
//!
//! The cache tracks two watermarks. `min_offset` is the lowest offset from
//! which every non-TEST package is held; `max_offset` is the newest offset
//! seen on the tail. Tail ingestion only ever grows coverage forward. Queries
//! that need older offsets trigger a single-flight backfill that grows it
//! backward, and the watermark is lowered only once the fetched packages are
//! merged.
//!
//! # Example
//!
//! ```ignore
//! let cache = PubQueueCache::with_defaults(journal).await?;
//! let queue = cache.query("publish", requested_offset).await?;
//! println!("{} items cached for publish", queue.size());
//! ```

pub mod agent_queues;
mod backfill;
pub mod config;
pub mod journal;
pub mod merge;
pub mod offset_queue;
pub mod pub_queue_cache;
pub mod stats;
mod tail;
pub mod watermark;

pub use agent_queues::{AgentQueue, AgentQueues};
pub use config::CacheConfig;
pub use journal::{
    ConsumerHandle, JournalClient, NoopQueueRegistry, NoopQueuedCallback, QueueRegistry,
    QueuedCallback, Registration, TailSubscription,
};
pub use merge::{MergeEngine, MergeOutcome};
pub use offset_queue::OffsetQueue;
pub use pub_queue_cache::PubQueueCache;
pub use stats::{CacheMetrics, CacheStats};
pub use watermark::Watermarks;
