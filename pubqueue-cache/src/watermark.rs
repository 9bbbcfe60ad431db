//! Offset watermarks describing the cache's journal coverage.
//!
//! Two monotonic bounds are tracked:
//!
//! - `min_offset`: the lowest offset from which the cache holds every
//!   non-TEST message upward. Starts unseeded and only ever moves down.
//! - `max_offset`: the highest offset observed by tail ingestion. Starts at
//!   none and only ever moves up.
//!
//! Both are lock-free. Readers may see a stale value, but never one that
//! overshoots what has actually been merged.

use std::sync::atomic::{AtomicU64, Ordering};

use pubqueue_core::{Offset, NO_OFFSET};

/// Monotonic min/max offset pair.
#[derive(Debug)]
pub struct Watermarks {
    min: AtomicU64,
    max: AtomicU64,
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            min: AtomicU64::new(NO_OFFSET),
            max: AtomicU64::new(NO_OFFSET),
        }
    }
}

impl Watermarks {
    /// Create unseeded watermarks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowest fully covered offset, or `None` while unseeded.
    pub fn min_offset(&self) -> Option<Offset> {
        match self.min.load(Ordering::Acquire) {
            NO_OFFSET => None,
            offset => Some(offset),
        }
    }

    /// Highest offset observed by tail ingestion, if any.
    pub fn max_offset(&self) -> Option<Offset> {
        match self.max.load(Ordering::Acquire) {
            NO_OFFSET => None,
            offset => Some(offset),
        }
    }

    /// Whether any tail contact has seeded `min_offset`.
    pub fn is_seeded(&self) -> bool {
        self.min_offset().is_some()
    }

    /// Lower `min_offset` to `offset` if it is smaller. Returns the new value.
    pub fn lower_min(&self, offset: Offset) -> Offset {
        let previous = self.min.fetch_min(offset, Ordering::AcqRel);
        previous.min(offset)
    }

    /// Raise `max_offset` to `offset` if it is larger. Returns the new value.
    pub fn raise_max(&self, offset: Offset) -> Offset {
        let result = self
            .max
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current == NO_OFFSET || offset > current {
                    Some(offset)
                } else {
                    None
                }
            });
        match result {
            Ok(_) => offset,
            Err(current) => current,
        }
    }
}
