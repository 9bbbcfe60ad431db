//! Offset-ordered queue for a single publishing agent.
//!
//! Items are keyed by journal offset. Iteration always yields strictly
//! increasing offsets; gaps are expected because other agents' messages and
//! TEST messages never land in a given queue.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use pubqueue_core::Offset;

/// Thread-safe, offset-ordered item container.
///
/// Every mutating call is atomic with respect to other calls on the same
/// queue, so tail ingestion and a concurrent backfill may both write to it.
#[derive(Debug)]
pub struct OffsetQueue<T> {
    items: RwLock<BTreeMap<Offset, T>>,
}

impl<T> Default for OffsetQueue<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T> OffsetQueue<T> {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Offset, T>> {
        match self.items.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Offset queue lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Offset, T>> {
        match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Offset queue lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Insert a single item at the given offset.
    pub fn put_item(&self, offset: Offset, item: T) {
        self.write().insert(offset, item);
    }

    /// Merge every item of `other` into this queue.
    ///
    /// `other` is consumed. Entries already present keep their position;
    /// merged entries slot in by offset.
    pub fn put_items(&self, other: OffsetQueue<T>) {
        let incoming = other.into_inner();
        if incoming.is_empty() {
            return;
        }
        let mut items = self.write();
        items.extend(incoming);
    }

    /// Number of items held.
    pub fn size(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Lowest offset held, if any.
    pub fn head_offset(&self) -> Option<Offset> {
        self.read().keys().next().copied()
    }

    /// Highest offset held, if any.
    pub fn tail_offset(&self) -> Option<Offset> {
        self.read().keys().next_back().copied()
    }

    /// Consume the queue, returning the underlying map.
    pub fn into_inner(self) -> BTreeMap<Offset, T> {
        match self.items.into_inner() {
            Ok(items) => items,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<T: Clone> OffsetQueue<T> {
    /// Item stored at exactly `offset`.
    pub fn get_item(&self, offset: Offset) -> Option<T> {
        self.read().get(&offset).cloned()
    }

    /// Item with the lowest offset.
    pub fn head_item(&self) -> Option<(Offset, T)> {
        self.read()
            .iter()
            .next()
            .map(|(offset, item)| (*offset, item.clone()))
    }

    /// Up to `limit` items with offset `>= min_offset`, in offset order.
    pub fn get_items(&self, min_offset: Offset, limit: usize) -> Vec<(Offset, T)> {
        self.read()
            .range((Bound::Included(min_offset), Bound::Unbounded))
            .take(limit)
            .map(|(offset, item)| (*offset, item.clone()))
            .collect()
    }

    /// Snapshot of every held offset, in order.
    pub fn offsets(&self) -> Vec<Offset> {
        self.read().keys().copied().collect()
    }
}

impl<T> FromIterator<(Offset, T)> for OffsetQueue<T> {
    fn from_iter<I: IntoIterator<Item = (Offset, T)>>(iter: I) -> Self {
        Self {
            items: RwLock::new(iter.into_iter().collect()),
        }
    }
}
