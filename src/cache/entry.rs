//! Cache Entry Module
//!
//! Defines the per-key entry: a two-state value holder plus the bookkeeping
//! for a pending expiration.

use std::time::{Duration, Instant};

use crate::scheduler::ExpirationHandle;

// == Value Cell ==
/// Two-state holder for a cached value.
///
/// A cell starts as `Present` and can transition to `Cleared` when the host
/// releases the value under memory pressure (see the `release*` operations
/// on the cache). A cleared cell keeps its key in the store until the next
/// observation removes it.
#[derive(Debug)]
pub enum ValueCell<V> {
    /// The value is live and resolvable.
    Present(V),
    /// The value was released; the key remains until lazily cleaned up.
    Cleared,
}

impl<V> ValueCell<V> {
    /// Returns the value if it is still live.
    pub fn resolve(&self) -> Option<&V> {
        match self {
            ValueCell::Present(value) => Some(value),
            ValueCell::Cleared => None,
        }
    }

    /// Returns true if the value is still live.
    pub fn is_present(&self) -> bool {
        matches!(self, ValueCell::Present(_))
    }

    /// Returns true if the value was released.
    pub fn is_cleared(&self) -> bool {
        matches!(self, ValueCell::Cleared)
    }

    /// Releases the value, keeping the key.
    ///
    /// Returns true if the cell held a live value before the call.
    pub fn clear(&mut self) -> bool {
        let was_present = self.is_present();
        *self = ValueCell::Cleared;
        was_present
    }
}

// == Cache Entry ==
/// A single cache entry.
///
/// The value cell, the pending expiration handle, and the generation stamp
/// live in one object so that install, cancel, and remove are single
/// transitions under the store's per-shard lock.
#[derive(Debug)]
pub struct CacheEntry<V> {
    /// The stored value (or its cleared remnant)
    pub(crate) cell: ValueCell<V>,
    /// Pending expiration callback, at most one per key
    pub(crate) expiration: Option<ExpirationHandle>,
    /// When the pending expiration is due, None for entries without TTL
    pub(crate) deadline: Option<Instant>,
    /// Install stamp; an expiration callback only removes the entry while
    /// the stamp it captured still matches
    pub(crate) generation: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a live entry with no expiration scheduled.
    pub fn new(value: V, generation: u64) -> Self {
        Self {
            cell: ValueCell::Present(value),
            expiration: None,
            deadline: None,
            generation,
        }
    }

    // == Is Live ==
    /// Returns true if the entry still holds a live value.
    pub fn is_live(&self) -> bool {
        self.cell.is_present()
    }

    // == Cancel Expiration ==
    /// Cancels and forgets the pending expiration, if any.
    pub fn cancel_expiration(&mut self) {
        if let Some(handle) = self.expiration.take() {
            handle.cancel();
        }
        self.deadline = None;
    }

    // == Time To Live ==
    /// Returns the remaining time before the scheduled expiration.
    ///
    /// # Returns
    /// - `Some(Duration::ZERO)` if the deadline has already passed
    /// - `Some(remaining)` if an expiration is scheduled
    /// - `None` if the entry has no TTL
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
