//! Cache Store Module
//!
//! The cache façade: concurrent keyed storage with bounded capacity,
//! per-entry TTL expiration, and host-driven value release.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::cache::{
    CacheEntry, CacheStats, CacheStatsSnapshot, EvictionPolicy, Opportunistic, ValueCell,
};
use crate::error::{CacheError, Result};
use crate::scheduler::{ExpirationHandle, ExpirationScheduler};

// == TTL Cache ==
/// Thread-safe key/value cache with bounded capacity and per-entry TTL.
///
/// All operations take `&self`; share an instance across threads with
/// `Arc`. Reads and writes lock only the touched shard of the underlying
/// map, so independent keys proceed in parallel.
///
/// Expirations run on a shared [`ExpirationScheduler`]. An instance built
/// with [`new`](Self::new) registers its expirations with the process-wide
/// scheduler; [`with_scheduler`](Self::with_scheduler) injects an explicit
/// one instead.
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    inner: Arc<CacheInner<K, V>>,
}

/// Shared state behind the façade. Expiration callbacks hold a weak
/// reference to this, so a dropped cache silently invalidates its pending
/// callbacks.
struct CacheInner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Maximum number of live entries
    capacity: usize,
    /// Key-value storage; each entry co-locates the value cell and its
    /// pending expiration
    entries: DashMap<K, CacheEntry<V>>,
    /// Count of entries whose value still resolves
    live: AtomicUsize,
    /// Install stamp source; see [`CacheEntry::generation`]
    generation: AtomicU64,
    /// Shared timer facility, borrowed never owned
    scheduler: ExpirationScheduler,
    /// Victim selection under capacity pressure
    policy: Box<dyn EvictionPolicy<K, V>>,
    /// Performance counters
    stats: CacheStats,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache using the process-wide expiration scheduler.
    ///
    /// # Errors
    /// Returns `InvalidCapacity` when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_scheduler(capacity, ExpirationScheduler::global())
    }

    /// Creates a cache with an explicitly injected scheduler.
    pub fn with_scheduler(capacity: usize, scheduler: ExpirationScheduler) -> Result<Self> {
        Self::with_policy(capacity, scheduler, Box::new(Opportunistic))
    }

    /// Creates a cache with an explicit scheduler and eviction policy.
    pub fn with_policy(
        capacity: usize,
        scheduler: ExpirationScheduler,
        policy: Box<dyn EvictionPolicy<K, V>>,
    ) -> Result<Self> {
        if capacity < 1 {
            return Err(CacheError::InvalidCapacity(capacity));
        }
        Ok(Self {
            inner: Arc::new(CacheInner {
                capacity,
                entries: DashMap::new(),
                live: AtomicUsize::new(0),
                generation: AtomicU64::new(0),
                scheduler,
                policy,
                stats: CacheStats::new(),
            }),
        })
    }

    // == Insert ==
    /// Stores a key-value pair without expiration.
    ///
    /// Overwriting an existing key replaces the value and cancels any
    /// expiration still scheduled for it. When the cache is at capacity and
    /// the key is new, one entry is evicted first.
    pub fn insert(&self, key: K, value: V) {
        // Cannot fail: no expiration is scheduled on this path.
        let _ = self.install(key, value, None);
    }

    // == Insert With TTL ==
    /// Stores a key-value pair that expires after `ttl`.
    ///
    /// Any expiration previously scheduled for the key is cancelled before
    /// the new one is installed. A zero `ttl` is legal and expires on the
    /// scheduler's next tick, not never.
    ///
    /// # Errors
    /// Returns `SchedulerStopped` if the scheduler has been shut down; the
    /// cache is left unchanged in that case.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<()> {
        self.install(key, value, Some(ttl))
    }

    // == Get ==
    /// Retrieves a clone of the value for `key`.
    ///
    /// Returns `None` for a missing key, and also for a key whose value was
    /// released: that entry is dropped on observation and the live count
    /// adjusted, which is normal housekeeping rather than an error.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        if let Some(entry) = self.inner.entries.get(key) {
            if let Some(value) = entry.cell.resolve() {
                let value = value.clone();
                self.inner.stats.record_hit();
                return Some(value);
            }
            // Released value: drop the remnant entry outside the read guard
            drop(entry);
            self.inner.drop_cleared(key);
        }
        self.inner.stats.record_miss();
        None
    }

    // == Contains Key ==
    /// Returns true if `key` maps to a live value.
    ///
    /// Shares the release-detection semantics of [`get`](Self::get) without
    /// exposing the value.
    pub fn contains_key(&self, key: &K) -> bool {
        if let Some(entry) = self.inner.entries.get(key) {
            if entry.cell.is_present() {
                return true;
            }
            drop(entry);
            self.inner.drop_cleared(key);
        }
        false
    }

    // == Remove ==
    /// Removes the entry for `key`, cancelling its pending expiration.
    ///
    /// Idempotent: removing a missing key is a no-op.
    pub fn remove(&self, key: &K) {
        if let Some((_, mut entry)) = self.inner.entries.remove(key) {
            entry.cancel_expiration();
            if entry.cell.is_present() {
                self.inner.live.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    // == Release ==
    /// Releases the value for `key` while keeping the entry.
    ///
    /// This is the hook for host-driven memory reclamation: the key stays
    /// mapped to a cleared cell until the next read, containment check, or
    /// eviction scan drops it. Returns true if a live value was released.
    pub fn release(&self, key: &K) -> bool {
        if let Some(mut entry) = self.inner.entries.get_mut(key) {
            if entry.cell.clear() {
                self.inner.live.fetch_sub(1, Ordering::AcqRel);
                return true;
            }
        }
        false
    }

    // == Release Where ==
    /// Releases every live value matching `predicate`.
    ///
    /// Bulk form of [`release`](Self::release) for pressure-triggered
    /// sweeps. The predicate runs under the store's shard locks and must
    /// not call back into the cache. Returns the number of values released.
    pub fn release_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&K, &V) -> bool,
    {
        let mut released = 0;
        for mut entry in self.inner.entries.iter_mut() {
            let matches = entry
                .cell
                .resolve()
                .is_some_and(|value| predicate(entry.key(), value));
            if matches && entry.cell.clear() {
                self.inner.live.fetch_sub(1, Ordering::AcqRel);
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "released values under memory pressure");
        }
        released
    }

    // == Time To Live ==
    /// Returns the remaining time before `key` expires.
    ///
    /// `None` for a missing key, a released value, or an entry stored
    /// without TTL.
    pub fn ttl_remaining(&self, key: &K) -> Option<Duration> {
        let entry = self.inner.entries.get(key)?;
        if entry.cell.is_cleared() {
            return None;
        }
        entry.ttl_remaining()
    }

    // == Length ==
    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    // == Is Empty ==
    /// Returns true if the cache holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // == Capacity ==
    /// Returns the fixed capacity the cache was created with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    // == Clear ==
    /// Removes all entries and cancels every pending expiration of this
    /// instance.
    pub fn clear(&self) {
        let keys: Vec<K> = self
            .inner
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for key in &keys {
            self.remove(key);
        }
        debug!(removed = keys.len(), "cache cleared");
    }

    // == Stats ==
    /// Returns a snapshot of the performance counters.
    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.stats.snapshot(self.len())
    }

    // == Install ==
    /// Writes a value for `key`, optionally scheduling its expiration.
    ///
    /// The entry mutation and the expiration bookkeeping happen under one
    /// shard lock, so concurrent readers of the key observe either the old
    /// complete state or the new complete state. A scheduling failure
    /// surfaces before anything is mutated.
    fn install(&self, key: K, value: V, ttl: Option<Duration>) -> Result<()> {
        let inner = &self.inner;

        let is_new = !inner.entries.contains_key(&key);
        if is_new && inner.live.load(Ordering::Acquire) >= inner.capacity {
            inner.evict_one();
        }

        let generation = inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let pending = ttl.map(|delay| (key.clone(), delay));

        match inner.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                let scheduled = match pending {
                    Some((callback_key, delay)) => {
                        Some(self.schedule_expiration(callback_key, generation, delay)?)
                    }
                    None => None,
                };

                let entry = occupied.get_mut();
                let was_live = entry.cell.is_present();
                entry.cancel_expiration();
                entry.cell = ValueCell::Present(value);
                entry.generation = generation;
                if let Some((handle, deadline)) = scheduled {
                    entry.expiration = Some(handle);
                    entry.deadline = deadline;
                }
                if !was_live {
                    inner.live.fetch_add(1, Ordering::AcqRel);
                }
            }
            Entry::Vacant(vacant) => {
                let scheduled = match pending {
                    Some((callback_key, delay)) => {
                        Some(self.schedule_expiration(callback_key, generation, delay)?)
                    }
                    None => None,
                };

                let mut entry = CacheEntry::new(value, generation);
                if let Some((handle, deadline)) = scheduled {
                    entry.expiration = Some(handle);
                    entry.deadline = deadline;
                }
                vacant.insert(entry);
                inner.live.fetch_add(1, Ordering::AcqRel);
            }
        }

        inner.enforce_capacity();
        Ok(())
    }

    // == Schedule Expiration ==
    /// Registers the delayed removal of `key` with the shared scheduler.
    ///
    /// The callback holds only a weak reference to the cache, so pending
    /// expirations die with their instance. It captures the install stamp
    /// and only removes the entry while the stamp still matches, so a stale
    /// callback that outlives a cancellation race cannot delete a newer
    /// value.
    fn schedule_expiration(
        &self,
        key: K,
        generation: u64,
        delay: Duration,
    ) -> Result<(ExpirationHandle, Option<Instant>)> {
        let deadline = Instant::now().checked_add(delay);
        let cache = Arc::downgrade(&self.inner);
        let handle = self
            .inner
            .scheduler
            .schedule(delay, move || {
                if let Some(cache) = cache.upgrade() {
                    cache.expire(&key, generation);
                }
            })
            .ok_or(CacheError::SchedulerStopped)?;
        Ok((handle, deadline))
    }
}

impl<K, V> CacheInner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Expire ==
    /// Removes `key` if its install stamp still matches `generation`.
    fn expire(&self, key: &K, generation: u64) {
        let removed = self
            .entries
            .remove_if(key, |_, entry| entry.generation == generation);
        if let Some((_, entry)) = removed {
            if entry.cell.is_present() {
                self.live.fetch_sub(1, Ordering::AcqRel);
            }
            self.stats.record_expiration();
            trace!("entry expired");
        }
    }

    // == Drop Cleared ==
    /// Drops the remnant entry for a released value, if still cleared.
    ///
    /// The conditional removal guards against a concurrent overwrite that
    /// re-animated the key between our observation and this cleanup.
    fn drop_cleared(&self, key: &K) {
        let removed = self.entries.remove_if(key, |_, entry| entry.cell.is_cleared());
        if let Some((_, mut entry)) = removed {
            entry.cancel_expiration();
            trace!("dropped remnant of released value");
        }
    }

    // == Evict One ==
    /// Removes the policy's victim.
    ///
    /// Selecting and removing are two steps, so a concurrent removal of the
    /// chosen victim can win in between; that attempt frees nothing here
    /// and the caller re-checks its capacity condition.
    fn evict_one(&self) {
        let Some(victim) = self.policy.select_victim(&self.entries) else {
            return;
        };
        let Some((_, mut entry)) = self.entries.remove(&victim) else {
            return;
        };
        entry.cancel_expiration();
        if entry.cell.is_present() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
        self.stats.record_eviction();
        debug!("evicted entry under capacity pressure");
    }

    // == Enforce Capacity ==
    /// Re-checks the capacity bound after an insert.
    ///
    /// Racing inserts can each pass the pre-insert check and transiently
    /// overshoot; every racer repairs the bound here before returning, so
    /// the live count never exceeds capacity at a call boundary. An
    /// eviction attempt that loses its victim to a concurrent removal
    /// selects again rather than giving up.
    fn enforce_capacity(&self) {
        while self.live.load(Ordering::Acquire) > self.capacity {
            if self.entries.is_empty() {
                break;
            }
            self.evict_one();
        }
    }
}
