//! Eviction Policy Module
//!
//! Victim selection for capacity-driven eviction.

use std::hash::Hash;

use dashmap::DashMap;

use crate::cache::CacheEntry;

// == Eviction Policy ==
/// Selects the entry to remove when the cache is at capacity.
///
/// The engine removes exactly one entry per invocation, chosen by the
/// policy. Implementations wanting strict recency ordering can maintain
/// their own access bookkeeping and plug in here.
pub trait EvictionPolicy<K, V>: Send + Sync {
    /// Returns the key to evict, or None when the store is empty.
    fn select_victim(&self, entries: &DashMap<K, CacheEntry<V>>) -> Option<K>;
}

// == Opportunistic Policy ==
/// Default policy: prefer entries whose value was already released.
///
/// One pass over the store. A cleared entry costs nothing to remove and
/// wins immediately; otherwise the first entry encountered in the map's
/// iteration order is chosen. That order is arbitrary, so this is
/// explicitly not a recency policy.
#[derive(Debug, Default)]
pub struct Opportunistic;

impl<K, V> EvictionPolicy<K, V> for Opportunistic
where
    K: Eq + Hash + Clone,
{
    fn select_victim(&self, entries: &DashMap<K, CacheEntry<V>>) -> Option<K> {
        let mut first_seen = None;

        for entry in entries.iter() {
            if !entry.is_live() {
                return Some(entry.key().clone());
            }
            if first_seen.is_none() {
                first_seen = Some(entry.key().clone());
            }
        }

        first_seen
    }
}
