//! In-flight mutation counting.
//!
//! Every mutation of a given [`MutationKey`] holds a guard while it runs.
//! Settling a guard queues the filters it wants invalidated; the filters
//! are flushed only when the last guard of that key settles, so a burst of
//! rapid toggles triggers a single invalidation pass.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::keys::{MutationKey, QueryFilter};

use super::QueryCache;

#[derive(Default)]
struct Slot {
    in_flight: usize,
    pending: Vec<QueryFilter>,
}

#[derive(Clone, Default)]
pub struct MutationTracker {
    slots: Arc<Mutex<HashMap<MutationKey, Slot>>>,
}

impl MutationTracker {
    fn slots(&self) -> MutexGuard<'_, HashMap<MutationKey, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of mutations of `key` currently in flight.
    pub fn is_mutating(&self, key: MutationKey) -> usize {
        self.slots().get(&key).map_or(0, |slot| slot.in_flight)
    }

    pub(super) fn enter(&self, key: MutationKey) {
        self.slots().entry(key).or_default().in_flight += 1;
    }

    /// Decrements the counter and returns the filters to flush when it reaches zero.
    pub(super) fn leave(&self, key: MutationKey, filters: Vec<QueryFilter>) -> Option<Vec<QueryFilter>> {
        let mut slots = self.slots();
        let slot = slots.entry(key).or_default();
        for filter in filters {
            if !slot.pending.contains(&filter) {
                slot.pending.push(filter);
            }
        }
        slot.in_flight = slot.in_flight.saturating_sub(1);
        if slot.in_flight > 0 {
            return None;
        }
        slots.remove(&key).map(|slot| slot.pending)
    }
}

/// Held by one running mutation. Dropping it unsettled still queues its filters.
pub struct MutationGuard {
    cache: QueryCache,
    key: MutationKey,
    filters: Vec<QueryFilter>,
    settled: bool,
}

impl MutationGuard {
    pub(super) fn new(cache: QueryCache, key: MutationKey, filters: Vec<QueryFilter>) -> Self {
        cache.tracker().enter(key);
        Self {
            cache,
            key,
            filters,
            settled: false,
        }
    }

    pub fn key(&self) -> MutationKey {
        self.key
    }

    /// Queues this mutation's filters and invalidates everything queued if it
    /// was the last mutation of its key. Returns whether the invalidation pass ran.
    pub fn settle(mut self) -> bool {
        self.settled = true;
        self.flush()
    }

    fn flush(&mut self) -> bool {
        let filters = std::mem::take(&mut self.filters);
        match self.cache.tracker().leave(self.key, filters) {
            Some(pending) => {
                log::debug!(
                    "mutation key {} settled, invalidating {} filter(s)",
                    self.key.as_str(),
                    pending.len()
                );
                for filter in &pending {
                    self.cache.invalidate_queries(filter);
                }
                true
            }
            None => false,
        }
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if !self.settled {
            log::debug!("mutation key {} dropped before settling", self.key.as_str());
            self.flush();
        }
    }
}
