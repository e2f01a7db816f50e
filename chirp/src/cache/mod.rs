//! Client-side query cache.
//!
//! One entry per [`QueryKey`]. Entries hold a typed [`CacheValue`], a stale
//! flag, and the set of fetches currently in flight for the key. All state
//! sits behind a synchronous mutex that is never held across an await, so
//! a transform passed to [`QueryCache::update_queries`] is observed either
//! fully applied or not at all.
//!
//! Fetch results are written only if the fetch was not cancelled while it
//! ran. Cancelling before an optimistic write guarantees that an older
//! response can never clobber that write. A fetch that started before the
//! latest invalidation of its entry still writes, but the entry stays stale.

mod tracker;
pub mod transforms;
mod value;

pub use tracker::{MutationGuard, MutationTracker};
pub use value::{CacheValue, Cached};

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{Notify, broadcast};

use crate::errors::ApiError;
use crate::keys::{MutationKey, QueryFilter, QueryKey};
use crate::models::{Page, Pages};

const EVENT_CAPACITY: usize = 256;

/// Change notifications published by the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    /// Entry written by a fetch or a transform.
    Updated(QueryKey),
    /// Entry dropped.
    Removed(QueryKey),
    /// One invalidation pass; `keys` are the existing entries it marked stale.
    Invalidated { filter: QueryFilter, keys: Vec<QueryKey> },
}

#[derive(Default)]
struct Entry {
    value: Option<CacheValue>,
    updated_at: Option<Instant>,
    stale: bool,
    /// Fetch ids below this started before the last invalidation.
    invalidated_at: u64,
    in_flight: HashMap<u64, Arc<Notify>>,
}

impl Entry {
    fn is_fresh(&self, stale_time: Duration) -> bool {
        !self.stale && self.updated_at.is_some_and(|at| at.elapsed() < stale_time)
    }
}

struct Shared {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: broadcast::Sender<CacheEvent>,
    next_fetch: AtomicU64,
    stale_time: Duration,
    tracker: MutationTracker,
}

#[derive(Clone)]
pub struct QueryCache {
    shared: Arc<Shared>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                entries: Mutex::new(HashMap::new()),
                events,
                next_fetch: AtomicU64::new(1),
                stale_time,
                tracker: MutationTracker::default(),
            }),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.shared.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: CacheEvent) {
        // No subscribers is fine.
        let _ = self.shared.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.shared.events.subscribe()
    }

    pub fn tracker(&self) -> &MutationTracker {
        &self.shared.tracker
    }

    /// Registers one in-flight mutation of `key` that invalidates `filters` once settled.
    pub fn begin_mutation(&self, key: MutationKey, filters: Vec<QueryFilter>) -> MutationGuard {
        MutationGuard::new(self.clone(), key, filters)
    }

    pub fn is_mutating(&self, key: MutationKey) -> usize {
        self.shared.tracker.is_mutating(key)
    }

    pub fn get<T: Cached>(&self, key: &QueryKey) -> Option<T> {
        self.entries()
            .get(key)
            .and_then(|entry| entry.value.as_ref())
            .and_then(T::from_value)
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .is_none_or(|entry| !entry.is_fresh(self.shared.stale_time))
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| !entry.in_flight.is_empty())
    }

    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<QueryKey> = self
            .entries()
            .iter()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Returns the cached value when fresh; otherwise runs `fetcher` and stores its result.
    pub async fn fetch_query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        T: Cached,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        {
            let entries = self.entries();
            if let Some(entry) = entries.get(&key)
                && entry.is_fresh(self.shared.stale_time)
                && let Some(value) = entry.value.as_ref().and_then(T::from_value)
            {
                return Ok(value);
            }
        }

        let fetched = self.run_fetch(&key, fetcher()).await?;
        self.commit(&key, fetched.fetch_id, fetched.data.clone().into_value())?;
        Ok(fetched.data)
    }

    /// Fetches the page after the last cached one and appends it.
    ///
    /// With no entry, or an invalidated one, the list restarts from the first
    /// page. Returns the entry unchanged when there are no more pages.
    pub async fn fetch_next_page<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Pages<T>, ApiError>
    where
        Pages<T>: Cached,
        F: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, ApiError>>,
    {
        let current: Option<Pages<T>> = {
            let entries = self.entries();
            entries
                .get(&key)
                .filter(|entry| !entry.stale)
                .and_then(|entry| entry.value.as_ref())
                .and_then(Pages::<T>::from_value)
        };
        let cursor = match &current {
            Some(pages) => match pages.next_cursor() {
                Some(cursor) => Some(cursor.to_string()),
                None => return Ok(pages.clone()),
            },
            None => None,
        };

        let fetched = self.run_fetch(&key, fetch(cursor.clone())).await?;
        let pages = match current {
            Some(mut pages) => {
                pages.push(cursor, fetched.data);
                pages
            }
            None => Pages::first(fetched.data),
        };
        self.commit(&key, fetched.fetch_id, pages.clone().into_value())?;
        Ok(pages)
    }

    /// Fetches the first page of a list entry, reusing it while fresh.
    pub async fn fetch_first_page<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Pages<T>, ApiError>
    where
        Pages<T>: Cached,
        F: FnOnce(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>, ApiError>>,
    {
        self.fetch_query(key, || async move { Ok(Pages::first(fetch(None).await?)) })
            .await
    }

    async fn run_fetch<T, Fut>(&self, key: &QueryKey, fut: Fut) -> Result<Fetched<T>, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let fetch_id = self.shared.next_fetch.fetch_add(1, Ordering::Relaxed);
        let cancel = Arc::new(Notify::new());
        self.entries()
            .entry(key.clone())
            .or_default()
            .in_flight
            .insert(fetch_id, Arc::clone(&cancel));

        let outcome = tokio::select! {
            result = fut => result,
            _ = cancel.notified() => Err(ApiError::Cancelled),
        };

        if let Err(err) = &outcome {
            let mut entries = self.entries();
            if let Some(entry) = entries.get_mut(key) {
                entry.in_flight.remove(&fetch_id);
            }
            log::debug!("fetch {key} failed: {err}");
        }
        outcome.map(|data| Fetched { fetch_id, data })
    }

    fn commit(&self, key: &QueryKey, fetch_id: u64, value: CacheValue) -> Result<(), ApiError> {
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            // Cancelled between completion and commit.
            if entry.in_flight.remove(&fetch_id).is_none() {
                return Err(ApiError::Cancelled);
            }
            entry.value = Some(value);
            entry.updated_at = Some(Instant::now());
            entry.stale = fetch_id < entry.invalidated_at;
            if entry.stale {
                log::debug!("fetch {fetch_id} for {key} predates its invalidation");
            }
        }
        log::debug!("cache write {key}");
        self.emit(CacheEvent::Updated(key.clone()));
        Ok(())
    }

    /// Cancels every in-flight fetch for keys matching `filter`. Returns how many were cancelled.
    pub fn cancel_queries(&self, filter: &QueryFilter) -> usize {
        let mut cancelled = 0;
        let mut entries = self.entries();
        for (key, entry) in entries.iter_mut().filter(|(key, _)| filter.matches(key)) {
            if entry.in_flight.is_empty() {
                continue;
            }
            log::debug!("cancelling {} in-flight fetch(es) for {key}", entry.in_flight.len());
            for (_, cancel) in entry.in_flight.drain() {
                // Stores a permit, so a fetch that has not polled yet still sees it.
                cancel.notify_one();
                cancelled += 1;
            }
        }
        cancelled
    }

    /// Writes `value` under `key` as fresh data.
    pub fn set_query_data(&self, key: QueryKey, value: CacheValue) {
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.value = Some(value);
            entry.updated_at = Some(Instant::now());
            entry.stale = false;
        }
        self.emit(CacheEvent::Updated(key));
    }

    /// Applies `transform` to the entry under `key`, if present.
    pub fn update_query(&self, key: &QueryKey, transform: impl FnOnce(&mut CacheValue)) -> bool {
        let updated = {
            let mut entries = self.entries();
            match entries.get_mut(key).and_then(|entry| entry.value.as_mut()) {
                Some(value) => {
                    transform(value);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.emit(CacheEvent::Updated(key.clone()));
        }
        updated
    }

    /// Applies `transform` to every entry matching `filter` under a single lock.
    ///
    /// The transform reports whether it changed the entry; only changed keys
    /// are returned and announced.
    pub fn update_queries<F>(&self, filter: &QueryFilter, mut transform: F) -> Vec<QueryKey>
    where
        F: FnMut(&QueryKey, &mut CacheValue) -> bool,
    {
        let mut changed = Vec::new();
        {
            let mut entries = self.entries();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| filter.matches(key)) {
                if let Some(value) = entry.value.as_mut()
                    && transform(key, value)
                {
                    changed.push(key.clone());
                }
            }
        }
        changed.sort();
        for key in &changed {
            log::debug!("optimistic write {key}");
            self.emit(CacheEvent::Updated(key.clone()));
        }
        changed
    }

    /// Hands every entry matching `filter` to `transform` at once, under a
    /// single lock. The transform returns the keys it changed.
    pub fn update_queries_batch<F>(&self, filter: &QueryFilter, transform: F) -> Vec<QueryKey>
    where
        F: FnOnce(&mut [(&QueryKey, &mut CacheValue)]) -> Vec<QueryKey>,
    {
        let mut changed = {
            let mut entries = self.entries();
            let mut matching: Vec<(&QueryKey, &mut CacheValue)> = entries
                .iter_mut()
                .filter(|(key, _)| filter.matches(key))
                .filter_map(|(key, entry)| entry.value.as_mut().map(|value| (key, value)))
                .collect();
            transform(matching.as_mut_slice())
        };
        changed.sort();
        changed.dedup();
        for key in &changed {
            log::debug!("optimistic write {key}");
            self.emit(CacheEvent::Updated(key.clone()));
        }
        changed
    }

    /// Visits every entry matching `filter` without modifying it.
    pub fn find_map<R>(&self, filter: &QueryFilter, mut visit: impl FnMut(&QueryKey, &CacheValue) -> Option<R>) -> Option<R> {
        let entries = self.entries();
        entries
            .iter()
            .filter(|(key, _)| filter.matches(key))
            .find_map(|(key, entry)| entry.value.as_ref().and_then(|value| visit(key, value)))
    }

    pub fn remove_queries(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        let removed: Vec<QueryKey> = {
            let mut entries = self.entries();
            let keys: Vec<QueryKey> = entries.keys().filter(|key| filter.matches(key)).cloned().collect();
            for key in &keys {
                if let Some(entry) = entries.remove(key) {
                    for cancel in entry.in_flight.values() {
                        cancel.notify_one();
                    }
                }
            }
            keys
        };
        for key in &removed {
            self.emit(CacheEvent::Removed(key.clone()));
        }
        removed
    }

    /// Marks every entry matching `filter` stale so the next read refetches.
    ///
    /// Fetches already running for those entries may still write their
    /// result, but it lands stale.
    pub fn invalidate_queries(&self, filter: &QueryFilter) -> Vec<QueryKey> {
        let generation = self.shared.next_fetch.fetch_add(1, Ordering::Relaxed);
        let mut keys: Vec<QueryKey> = {
            let mut entries = self.entries();
            let mut keys = Vec::new();
            for (key, entry) in entries.iter_mut().filter(|(key, _)| filter.matches(key)) {
                entry.invalidated_at = generation;
                if entry.value.is_some() {
                    entry.stale = true;
                    keys.push(key.clone());
                }
            }
            keys
        };
        keys.sort();
        log::debug!("invalidated {filter} ({} entries)", keys.len());
        self.emit(CacheEvent::Invalidated {
            filter: filter.clone(),
            keys: keys.clone(),
        });
        keys
    }

    pub fn clear(&self) {
        let keys: Vec<QueryKey> = self.entries().keys().cloned().collect();
        for key in keys {
            self.remove_queries(&QueryFilter::from(&key));
        }
    }
}

struct Fetched<T> {
    fetch_id: u64,
    data: T,
}
