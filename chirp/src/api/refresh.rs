//! Single-flight access-token refresh.
//!
//! The slot is `IDLE` when empty and `REFRESHING` while it holds a shared
//! future. Every caller that needs a refresh during `REFRESHING` awaits the
//! same future; the future stores the new token and empties the slot before
//! resolving, so all waiters wake to `IDLE` together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFailure {
    pub status: Option<u16>,
    pub message: String,
}

pub(crate) type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

#[derive(Default)]
pub(crate) struct RefreshSlot {
    inflight: Mutex<Option<(u64, RefreshFuture)>>,
    started: AtomicU64,
}

impl RefreshSlot {
    fn slot(&self) -> MutexGuard<'_, Option<(u64, RefreshFuture)>> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn in_flight(&self) -> Option<RefreshFuture> {
        self.slot().as_ref().map(|(_, fut)| fut.clone())
    }

    pub(crate) fn is_refreshing(&self) -> bool {
        self.slot().is_some()
    }

    /// Number of refreshes started over the lifetime of the slot.
    pub(crate) fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }

    /// Joins the running refresh, or starts `refresh` if the slot is idle.
    pub(crate) fn join_or_start<F>(self: &Arc<Self>, refresh: F) -> RefreshFuture
    where
        F: FnOnce() -> BoxFuture<'static, Result<String, RefreshFailure>>,
    {
        let mut slot = self.slot();
        if let Some((_, fut)) = slot.as_ref() {
            return fut.clone();
        }

        let generation = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let inner = refresh();
        let this = Arc::clone(self);
        let fut = async move {
            let outcome = inner.await;
            this.finish(generation);
            outcome
        }
        .boxed()
        .shared();
        *slot = Some((generation, fut.clone()));
        fut
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|(current, _)| *current == generation) {
            *slot = None;
        }
    }
}
