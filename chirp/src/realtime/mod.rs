//! Live invalidation over push subscriptions.
//!
//! Frames carry a cache key and nothing else: `{"event":"invalidate","key":"tweets:list"}`.
//! The key is read as a prefix filter and every matching entry is marked
//! stale. Each domain holds its own subscription and reconnects on its
//! own, with exponential backoff after failures and immediately after the
//! access token changes.

mod transport;

pub use transport::{FrameStream, HttpPushTransport, PushTransport};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::cache::QueryCache;
use crate::config::StreamSettings;
use crate::keys::{QueryFilter, QueryKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Notifications,
    Tweets,
}

impl Domain {
    pub const ALL: [Domain; 2] = [Domain::Notifications, Domain::Tweets];

    pub const fn as_str(self) -> &'static str {
        match self {
            Domain::Notifications => "notifications",
            Domain::Tweets => "tweets",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct PushFrame {
    event: String,
    key: String,
}

/// Why a subscription ended.
enum Disconnect {
    TokenChanged,
    Lost,
    /// Token channel closed: the session owner is gone.
    Shutdown,
}

pub struct PushChannel<T> {
    transport: Arc<T>,
    cache: QueryCache,
    tokens: watch::Receiver<Option<String>>,
    settings: StreamSettings,
}

impl<T: PushTransport> PushChannel<T> {
    pub fn new(
        transport: T,
        cache: QueryCache,
        tokens: watch::Receiver<Option<String>>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            cache,
            tokens,
            settings,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs one subscription per domain until the token store is dropped.
    pub async fn run(self) {
        futures::future::join_all(Domain::ALL.map(|domain| self.run_domain(domain))).await;
    }

    async fn run_domain(&self, domain: Domain) {
        let mut tokens = self.tokens.clone();
        let mut delay = self.settings.reconnect_delay();

        loop {
            let current = tokens.borrow_and_update().clone();
            let Some(token) = current else {
                log::debug!("push {domain}: waiting for a session");
                if tokens.changed().await.is_err() {
                    return;
                }
                continue;
            };

            let disconnect = match self.transport.connect(domain, &token).await {
                Ok(frames) => {
                    log::info!("push {domain}: connected");
                    delay = self.settings.reconnect_delay();
                    self.pump(domain, frames, &mut tokens).await
                }
                Err(err) => {
                    log::warn!("push {domain}: connect failed: {err}");
                    Disconnect::Lost
                }
            };

            match disconnect {
                Disconnect::Shutdown => return,
                Disconnect::TokenChanged => {
                    log::info!("push {domain}: access token changed, reconnecting");
                    delay = self.settings.reconnect_delay();
                }
                Disconnect::Lost => {
                    log::debug!("push {domain}: reconnecting in {delay:?}");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = tokens.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                    delay = next_delay(delay, self.settings.max_reconnect_delay());
                }
            }
        }
    }

    async fn pump(
        &self,
        domain: Domain,
        mut frames: FrameStream,
        tokens: &mut watch::Receiver<Option<String>>,
    ) -> Disconnect {
        loop {
            tokio::select! {
                changed = tokens.changed() => {
                    return if changed.is_err() { Disconnect::Shutdown } else { Disconnect::TokenChanged };
                }
                frame = frames.next() => match frame {
                    Some(Ok(line)) => {
                        handle_frame(&self.cache, domain, &line);
                    }
                    Some(Err(err)) => {
                        log::warn!("push {domain}: stream error: {err}");
                        return Disconnect::Lost;
                    }
                    None => {
                        log::info!("push {domain}: closed by server");
                        return Disconnect::Lost;
                    }
                },
            }
        }
    }
}

fn next_delay(delay: Duration, max: Duration) -> Duration {
    delay.saturating_mul(2).min(max)
}

/// Applies one frame. Returns the keys it marked stale, or `None` if the frame was skipped.
pub(crate) fn handle_frame(cache: &QueryCache, domain: Domain, line: &str) -> Option<Vec<QueryKey>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let frame: PushFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(err) => {
            log::warn!("push {domain}: dropping malformed frame: {err}");
            return None;
        }
    };
    if frame.event != "invalidate" {
        log::debug!("push {domain}: ignoring '{}' event", frame.event);
        return None;
    }
    match frame.key.parse::<QueryFilter>() {
        Ok(filter) => Some(cache.invalidate_queries(&filter)),
        Err(err) => {
            log::warn!("push {domain}: dropping frame with bad key '{}': {err}", frame.key);
            None
        }
    }
}
