use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chirp::cache::CacheValue;
use chirp::config::StreamSettings;
use chirp::realtime::FrameStream;
use chirp::{ApiError, CacheEvent, Domain, MemoryTokenStore, PushChannel, PushTransport, QueryCache, QueryKey, TokenStore};
use futures::StreamExt;
use futures::channel::mpsc;

type FrameSender = mpsc::UnboundedSender<Result<String, ApiError>>;

#[derive(Default)]
struct TransportState {
    connects: Mutex<Vec<(Domain, String)>>,
    senders: Mutex<HashMap<Domain, FrameSender>>,
    failures_left: AtomicUsize,
}

/// In-memory subscriptions; the test side pushes frames through the stored senders.
#[derive(Clone, Default)]
struct FakeTransport {
    state: Arc<TransportState>,
}

impl FakeTransport {
    fn failing_first(failures: usize) -> Self {
        let transport = Self::default();
        transport.state.failures_left.store(failures, Ordering::SeqCst);
        transport
    }

    fn connects(&self) -> Vec<(Domain, String)> {
        self.state.connects.lock().unwrap().clone()
    }

    fn push(&self, domain: Domain, frame: &str) {
        let senders = self.state.senders.lock().unwrap();
        senders[&domain].unbounded_send(Ok(frame.to_string())).unwrap();
    }

    fn hang_up(&self, domain: Domain) {
        self.state.senders.lock().unwrap().remove(&domain);
    }
}

#[async_trait]
impl PushTransport for FakeTransport {
    async fn connect(&self, domain: Domain, token: &str) -> Result<FrameStream, ApiError> {
        self.state.connects.lock().unwrap().push((domain, token.to_string()));
        let failed = self
            .state
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ApiError::Server {
                status: 502,
                message: "bad gateway".into(),
            });
        }
        let (tx, rx) = mpsc::unbounded();
        self.state.senders.lock().unwrap().insert(domain, tx);
        Ok(rx.boxed())
    }
}

fn settings() -> StreamSettings {
    StreamSettings {
        reconnect_delay_ms: 10,
        max_reconnect_delay_ms: 40,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn start(token: Option<&str>, transport: FakeTransport) -> (QueryCache, Arc<MemoryTokenStore>, tokio::task::JoinHandle<()>) {
    let cache = QueryCache::default();
    let tokens = Arc::new(MemoryTokenStore::new(token.map(str::to_string)));
    let channel = PushChannel::new(transport, cache.clone(), tokens.subscribe(), settings());
    (cache, tokens, channel.spawn())
}

#[tokio::test]
async fn invalidate_frame_marks_matching_entries_stale() {
    let transport = FakeTransport::default();
    let (cache, _tokens, _task) = start(Some("t0"), transport.clone());
    cache.set_query_data(QueryKey::feed(), CacheValue::Count(0));
    cache.set_query_data(QueryKey::user_tweets("bob"), CacheValue::Count(0));
    cache.set_query_data(QueryKey::unread_notifications(), CacheValue::Count(3));
    let mut events = cache.subscribe();

    eventually(|| transport.connects().len() == 2).await;
    transport.push(Domain::Tweets, r#"{"event":"invalidate","key":"tweets:list:username=bob"}"#);

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    let CacheEvent::Invalidated { keys, .. } = event else {
        panic!("unexpected event {event:?}");
    };
    assert_eq!(keys, vec![QueryKey::user_tweets("bob")]);
    assert!(cache.is_stale(&QueryKey::user_tweets("bob")));
    assert!(!cache.is_stale(&QueryKey::feed()));
    assert!(!cache.is_stale(&QueryKey::unread_notifications()));
}

#[tokio::test]
async fn bad_frames_do_not_break_the_subscription() {
    let transport = FakeTransport::default();
    let (cache, _tokens, _task) = start(Some("t0"), transport.clone());
    cache.set_query_data(QueryKey::unread_notifications(), CacheValue::Count(3));

    eventually(|| transport.connects().len() == 2).await;
    transport.push(Domain::Notifications, "{not json");
    transport.push(Domain::Notifications, r#"{"event":"invalidate","key":"nowhere:list"}"#);
    transport.push(Domain::Notifications, r#"{"event":"invalidate","key":"notifications:unread"}"#);

    eventually(|| cache.is_stale(&QueryKey::unread_notifications())).await;
    assert_eq!(transport.connects().len(), 2);
}

#[tokio::test]
async fn reconnects_with_the_new_token() {
    let transport = FakeTransport::default();
    let (_cache, tokens, _task) = start(Some("t0"), transport.clone());

    eventually(|| transport.connects().len() == 2).await;
    tokens.set_access_token("t1".into());
    eventually(|| transport.connects().len() == 4).await;

    let connects = transport.connects();
    assert!(connects[..2].iter().all(|(_, token)| token == "t0"));
    assert!(connects[2..].iter().all(|(_, token)| token == "t1"));
    let mut domains: Vec<&str> = connects[2..].iter().map(|(domain, _)| domain.as_str()).collect();
    domains.sort();
    assert_eq!(domains, vec!["notifications", "tweets"]);
}

#[tokio::test]
async fn waits_for_a_session_before_connecting() {
    let transport = FakeTransport::default();
    let (_cache, tokens, _task) = start(None, transport.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(transport.connects().is_empty());

    tokens.set_access_token("t0".into());
    eventually(|| transport.connects().len() == 2).await;
}

#[tokio::test]
async fn retries_after_failures_and_lost_streams() {
    let transport = FakeTransport::failing_first(3);
    let (_cache, _tokens, _task) = start(Some("t0"), transport.clone());

    // Two domains, three failed attempts between them, then both connect.
    eventually(|| transport.state.senders.lock().unwrap().len() == 2).await;
    assert_eq!(transport.connects().len(), 5);

    transport.hang_up(Domain::Tweets);
    eventually(|| transport.connects().len() == 6).await;
    assert_eq!(transport.connects()[5], (Domain::Tweets, "t0".to_string()));
}

#[tokio::test]
async fn stops_when_the_token_store_is_dropped() {
    let transport = FakeTransport::default();
    let (_cache, tokens, task) = start(Some("t0"), transport.clone());
    eventually(|| transport.connects().len() == 2).await;

    drop(tokens);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("push channel did not stop")
        .unwrap();
}
