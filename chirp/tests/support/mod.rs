#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chirp::models::{Author, Notification, NotificationKind, RepostMeta, Tweet, TweetCounts, User, UserCounts};
use chirp::{ApiClient, MemoryTokenStore, StaticNavigator, TokenStore};
use chrono::Utc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use url::Url;

pub fn author(username: &str) -> Author {
    Author {
        id: format!("u-{username}"),
        username: username.to_string(),
        name: username.to_string(),
        profile_image: None,
    }
}

pub fn tweet(id: &str, by: &str) -> Tweet {
    Tweet {
        id: id.to_string(),
        author: author(by),
        content: Some(format!("tweet {id}")),
        media: vec![],
        parent_id: None,
        counts: TweetCounts::default(),
        liked: false,
        reposted: false,
        is_repost: false,
        repost: None,
        created_at: Utc::now(),
    }
}

pub fn reply(id: &str, by: &str, parent_id: &str) -> Tweet {
    Tweet {
        parent_id: Some(parent_id.to_string()),
        ..tweet(id, by)
    }
}

pub fn repost_of(original: &Tweet, by: &str) -> Tweet {
    Tweet {
        is_repost: true,
        repost: Some(RepostMeta {
            reposted_by: author(by),
            reposted_at: Utc::now(),
        }),
        ..original.clone()
    }
}

pub fn user(username: &str, followers: i64) -> User {
    User {
        id: format!("u-{username}"),
        username: username.to_string(),
        name: username.to_string(),
        counts: UserCounts {
            followed_by: followers,
            following: 0,
            tweets: 0,
        },
        ..User::default()
    }
}

pub fn notification(id: &str, read: bool) -> Notification {
    Notification {
        id: id.to_string(),
        kind: NotificationKind::Like,
        sender: author("bob"),
        tweet: None,
        read,
        created_at: Utc::now(),
    }
}

/// Serves `router` on an ephemeral port until the sender is dropped or fired.
pub async fn spawn_server(router: axum::Router) -> (Url, oneshot::Sender<()>, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let serve = axum::serve(listener, router.into_make_service());
        let _ = serve
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
    });
    let endpoint = Url::parse(&format!("http://{addr}/api/v1/")).expect("endpoint");
    (endpoint, shutdown_tx, handle)
}

/// Client with strict timeouts that never goes through a proxy.
pub fn api_client(endpoint: Url, token: Option<&str>) -> (ApiClient, Arc<MemoryTokenStore>) {
    let tokens = Arc::new(MemoryTokenStore::new(token.map(str::to_string)));
    let store: Arc<dyn TokenStore> = tokens.clone();
    let builder = reqwest::Client::builder().timeout(Duration::from_secs(5)).no_proxy();
    let client = ApiClient::with_builder(endpoint, builder, store, Arc::new(StaticNavigator::new("/tweets/t1")))
        .expect("client");
    (client, tokens)
}
