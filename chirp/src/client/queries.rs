use std::sync::Arc;

use crate::api::SocialApi;
use crate::cache::QueryCache;
use crate::errors::ApiError;
use crate::keys::QueryKey;
use crate::models::{Notification, Page, Pages, Tweet, User};

/// A paginated tweet list and the key it is cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweetList {
    Home,
    ByUser(String),
    LikedBy(String),
    Replies(String),
    Search(String),
}

impl TweetList {
    pub fn key(&self) -> QueryKey {
        match self {
            TweetList::Home => QueryKey::feed(),
            TweetList::ByUser(username) => QueryKey::user_tweets(username),
            TweetList::LikedBy(username) => QueryKey::liked_tweets(username),
            TweetList::Replies(id) => QueryKey::replies(id),
            TweetList::Search(query) => QueryKey::search_tweets(query),
        }
    }

    async fn fetch(&self, api: &dyn SocialApi, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        match self {
            TweetList::Home => api.feed(cursor).await,
            TweetList::ByUser(username) => api.user_tweets(username, cursor).await,
            TweetList::LikedBy(username) => api.liked_tweets(username, cursor).await,
            TweetList::Replies(id) => api.replies(id, cursor).await,
            TweetList::Search(query) => api.search_tweets(query, cursor).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserList {
    Search(String),
    Followers(String),
    Following(String),
}

impl UserList {
    pub fn key(&self) -> QueryKey {
        match self {
            UserList::Search(query) => QueryKey::search_users(query),
            UserList::Followers(username) => QueryKey::followers(username),
            UserList::Following(username) => QueryKey::following(username),
        }
    }

    async fn fetch(&self, api: &dyn SocialApi, cursor: Option<&str>) -> Result<Page<User>, ApiError> {
        match self {
            UserList::Search(query) => api.search_users(query, cursor).await,
            UserList::Followers(username) => api.followers(username, cursor).await,
            UserList::Following(username) => api.following(username, cursor).await,
        }
    }
}

/// Cached reads. Fresh entries are served without a request.
#[derive(Clone)]
pub struct Queries {
    api: Arc<dyn SocialApi>,
    cache: QueryCache,
}

impl Queries {
    pub fn new(api: Arc<dyn SocialApi>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.cache.fetch_query(QueryKey::me(), || self.api.me()).await
    }

    pub async fn user(&self, username: &str) -> Result<User, ApiError> {
        self.cache
            .fetch_query(QueryKey::user(username), || self.api.user(username))
            .await
    }

    pub async fn tweet(&self, id: &str) -> Result<Tweet, ApiError> {
        self.cache.fetch_query(QueryKey::tweet(id), || self.api.tweet(id)).await
    }

    pub async fn tweets(&self, list: &TweetList) -> Result<Pages<Tweet>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_first_page(list.key(), |cursor| async move { list.fetch(api, cursor.as_deref()).await })
            .await
    }

    /// Appends the next page of `list`, or returns it unchanged when exhausted.
    pub async fn more_tweets(&self, list: &TweetList) -> Result<Pages<Tweet>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_next_page(list.key(), |cursor| async move { list.fetch(api, cursor.as_deref()).await })
            .await
    }

    pub async fn users(&self, list: &UserList) -> Result<Pages<User>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_first_page(list.key(), |cursor| async move { list.fetch(api, cursor.as_deref()).await })
            .await
    }

    pub async fn more_users(&self, list: &UserList) -> Result<Pages<User>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_next_page(list.key(), |cursor| async move { list.fetch(api, cursor.as_deref()).await })
            .await
    }

    pub async fn notifications(&self) -> Result<Pages<Notification>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_first_page(QueryKey::notifications(), |cursor| async move {
                api.notifications(cursor.as_deref()).await
            })
            .await
    }

    pub async fn more_notifications(&self) -> Result<Pages<Notification>, ApiError> {
        let api = self.api.as_ref();
        self.cache
            .fetch_next_page(QueryKey::notifications(), |cursor| async move {
                api.notifications(cursor.as_deref()).await
            })
            .await
    }

    pub async fn unread_count(&self) -> Result<u64, ApiError> {
        self.cache
            .fetch_query(QueryKey::unread_notifications(), || self.api.unread_count())
            .await
    }
}
