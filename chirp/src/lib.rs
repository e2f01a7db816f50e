//! chirp: client library for a Twitter-like social network.
//!
//! - [`api`]: token-authenticated HTTP calls with single-flight refresh
//! - [`cache`]: keyed query cache with cancellation and invalidation
//! - [`mutations`]: optimistic writes settled by batched invalidation
//! - [`realtime`]: push subscriptions that invalidate cache keys

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod errors;
pub mod id;
pub mod keys;
pub mod models;
pub mod mutations;
pub mod realtime;
pub mod validators;

pub use api::{ApiClient, MemoryTokenStore, MutationApi, Navigator, RequestConfig, SocialApi, StaticNavigator, TokenStore};
pub use cache::{CacheEvent, CacheValue, QueryCache};
pub use client::{Chirp, Queries, TweetList, UserList};
pub use config::ChirpConfig;
pub use errors::{ApiError, ConfigError, ValidationError, ValidationIssue};
pub use keys::{MutationKey, QueryFilter, QueryKey, Resource, Scope};
pub use mutations::Mutations;
pub use realtime::{Domain, HttpPushTransport, PushChannel, PushTransport};
