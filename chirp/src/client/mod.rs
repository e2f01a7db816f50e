//! Entry point tying the API client, cache, mutations and push channel together.
//!
//! # Example
//! ```ignore
//! let config = ChirpConfig::load(&ChirpConfig::locate(None))?;
//! let chirp = Chirp::new(&config, Arc::new(MemoryTokenStore::default()), Arc::new(StaticNavigator::new("/")))?;
//!
//! chirp.login(&Credentials { email, password }).await?;
//! let feed = chirp.queries().tweets(&TweetList::Home).await?;
//! chirp.mutations().toggle_like(&feed.pages[0].items[0].id).await?;
//! ```

mod queries;

pub use queries::{Queries, TweetList, UserList};

use std::sync::Arc;

use crate::api::{ApiClient, Navigator, SocialApi, TokenStore};
use crate::cache::QueryCache;
use crate::config::{ChirpConfig, StreamSettings};
use crate::errors::ApiError;
use crate::models::{Credentials, SignupForm, User};
use crate::mutations::Mutations;
use crate::realtime::{HttpPushTransport, PushChannel, PushTransport};
use crate::validators::validate_signup;

#[derive(Clone)]
pub struct Chirp {
    api: ApiClient,
    cache: QueryCache,
    queries: Queries,
    mutations: Mutations,
    stream: StreamSettings,
}

impl Chirp {
    pub fn new(
        config: &ChirpConfig,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let api = ApiClient::new(config.api.endpoint()?, config.api.timeout(), tokens, navigator)?;
        let cache = QueryCache::new(config.cache.stale_time());
        Ok(Self::with_parts(api, cache, config.stream.clone()))
    }

    pub fn with_parts(api: ApiClient, cache: QueryCache, stream: StreamSettings) -> Self {
        let shared = Arc::new(api.clone());
        Self {
            queries: Queries::new(shared.clone(), cache.clone()),
            mutations: Mutations::new(shared, cache.clone()),
            api,
            cache,
            stream,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub fn mutations(&self) -> &Mutations {
        &self.mutations
    }

    /// Logs in and returns the viewer. Cached data from a previous session is dropped.
    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        self.api.login(credentials).await?;
        self.cache.clear();
        self.queries.me().await
    }

    pub async fn signup(&self, form: &SignupForm) -> Result<User, ApiError> {
        validate_signup(form)?;
        self.api.signup(form).await?;
        self.cache.clear();
        self.queries.me().await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let outcome = self.api.logout().await;
        self.cache.clear();
        outcome
    }

    /// Push channel over `transport`, invalidating this client's cache.
    pub fn push_channel<T: PushTransport>(&self, transport: T) -> PushChannel<T> {
        PushChannel::new(
            transport,
            self.cache.clone(),
            self.api.tokens().subscribe(),
            self.stream.clone(),
        )
    }

    /// Push channel streaming from this client's API host.
    pub fn http_push_channel(&self) -> Result<PushChannel<HttpPushTransport>, ApiError> {
        Ok(self.push_channel(HttpPushTransport::new(self.api.endpoint().clone())?))
    }
}
