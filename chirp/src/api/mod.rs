//! Token-authenticated HTTP layer.
//!
//! [`ApiClient::call_api`] attaches the bearer token for authenticated
//! calls and recovers from an expired token by trading the refresh cookie
//! for a new one, shared by every caller that hit the 401 at the same time.

mod endpoints;
mod refresh;
mod token;

pub use endpoints::{MutationApi, SocialApi};
pub use refresh::RefreshFailure;
pub use token::{MemoryTokenStore, Navigator, StaticNavigator, TokenStore, login_path};

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::ApiError;
use crate::id::generate_request_id;
use crate::models::AuthToken;

use refresh::RefreshSlot;

const REQUEST_ID_HEADER: &str = "x-request-id";
const REFRESH_RESOURCE: &str = "auth/refresh";

/// One field of a multipart body. Kept as owned data so a retried request can rebuild the form.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        mime: String,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                mime: mime.into(),
                bytes,
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

/// How a single call is issued.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub method: Method,
    /// Attach the bearer token and take part in refresh.
    pub is_auth: bool,
    pub body: RequestBody,
    pub query: Vec<(String, String)>,
}

impl RequestConfig {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            is_auth: true,
            body: RequestBody::Empty,
            query: Vec::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn patch() -> Self {
        Self::new(Method::PATCH)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Issue without credentials.
    pub fn anonymous(mut self) -> Self {
        self.is_auth = false;
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|err| ApiError::InvalidRequest {
            message: format!("unserializable body: {err}"),
        })?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Adds `cursor` when paging past the first page.
    pub fn cursor(self, cursor: Option<&str>) -> Self {
        match cursor {
            Some(cursor) => self.query("cursor", cursor),
            None => self,
        }
    }
}

struct Inner {
    http: reqwest::Client,
    endpoint: Url,
    jar: Arc<Jar>,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    refresh: Arc<RefreshSlot>,
}

#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// `endpoint` is the versioned API root, e.g. `https://host/api/v1/`.
    pub fn new(
        endpoint: Url,
        timeout: Duration,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        Self::with_builder(endpoint, reqwest::Client::builder().timeout(timeout), tokens, navigator)
    }

    /// Like [`ApiClient::new`] with caller-supplied transport settings. The cookie jar is always installed.
    pub fn with_builder(
        endpoint: Url,
        builder: reqwest::ClientBuilder,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let http = builder.cookie_provider(Arc::clone(&jar)).build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                endpoint,
                jar,
                tokens,
                navigator,
                refresh: Arc::new(RefreshSlot::default()),
            }),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// Refreshes started by this client so far.
    pub fn refresh_attempts(&self) -> u64 {
        self.inner.refresh.started()
    }

    pub(crate) fn url(&self, resource: &str) -> Result<Url, ApiError> {
        self.inner
            .endpoint
            .join(resource.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidRequest {
                message: format!("bad resource '{resource}': {err}"),
            })
    }

    /// Performs one call, returning the raw success response or a typed error.
    pub async fn call_api(&self, resource: &str, config: RequestConfig) -> Result<Response, ApiError> {
        let url = self.url(resource)?;
        let request_id = generate_request_id();

        if !config.is_auth {
            let response = self.send(&url, &config, None, &request_id).await?;
            return self.check(resource, response).await;
        }

        let token = self.current_token().await?;
        let response = self.send(&url, &config, Some(&token), &request_id).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return self.check(resource, response).await;
        }

        log::debug!("{resource} [{request_id}] rejected the access token");
        let retry_token = match self.inner.tokens.access_token() {
            // Another caller refreshed while this request was in flight.
            Some(current) if current != token => current,
            Some(_) => self.refresh_token().await?,
            None => return Err(ApiError::auth("session ended")),
        };

        let response = self.send(&url, &config, Some(&retry_token), &request_id).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.inner.tokens.clear();
            log::warn!("{resource} [{request_id}] rejected a refreshed token");
            return Err(ApiError::auth("access token rejected after refresh"));
        }
        self.check(resource, response).await
    }

    /// Calls `resource` and decodes a JSON success body.
    pub async fn fetch_json<T: DeserializeOwned>(&self, resource: &str, config: RequestConfig) -> Result<T, ApiError> {
        let response = self.call_api(resource, config).await?;
        decode(resource, response).await
    }

    /// Token to authenticate with, waiting out any refresh in flight.
    async fn current_token(&self) -> Result<String, ApiError> {
        if let Some(refresh) = self.inner.refresh.in_flight() {
            // The outcome lands in the token store either way.
            let _ = refresh.await;
        }
        self.inner.tokens.access_token().ok_or_else(|| ApiError::Redirect {
            redirect_to: self.inner.navigator.current_location(),
        })
    }

    async fn refresh_token(&self) -> Result<String, ApiError> {
        let http = self.inner.http.clone();
        let url = self.url(REFRESH_RESOURCE)?;
        let tokens = Arc::clone(&self.inner.tokens);
        let refresh = self
            .inner
            .refresh
            .join_or_start(move || refresh_session(http, url, tokens).boxed());

        match refresh.await {
            Ok(token) => Ok(token),
            Err(failure) => {
                self.inner.tokens.clear();
                log::warn!("token refresh failed: {}", failure.message);
                Err(ApiError::auth(failure.message))
            }
        }
    }

    async fn send(
        &self,
        url: &Url,
        config: &RequestConfig,
        token: Option<&str>,
        request_id: &str,
    ) -> Result<Response, ApiError> {
        let mut request = self
            .inner
            .http
            .request(config.method.clone(), url.clone())
            .header(REQUEST_ID_HEADER, request_id);
        if !config.query.is_empty() {
            request = request.query(&config.query);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request = match &config.body {
            RequestBody::Empty => request,
            RequestBody::Json(value) => request.json(value),
            RequestBody::Multipart(parts) => request.multipart(build_form(parts)?),
        };
        Ok(request.send().await?)
    }

    async fn check(&self, resource: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_status(status.as_u16(), resource, &body);
        if err.is_operational() {
            log::warn!("{resource}: {err}");
        } else {
            log::debug!("{resource}: {err}");
        }
        Err(err)
    }

    /// Stores a freshly issued access token.
    pub(crate) fn accept_token(&self, token: AuthToken) {
        self.inner.tokens.set_access_token(token.access_token);
        log::info!("session started");
    }

    pub(crate) fn end_session(&self) {
        self.inner.tokens.clear();
        log::info!("session ended");
    }

    /// Cookie header the refresh endpoint would receive, for persisting a session.
    pub fn session_cookies(&self) -> Option<String> {
        let url = self.url(REFRESH_RESOURCE).ok()?;
        self.inner
            .jar
            .cookies(&url)
            .and_then(|value: HeaderValue| value.to_str().ok().map(str::to_string))
    }

    /// Restores cookies saved by [`ApiClient::session_cookies`].
    pub fn restore_cookies(&self, header: &str) -> Result<(), ApiError> {
        let url = self.url(REFRESH_RESOURCE)?;
        for cookie in header.split(';').map(str::trim).filter(|cookie| !cookie.is_empty()) {
            self.inner.jar.add_cookie_str(cookie, &url);
        }
        Ok(())
    }
}

async fn refresh_session(
    http: reqwest::Client,
    url: Url,
    tokens: Arc<dyn TokenStore>,
) -> Result<String, RefreshFailure> {
    log::info!("refreshing access token");
    let response = http
        .post(url)
        .header(REQUEST_ID_HEADER, generate_request_id())
        .send()
        .await
        .map_err(|err| RefreshFailure {
            status: None,
            message: err.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailure {
            status: Some(status.as_u16()),
            message: format!("refresh rejected with {status}"),
        });
    }

    let body: AuthToken = response.json().await.map_err(|err| RefreshFailure {
        status: Some(status.as_u16()),
        message: format!("refresh response: {err}"),
    })?;
    tokens.set_access_token(body.access_token.clone());
    log::info!("access token refreshed");
    Ok(body.access_token)
}

fn build_form(parts: &[FormPart]) -> Result<reqwest::multipart::Form, ApiError> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match &part.value {
            FormValue::Text(text) => form.text(part.name.clone(), text.clone()),
            FormValue::File {
                file_name,
                mime,
                bytes,
            } => {
                let file = reqwest::multipart::Part::bytes(bytes.clone())
                    .file_name(file_name.clone())
                    .mime_str(mime)?;
                form.part(part.name.clone(), file)
            }
        };
    }
    Ok(form)
}

pub(crate) async fn decode<T: DeserializeOwned>(resource: &str, response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
        message: format!("{resource}: {err}"),
    })
}

/// Rejects values that would change the route when used as a path segment.
pub(crate) fn segment(value: &str) -> Result<&str, ApiError> {
    if value.is_empty() || value == "." || value == ".." || value.contains(['/', '?', '#']) {
        return Err(ApiError::InvalidRequest {
            message: format!("'{value}' is not a valid path segment"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(
            Url::parse("http://localhost:4000/api/v1/").unwrap(),
            Duration::from_secs(5),
            Arc::new(MemoryTokenStore::default()),
            Arc::new(StaticNavigator::new("/home")),
        )
        .unwrap()
    }

    #[test]
    fn resources_join_under_versioned_root() {
        let client = client();
        assert_eq!(
            client.url("tweets/t1/like").unwrap().as_str(),
            "http://localhost:4000/api/v1/tweets/t1/like"
        );
        assert_eq!(client.url("/auth/me").unwrap().as_str(), "http://localhost:4000/api/v1/auth/me");
    }

    #[test]
    fn segments_cannot_escape_route() {
        assert!(segment("bob").is_ok());
        assert!(segment("").is_err());
        assert!(segment("..").is_err());
        assert!(segment("a/b").is_err());
        assert!(segment("a?x=1").is_err());
    }

    #[test]
    fn cookies_round_trip_through_header() {
        let client = client();
        assert!(client.session_cookies().is_none());
        client.restore_cookies("refresh=abc; theme=dark").unwrap();
        let header = client.session_cookies().unwrap();
        assert!(header.contains("refresh=abc"));
        assert!(header.contains("theme=dark"));
    }

    #[tokio::test]
    async fn missing_token_redirects_to_current_location() {
        let err = client().call_api("auth/me", RequestConfig::get()).await.unwrap_err();
        assert!(matches!(err, ApiError::Redirect { ref redirect_to } if redirect_to == "/home"));
    }
}
