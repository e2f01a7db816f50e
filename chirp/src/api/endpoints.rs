use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::ApiError;
use crate::models::{
    AuthToken, ComposeTweet, Credentials, Notification, Page, ProfileUpdate, SignupForm, Tweet, User,
};

use super::{ApiClient, FormPart, RequestConfig, segment};

/// Session and read endpoints.
#[async_trait]
pub trait SocialApi: Send + Sync + 'static {
    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError>;
    async fn signup(&self, form: &SignupForm) -> Result<(), ApiError>;
    async fn logout(&self) -> Result<(), ApiError>;
    async fn me(&self) -> Result<User, ApiError>;

    async fn user(&self, username: &str) -> Result<User, ApiError>;
    async fn search_users(&self, query: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError>;
    async fn followers(&self, username: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError>;
    async fn following(&self, username: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError>;

    async fn feed(&self, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError>;
    async fn user_tweets(&self, username: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError>;
    async fn liked_tweets(&self, username: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError>;
    async fn search_tweets(&self, query: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError>;
    async fn tweet(&self, id: &str) -> Result<Tweet, ApiError>;
    async fn replies(&self, id: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError>;

    async fn notifications(&self, cursor: Option<&str>) -> Result<Page<Notification>, ApiError>;
    async fn unread_count(&self) -> Result<u64, ApiError>;
}

/// Endpoints that change server state. Driven by [`crate::mutations::Mutations`].
#[async_trait]
pub trait MutationApi: Send + Sync + 'static {
    async fn follow(&self, username: &str) -> Result<(), ApiError>;
    async fn unfollow(&self, username: &str) -> Result<(), ApiError>;
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError>;

    async fn create_tweet(&self, tweet: &ComposeTweet) -> Result<Tweet, ApiError>;
    async fn delete_tweet(&self, id: &str) -> Result<(), ApiError>;
    async fn like(&self, id: &str) -> Result<(), ApiError>;
    async fn unlike(&self, id: &str) -> Result<(), ApiError>;
    async fn repost(&self, id: &str) -> Result<(), ApiError>;
    async fn unrepost(&self, id: &str) -> Result<(), ApiError>;

    async fn mark_read(&self, ids: &[String]) -> Result<(), ApiError>;
}

#[derive(Deserialize)]
struct UnreadCount {
    count: u64,
}

impl ApiClient {
    async fn send_empty(&self, resource: &str, config: RequestConfig) -> Result<(), ApiError> {
        self.call_api(resource, config).await.map(|_| ())
    }

    async fn page<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        config: RequestConfig,
        cursor: Option<&str>,
    ) -> Result<Page<T>, ApiError> {
        self.fetch_json(resource, config.cursor(cursor)).await
    }
}

fn compose_parts(tweet: &ComposeTweet) -> Vec<FormPart> {
    let mut parts = Vec::with_capacity(tweet.media.len() + 2);
    if let Some(content) = &tweet.content {
        parts.push(FormPart::text("content", content.clone()));
    }
    if let Some(parent_id) = &tweet.parent_id {
        parts.push(FormPart::text("parentId", parent_id.clone()));
    }
    for upload in &tweet.media {
        parts.push(FormPart::file(
            "media",
            upload.file_name.clone(),
            upload.mime.clone(),
            upload.bytes.clone(),
        ));
    }
    parts
}

#[async_trait]
impl SocialApi for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<(), ApiError> {
        let token: AuthToken = self
            .fetch_json("auth/login", RequestConfig::post().anonymous().json(credentials)?)
            .await?;
        self.accept_token(token);
        Ok(())
    }

    async fn signup(&self, form: &SignupForm) -> Result<(), ApiError> {
        let token: AuthToken = self
            .fetch_json("auth/signup", RequestConfig::post().anonymous().json(form)?)
            .await?;
        self.accept_token(token);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let outcome = self.send_empty("auth/logout", RequestConfig::post().anonymous()).await;
        self.end_session();
        outcome
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.fetch_json("auth/me", RequestConfig::get()).await
    }

    async fn user(&self, username: &str) -> Result<User, ApiError> {
        self.fetch_json(&format!("users/{}", segment(username)?), RequestConfig::get())
            .await
    }

    async fn search_users(&self, query: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError> {
        self.page("users/search", RequestConfig::get().query("q", query), cursor)
            .await
    }

    async fn followers(&self, username: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError> {
        let resource = format!("users/{}/followers", segment(username)?);
        self.page(&resource, RequestConfig::get(), cursor).await
    }

    async fn following(&self, username: &str, cursor: Option<&str>) -> Result<Page<User>, ApiError> {
        let resource = format!("users/{}/following", segment(username)?);
        self.page(&resource, RequestConfig::get(), cursor).await
    }

    async fn feed(&self, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        self.page("tweets", RequestConfig::get(), cursor).await
    }

    async fn user_tweets(&self, username: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        let resource = format!("users/{}/tweets", segment(username)?);
        self.page(&resource, RequestConfig::get(), cursor).await
    }

    async fn liked_tweets(&self, username: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        let resource = format!("users/{}/likes", segment(username)?);
        self.page(&resource, RequestConfig::get(), cursor).await
    }

    async fn search_tweets(&self, query: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        self.page("tweets/search", RequestConfig::get().query("q", query), cursor)
            .await
    }

    async fn tweet(&self, id: &str) -> Result<Tweet, ApiError> {
        self.fetch_json(&format!("tweets/{}", segment(id)?), RequestConfig::get())
            .await
    }

    async fn replies(&self, id: &str, cursor: Option<&str>) -> Result<Page<Tweet>, ApiError> {
        let resource = format!("tweets/{}/replies", segment(id)?);
        self.page(&resource, RequestConfig::get(), cursor).await
    }

    async fn notifications(&self, cursor: Option<&str>) -> Result<Page<Notification>, ApiError> {
        self.page("notifications", RequestConfig::get(), cursor).await
    }

    async fn unread_count(&self) -> Result<u64, ApiError> {
        let unread: UnreadCount = self
            .fetch_json("notifications/unread", RequestConfig::get())
            .await?;
        Ok(unread.count)
    }
}

#[async_trait]
impl MutationApi for ApiClient {
    async fn follow(&self, username: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("users/{}/follow", segment(username)?), RequestConfig::post())
            .await
    }

    async fn unfollow(&self, username: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("users/{}/follow", segment(username)?), RequestConfig::delete())
            .await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        self.fetch_json("users/me", RequestConfig::patch().json(update)?).await
    }

    async fn create_tweet(&self, tweet: &ComposeTweet) -> Result<Tweet, ApiError> {
        self.fetch_json("tweets", RequestConfig::post().multipart(compose_parts(tweet)))
            .await
    }

    async fn delete_tweet(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("tweets/{}", segment(id)?), RequestConfig::delete())
            .await
    }

    async fn like(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("tweets/{}/like", segment(id)?), RequestConfig::post())
            .await
    }

    async fn unlike(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("tweets/{}/like", segment(id)?), RequestConfig::delete())
            .await
    }

    async fn repost(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("tweets/{}/repost", segment(id)?), RequestConfig::post())
            .await
    }

    async fn unrepost(&self, id: &str) -> Result<(), ApiError> {
        self.send_empty(&format!("tweets/{}/repost", segment(id)?), RequestConfig::delete())
            .await
    }

    async fn mark_read(&self, ids: &[String]) -> Result<(), ApiError> {
        self.send_empty("notifications/read", RequestConfig::patch().json(&json!({ "ids": ids }))?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Upload;

    #[test]
    fn compose_form_carries_parent_and_media() {
        let parts = compose_parts(&ComposeTweet {
            content: Some("hi".into()),
            media: vec![Upload {
                file_name: "cat.png".into(),
                mime: "image/png".into(),
                bytes: vec![1, 2, 3],
            }],
            parent_id: Some("t9".into()),
        });
        let names: Vec<&str> = parts.iter().map(|part| part.name.as_str()).collect();
        assert_eq!(names, vec!["content", "parentId", "media"]);
    }
}
