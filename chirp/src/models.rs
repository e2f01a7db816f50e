//! Social network entities as the API serves them.
//!
//! The client never owns these; it keeps a cached projection that the
//! mutation layer rewrites until the next refetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user profile, relative to the authenticated viewer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Whether the viewer follows this user
    #[serde(default)]
    pub followed: bool,
    #[serde(default, rename = "_count")]
    pub counts: UserCounts,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserCounts {
    #[serde(default)]
    pub followed_by: i64,
    #[serde(default)]
    pub following: i64,
    #[serde(default)]
    pub tweets: i64,
}

/// Partial user embedded in tweets and notifications.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: String,
    pub username: String,
    pub name: String,
    #[serde(default)]
    pub profile_image: Option<String>,
}

impl From<&User> for Author {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            profile_image: user.profile_image.clone(),
        }
    }
}

/// A post. Reposts share the `id` of the original and set `is_repost`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: String,
    pub author: Author,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, rename = "_count")]
    pub counts: TweetCounts,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub reposted: bool,
    #[serde(default)]
    pub is_repost: bool,
    #[serde(default)]
    pub repost: Option<RepostMeta>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TweetCounts {
    #[serde(default)]
    pub replies: i64,
    #[serde(default, alias = "retweets")]
    pub reposts: i64,
    #[serde(default)]
    pub likes: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepostMeta {
    pub reposted_by: Author,
    pub reposted_at: DateTime<Utc>,
}

/// Identity used when filtering lists: an original and a repost of it differ
/// even though they carry the same content id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TweetIdentity {
    pub id: String,
    pub is_repost: bool,
    pub reposted_by: Option<String>,
}

impl TweetIdentity {
    pub fn original(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_repost: false,
            reposted_by: None,
        }
    }

    pub fn repost(id: impl Into<String>, reposted_by: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_repost: true,
            reposted_by: Some(reposted_by.into()),
        }
    }
}

impl Tweet {
    pub fn identity(&self) -> TweetIdentity {
        TweetIdentity {
            id: self.id.clone(),
            is_repost: self.is_repost,
            reposted_by: self.repost.as_ref().map(|meta| meta.reposted_by.username.clone()),
        }
    }

    /// Matches `identity`. A repost identity without a reposter matches any repost of that id.
    pub fn matches(&self, identity: &TweetIdentity) -> bool {
        if self.id != identity.id || self.is_repost != identity.is_repost {
            return false;
        }
        match &identity.reposted_by {
            Some(username) => self
                .repost
                .as_ref()
                .is_some_and(|meta| &meta.reposted_by.username == username),
            None => true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Follow,
    Like,
    Reply,
    Repost,
    Mention,
}

impl NotificationKind {
    pub fn is_tweet_related(self) -> bool {
        !matches!(self, NotificationKind::Follow)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Follow => "follow",
            NotificationKind::Like => "like",
            NotificationKind::Reply => "reply",
            NotificationKind::Repost => "repost",
            NotificationKind::Mention => "mention",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TweetRef {
    pub id: String,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub sender: Author,
    #[serde(default)]
    pub tweet: Option<TweetRef>,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Media attachment. Purely descriptive.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Media {
    Image { variants: Vec<ImageVariant> },
    Video { variants: Vec<VideoVariant> },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageVariant {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VideoVariant {
    pub url: String,
    pub bitrate: u32,
    pub content_type: String,
}

impl Media {
    /// Largest image, or highest bitrate video.
    pub fn best_url(&self) -> Option<&str> {
        match self {
            Media::Image { variants } => variants
                .iter()
                .max_by_key(|v| u64::from(v.width) * u64::from(v.height))
                .map(|v| v.url.as_str()),
            Media::Video { variants } => variants.iter().max_by_key(|v| v.bitrate).map(|v| v.url.as_str()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Media::Image { .. } => "image",
            Media::Video { .. } => "video",
        }
    }
}

/// One page of a cursor-paginated list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }
}

/// Ordered pages of a list entry. Page boundaries are preserved.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Pages<T> {
    pub pages: Vec<Page<T>>,
    /// Cursor each page was fetched with; `None` for the first page.
    pub page_params: Vec<Option<String>>,
}

impl<T> Pages<T> {
    pub fn first(page: Page<T>) -> Self {
        Self {
            pages: vec![page],
            page_params: vec![None],
        }
    }

    pub fn push(&mut self, cursor: Option<String>, page: Page<T>) {
        self.page_params.push(cursor);
        self.pages.push(page);
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.pages.last().and_then(|page| page.next_cursor.as_deref())
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.pages.iter().flat_map(|page| page.items.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.pages.iter_mut().flat_map(|page| page.items.iter_mut())
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|page| page.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops matching items in place; pages stay in place even when emptied.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut removed = 0;
        for page in &mut self.pages {
            let before = page.items.len();
            page.items.retain(|item| keep(item));
            removed += before - page.items.len();
        }
        removed
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub username: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// File attached to a new tweet.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ComposeTweet {
    pub content: Option<String>,
    pub media: Vec<Upload>,
    pub parent_id: Option<String>,
}

/// Login/refresh response body.
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub access_token: String,
}
