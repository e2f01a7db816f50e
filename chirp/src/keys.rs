//! Structured cache keys.
//!
//! A key is `resource:scope[:name=value...]`, e.g. `tweets:list:username=bob`.
//! Param values are form-encoded in the text form, so `:` and `=` inside a
//! value survive a round trip. Filters match by prefix: resource, then
//! optional scope, then a subset of params.

use std::fmt;
use std::str::FromStr;

use url::form_urlencoded;

use crate::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resource {
    Tweets,
    Users,
    Notifications,
    Auth,
}

impl Resource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Resource::Tweets => "tweets",
            Resource::Users => "users",
            Resource::Notifications => "notifications",
            Resource::Auth => "auth",
        }
    }
}

impl FromStr for Resource {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tweets" => Ok(Resource::Tweets),
            "users" => Ok(Resource::Users),
            "notifications" => Ok(Resource::Notifications),
            "auth" => Ok(Resource::Auth),
            other => Err(invalid_key(format!("unknown resource '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    List,
    Detail,
    Likes,
    Replies,
    Search,
    Followers,
    Following,
    Me,
    Unread,
}

impl Scope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Scope::List => "list",
            Scope::Detail => "detail",
            Scope::Likes => "likes",
            Scope::Replies => "replies",
            Scope::Search => "search",
            Scope::Followers => "followers",
            Scope::Following => "following",
            Scope::Me => "me",
            Scope::Unread => "unread",
        }
    }
}

impl FromStr for Scope {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "list" => Ok(Scope::List),
            "detail" => Ok(Scope::Detail),
            "likes" => Ok(Scope::Likes),
            "replies" => Ok(Scope::Replies),
            "search" => Ok(Scope::Search),
            "followers" => Ok(Scope::Followers),
            "following" => Ok(Scope::Following),
            "me" => Ok(Scope::Me),
            "unread" => Ok(Scope::Unread),
            other => Err(invalid_key(format!("unknown scope '{other}'"))),
        }
    }
}

fn invalid_key(message: String) -> ApiError {
    ApiError::InvalidRequest { message }
}

/// Identifier of exactly one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub resource: Resource,
    pub scope: Scope,
    /// Sorted by name so equal keys compare equal regardless of build order.
    pub params: Vec<(String, String)>,
}

impl QueryKey {
    pub fn new(resource: Resource, scope: Scope) -> Self {
        Self {
            resource,
            scope,
            params: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.params.binary_search_by(|(existing, _)| existing.as_str().cmp(name.as_str())) {
            Ok(index) => self.params[index].1 = value,
            Err(index) => self.params.insert(index, (name, value)),
        }
        self
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    /// Global home feed
    pub fn feed() -> Self {
        Self::new(Resource::Tweets, Scope::List)
    }

    pub fn user_tweets(username: &str) -> Self {
        Self::feed().with("username", username)
    }

    pub fn tweet(id: &str) -> Self {
        Self::new(Resource::Tweets, Scope::Detail).with("id", id)
    }

    pub fn replies(parent_id: &str) -> Self {
        Self::new(Resource::Tweets, Scope::Replies).with("id", parent_id)
    }

    pub fn liked_tweets(username: &str) -> Self {
        Self::new(Resource::Tweets, Scope::Likes).with("username", username)
    }

    pub fn search_tweets(query: &str) -> Self {
        Self::new(Resource::Tweets, Scope::Search).with("q", query)
    }

    pub fn user(username: &str) -> Self {
        Self::new(Resource::Users, Scope::Detail).with("username", username)
    }

    pub fn search_users(query: &str) -> Self {
        Self::new(Resource::Users, Scope::Search).with("q", query)
    }

    pub fn followers(username: &str) -> Self {
        Self::new(Resource::Users, Scope::Followers).with("username", username)
    }

    pub fn following(username: &str) -> Self {
        Self::new(Resource::Users, Scope::Following).with("username", username)
    }

    pub fn notifications() -> Self {
        Self::new(Resource::Notifications, Scope::List)
    }

    pub fn unread_notifications() -> Self {
        Self::new(Resource::Notifications, Scope::Unread)
    }

    pub fn me() -> Self {
        Self::new(Resource::Auth, Scope::Me)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource.as_str(), self.scope.as_str())?;
        write_params(f, &self.params)
    }
}

impl FromStr for QueryKey {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let filter = QueryFilter::from_str(s)?;
        let scope = filter
            .scope
            .ok_or_else(|| invalid_key(format!("key '{s}' has no scope")))?;
        Ok(filter
            .params
            .into_iter()
            .fold(Self::new(filter.resource, scope), |key, (name, value)| key.with(name, value)))
    }
}

/// Prefix matcher over keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    pub resource: Resource,
    pub scope: Option<Scope>,
    pub params: Vec<(String, String)>,
}

impl QueryFilter {
    pub fn resource(resource: Resource) -> Self {
        Self {
            resource,
            scope: None,
            params: Vec::new(),
        }
    }

    pub fn scope(resource: Resource, scope: Scope) -> Self {
        Self {
            resource,
            scope: Some(scope),
            params: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        if key.resource != self.resource {
            return false;
        }
        if let Some(scope) = self.scope
            && key.scope != scope
        {
            return false;
        }
        self.params
            .iter()
            .all(|(name, value)| key.param(name) == Some(value.as_str()))
    }
}

impl From<&QueryKey> for QueryFilter {
    fn from(key: &QueryKey) -> Self {
        Self {
            resource: key.resource,
            scope: Some(key.scope),
            params: key.params.clone(),
        }
    }
}

impl From<QueryKey> for QueryFilter {
    fn from(key: QueryKey) -> Self {
        Self {
            resource: key.resource,
            scope: Some(key.scope),
            params: key.params,
        }
    }
}

impl FromStr for QueryFilter {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().split(':');
        let resource = parts
            .next()
            .filter(|part| !part.is_empty())
            .ok_or_else(|| invalid_key("empty key".to_string()))?
            .parse::<Resource>()?;
        let scope = parts.next().map(Scope::from_str).transpose()?;

        let mut params = Vec::new();
        for part in parts {
            params.push(parse_param(part)?);
        }

        Ok(Self { resource, scope, params })
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[(String, String)]) -> fmt::Result {
    for (name, value) in params {
        let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
        write!(f, ":{name}={value}")?;
    }
    Ok(())
}

fn parse_param(part: &str) -> Result<(String, String), ApiError> {
    let malformed = || invalid_key(format!("malformed key param '{part}'"));
    if !part.contains('=') {
        return Err(malformed());
    }
    let mut pairs = form_urlencoded::parse(part.as_bytes());
    match (pairs.next(), pairs.next()) {
        (Some((name, value)), None) => Ok((name.into_owned(), value.into_owned())),
        _ => Err(malformed()),
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource.as_str())?;
        if let Some(scope) = self.scope {
            write!(f, ":{}", scope.as_str())?;
        }
        write_params(f, &self.params)
    }
}

/// Shared key for in-flight mutations of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKey {
    Follow,
    Like,
    Repost,
    Delete,
    Reply,
    Compose,
    MarkRead,
    Profile,
}

impl MutationKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            MutationKey::Follow => "follow",
            MutationKey::Like => "like",
            MutationKey::Repost => "repost",
            MutationKey::Delete => "delete",
            MutationKey::Reply => "reply",
            MutationKey::Compose => "compose",
            MutationKey::MarkRead => "mark_read",
            MutationKey::Profile => "profile",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_keys_in_canonical_order() {
        let a = QueryKey::feed().with("username", "bob").with("filter", "media");
        let b = QueryKey::feed().with("filter", "media").with("username", "bob");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "tweets:list:filter=media:username=bob");
    }

    #[test]
    fn parses_key_text_back() {
        let key: QueryKey = "users:detail:username=alice".parse().expect("parse");
        assert_eq!(key, QueryKey::user("alice"));
        assert!("users".parse::<QueryKey>().is_err());
        assert!("bogus:list".parse::<QueryKey>().is_err());
        assert!("tweets:list:username".parse::<QueryKey>().is_err());
    }

    #[test]
    fn values_with_separators_survive_text_form() {
        let key = QueryKey::search_tweets("from:bob lang=en");
        let text = key.to_string();
        assert_eq!(text, "tweets:search:q=from%3Abob+lang%3Den");
        assert_eq!(text.parse::<QueryKey>().expect("parse"), key);

        let filter: QueryFilter = text.parse().expect("parse");
        assert!(filter.matches(&key));
        assert!(!filter.matches(&QueryKey::search_tweets("from:bob")));
    }

    #[test]
    fn filter_matches_by_prefix() {
        let all_lists = QueryFilter::scope(Resource::Tweets, Scope::List);
        assert!(all_lists.matches(&QueryKey::feed()));
        assert!(all_lists.matches(&QueryKey::user_tweets("bob")));
        assert!(!all_lists.matches(&QueryKey::tweet("t1")));

        let bob = QueryFilter::resource(Resource::Tweets).with("username", "bob");
        assert!(bob.matches(&QueryKey::user_tweets("bob")));
        assert!(bob.matches(&QueryKey::liked_tweets("bob")));
        assert!(!bob.matches(&QueryKey::feed()));

        let parsed: QueryFilter = "notifications".parse().expect("parse");
        assert!(parsed.matches(&QueryKey::unread_notifications()));
    }
}
