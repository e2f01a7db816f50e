use crate::models::{Notification, Pages, Tweet, User};

/// Data held by one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Tweet(Tweet),
    Tweets(Pages<Tweet>),
    User(User),
    Users(Pages<User>),
    Notifications(Pages<Notification>),
    Count(u64),
}

impl CacheValue {
    pub const fn kind(&self) -> &'static str {
        match self {
            CacheValue::Tweet(_) => "tweet",
            CacheValue::Tweets(_) => "tweets",
            CacheValue::User(_) => "user",
            CacheValue::Users(_) => "users",
            CacheValue::Notifications(_) => "notifications",
            CacheValue::Count(_) => "count",
        }
    }

    /// Every tweet held by this entry, detail or list.
    pub fn tweets_mut(&mut self) -> Box<dyn Iterator<Item = &mut Tweet> + '_> {
        match self {
            CacheValue::Tweet(tweet) => Box::new(std::iter::once(tweet)),
            CacheValue::Tweets(pages) => Box::new(pages.iter_mut()),
            _ => Box::new(std::iter::empty()),
        }
    }

    /// Every user held by this entry, detail or list.
    pub fn users_mut(&mut self) -> Box<dyn Iterator<Item = &mut User> + '_> {
        match self {
            CacheValue::User(user) => Box::new(std::iter::once(user)),
            CacheValue::Users(pages) => Box::new(pages.iter_mut()),
            _ => Box::new(std::iter::empty()),
        }
    }

    pub fn tweets(&self) -> Box<dyn Iterator<Item = &Tweet> + '_> {
        match self {
            CacheValue::Tweet(tweet) => Box::new(std::iter::once(tweet)),
            CacheValue::Tweets(pages) => Box::new(pages.iter()),
            _ => Box::new(std::iter::empty()),
        }
    }
}

/// Types that can be stored in and read back from the cache.
pub trait Cached: Sized + Clone {
    fn into_value(self) -> CacheValue;
    fn from_value(value: &CacheValue) -> Option<Self>;
}

macro_rules! impl_cached {
    ($ty:ty, $variant:ident) => {
        impl Cached for $ty {
            fn into_value(self) -> CacheValue {
                CacheValue::$variant(self)
            }

            fn from_value(value: &CacheValue) -> Option<Self> {
                match value {
                    CacheValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_cached!(Tweet, Tweet);
impl_cached!(Pages<Tweet>, Tweets);
impl_cached!(User, User);
impl_cached!(Pages<User>, Users);
impl_cached!(Pages<Notification>, Notifications);
impl_cached!(u64, Count);
