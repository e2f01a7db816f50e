//! Pure cache transforms applied by optimistic mutations.
//!
//! Setters are involutions: setting a flag and then clearing it restores the
//! original flag and counter. They only touch the counter when the flag
//! actually changes, so repeating a like is a no-op.

use crate::models::{Notification, Tweet, TweetIdentity, User};

use super::CacheValue;

fn step(counter: &mut i64, up: bool) {
    if up {
        *counter += 1;
    } else {
        *counter = (*counter - 1).max(0);
    }
}

pub fn set_liked(tweet: &mut Tweet, liked: bool) -> bool {
    if tweet.liked == liked {
        return false;
    }
    tweet.liked = liked;
    step(&mut tweet.counts.likes, liked);
    true
}

pub fn set_reposted(tweet: &mut Tweet, reposted: bool) -> bool {
    if tweet.reposted == reposted {
        return false;
    }
    tweet.reposted = reposted;
    step(&mut tweet.counts.reposts, reposted);
    true
}

pub fn set_followed(user: &mut User, followed: bool) -> bool {
    if user.followed == followed {
        return false;
    }
    user.followed = followed;
    step(&mut user.counts.followed_by, followed);
    true
}

pub fn decrement_replies(tweet: &mut Tweet) {
    step(&mut tweet.counts.replies, false);
}

pub fn mark_read(notification: &mut Notification) -> bool {
    if notification.read {
        return false;
    }
    notification.read = true;
    true
}

/// Applies `f` to every copy of content `id` in the entry: detail, list items,
/// originals and reposts alike. Returns whether anything changed.
pub fn for_tweet(value: &mut CacheValue, id: &str, mut f: impl FnMut(&mut Tweet) -> bool) -> bool {
    let mut changed = false;
    for tweet in value.tweets_mut().filter(|tweet| tweet.id == id) {
        changed |= f(tweet);
    }
    changed
}

/// Applies `f` to every user named `username` in the entry.
pub fn for_user(value: &mut CacheValue, username: &str, mut f: impl FnMut(&mut User) -> bool) -> bool {
    let mut changed = false;
    for user in value.users_mut().filter(|user| user.username == username) {
        changed |= f(user);
    }
    changed
}

/// Filters `identity` out of a list entry. Detail entries are left alone.
pub fn remove_tweet(value: &mut CacheValue, identity: &TweetIdentity) -> usize {
    match value {
        CacheValue::Tweets(pages) => pages.retain(|tweet| !tweet.matches(identity)),
        _ => 0,
    }
}

pub fn mark_notifications_read(value: &mut CacheValue, ids: &[String]) -> usize {
    match value {
        CacheValue::Notifications(pages) => pages
            .iter_mut()
            .filter(|notification| ids.contains(&notification.id))
            .map(mark_read)
            .filter(|changed| *changed)
            .count(),
        _ => 0,
    }
}
