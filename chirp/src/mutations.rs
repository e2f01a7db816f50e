//! Optimistic writes for social interactions.
//!
//! Every operation follows the same protocol:
//!
//! 1. cancel in-flight fetches for the keys it will touch,
//! 2. rewrite every affected entry in place,
//! 3. dispatch the request,
//! 4. settle, which queues invalidations that only run once the last
//!    mutation of the same [`MutationKey`] has finished.
//!
//! A failed request is returned to the caller. The optimistic state is not
//! rolled back; the settle-time invalidation refetches it.
//! Dropping an operation mid-request settles it the same way.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use crate::api::MutationApi;
use crate::cache::{CacheValue, QueryCache, transforms};
use crate::errors::ApiError;
use crate::keys::{MutationKey, QueryFilter, QueryKey, Resource, Scope};
use crate::models::{ComposeTweet, ProfileUpdate, Tweet, TweetIdentity, User};
use crate::validators::{validate_compose, validate_profile};

/// Keys a mutation cancels before its write and invalidates after it settles.
struct Plan {
    cancel: Vec<QueryFilter>,
    invalidate: Vec<QueryFilter>,
}

#[derive(Clone)]
pub struct Mutations {
    api: Arc<dyn MutationApi>,
    cache: QueryCache,
}

impl Mutations {
    pub fn new(api: Arc<dyn MutationApi>, cache: QueryCache) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Username of the signed-in viewer, as last fetched.
    fn viewer(&self) -> Option<String> {
        self.cache.get::<User>(&QueryKey::me()).map(|user| user.username)
    }

    async fn run<T, Fut>(
        &self,
        key: MutationKey,
        plan: Plan,
        transform: impl FnOnce(&QueryCache),
        dispatch: Fut,
    ) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let guard = self.cache.begin_mutation(key, plan.invalidate);
        for filter in &plan.cancel {
            self.cache.cancel_queries(filter);
        }
        transform(&self.cache);

        let outcome = dispatch.await;
        if let Err(err) = &outcome {
            log::debug!("{} mutation failed: {err}", key.as_str());
        }
        guard.settle();
        outcome
    }

    pub async fn follow(&self, username: &str) -> Result<(), ApiError> {
        self.set_followed(username, true).await
    }

    pub async fn unfollow(&self, username: &str) -> Result<(), ApiError> {
        self.set_followed(username, false).await
    }

    async fn set_followed(&self, username: &str, followed: bool) -> Result<(), ApiError> {
        let plan = Plan {
            cancel: vec![QueryFilter::resource(Resource::Users)],
            invalidate: vec![
                QueryFilter::resource(Resource::Users),
                QueryFilter::from(QueryKey::me()),
                QueryFilter::scope(Resource::Tweets, Scope::List),
            ],
        };
        let dispatch = async {
            if followed {
                self.api.follow(username).await
            } else {
                self.api.unfollow(username).await
            }
        };
        self.run(
            MutationKey::Follow,
            plan,
            |cache| {
                cache.update_queries(&QueryFilter::resource(Resource::Users), |_, value| {
                    transforms::for_user(value, username, |user| transforms::set_followed(user, followed))
                });
            },
            dispatch,
        )
        .await
    }

    pub async fn like(&self, id: &str) -> Result<(), ApiError> {
        self.set_liked(id, true).await
    }

    pub async fn unlike(&self, id: &str) -> Result<(), ApiError> {
        self.set_liked(id, false).await
    }

    /// Likes or unlikes depending on the cached flag. Returns the new flag.
    pub async fn toggle_like(&self, id: &str) -> Result<bool, ApiError> {
        let liked = !self.cached_flag(id, |tweet| tweet.liked);
        self.set_liked(id, liked).await?;
        Ok(liked)
    }

    fn cached_flag(&self, id: &str, flag: impl Fn(&Tweet) -> bool) -> bool {
        self.cache
            .find_map(&QueryFilter::resource(Resource::Tweets), |_, value| {
                value.tweets().find(|tweet| tweet.id == id).map(&flag)
            })
            .unwrap_or(false)
    }

    async fn set_liked(&self, id: &str, liked: bool) -> Result<(), ApiError> {
        let viewer_likes = self.viewer().map(|viewer| QueryKey::liked_tweets(&viewer));
        let identity = TweetIdentity::original(id);
        let plan = Plan {
            cancel: vec![QueryFilter::resource(Resource::Tweets)],
            invalidate: vec![QueryFilter::resource(Resource::Tweets)],
        };
        let dispatch = async {
            if liked {
                self.api.like(id).await
            } else {
                self.api.unlike(id).await
            }
        };
        self.run(
            MutationKey::Like,
            plan,
            |cache| {
                cache.update_queries(&QueryFilter::resource(Resource::Tweets), |key, value| {
                    let mut changed = transforms::for_tweet(value, id, |tweet| transforms::set_liked(tweet, liked));
                    if !liked && viewer_likes.as_ref() == Some(key) {
                        changed |= transforms::remove_tweet(value, &identity) > 0;
                    }
                    changed
                });
            },
            dispatch,
        )
        .await
    }

    pub async fn repost(&self, id: &str) -> Result<(), ApiError> {
        self.set_reposted(id, true).await
    }

    pub async fn unrepost(&self, id: &str) -> Result<(), ApiError> {
        self.set_reposted(id, false).await
    }

    async fn set_reposted(&self, id: &str, reposted: bool) -> Result<(), ApiError> {
        let own_repost = self
            .viewer()
            .filter(|_| !reposted)
            .map(|viewer| TweetIdentity::repost(id, viewer));
        let plan = Plan {
            cancel: vec![QueryFilter::resource(Resource::Tweets)],
            invalidate: vec![QueryFilter::resource(Resource::Tweets), QueryFilter::from(QueryKey::me())],
        };
        let dispatch = async {
            if reposted {
                self.api.repost(id).await
            } else {
                self.api.unrepost(id).await
            }
        };
        self.run(
            MutationKey::Repost,
            plan,
            |cache| {
                cache.update_queries(&QueryFilter::resource(Resource::Tweets), |_, value| {
                    let mut changed =
                        transforms::for_tweet(value, id, |tweet| transforms::set_reposted(tweet, reposted));
                    if let Some(identity) = &own_repost {
                        changed |= transforms::remove_tweet(value, identity) > 0;
                    }
                    changed
                });
            },
            dispatch,
        )
        .await
    }

    /// Deletes an original tweet. Reposts of it are left to the refetch.
    pub async fn delete_tweet(&self, id: &str) -> Result<(), ApiError> {
        let identity = TweetIdentity::original(id);
        let parent_id = self
            .cache
            .find_map(&QueryFilter::resource(Resource::Tweets), |_, value| {
                value
                    .tweets()
                    .find(|tweet| tweet.matches(&identity))
                    .map(|tweet| tweet.parent_id.clone())
            })
            .flatten();

        let detail = QueryFilter::from(QueryKey::tweet(id));
        let thread = QueryFilter::from(QueryKey::replies(id));
        let plan = Plan {
            cancel: vec![QueryFilter::resource(Resource::Tweets)],
            invalidate: vec![
                QueryFilter::resource(Resource::Tweets),
                QueryFilter::from(QueryKey::me()),
                QueryFilter::scope(Resource::Users, Scope::Detail),
            ],
        };
        self.run(
            MutationKey::Delete,
            plan,
            |cache| {
                cache.remove_queries(&detail);
                cache.remove_queries(&thread);
                cache.update_queries(&QueryFilter::resource(Resource::Tweets), |_, value| {
                    let mut changed = transforms::remove_tweet(value, &identity) > 0;
                    if let Some(parent_id) = &parent_id {
                        changed |= transforms::for_tweet(value, parent_id, |tweet| {
                            transforms::decrement_replies(tweet);
                            true
                        });
                    }
                    changed
                });
            },
            self.api.delete_tweet(id),
        )
        .await
    }

    /// Posts a reply under `parent_id`. Write-through: the thread is refetched after settle.
    pub async fn reply(&self, parent_id: &str, mut tweet: ComposeTweet) -> Result<Tweet, ApiError> {
        tweet.parent_id = Some(parent_id.to_string());
        validate_compose(&tweet)?;
        let plan = Plan {
            cancel: vec![
                QueryFilter::from(QueryKey::replies(parent_id)),
                QueryFilter::from(QueryKey::tweet(parent_id)),
            ],
            invalidate: vec![
                QueryFilter::scope(Resource::Tweets, Scope::Replies),
                QueryFilter::from(QueryKey::tweet(parent_id)),
                QueryFilter::scope(Resource::Tweets, Scope::List),
                QueryFilter::from(QueryKey::me()),
            ],
        };
        self.write_through(MutationKey::Reply, plan, &tweet).await
    }

    pub async fn create_tweet(&self, tweet: ComposeTweet) -> Result<Tweet, ApiError> {
        validate_compose(&tweet)?;
        let plan = Plan {
            cancel: vec![QueryFilter::scope(Resource::Tweets, Scope::List)],
            invalidate: vec![
                QueryFilter::scope(Resource::Tweets, Scope::List),
                QueryFilter::from(QueryKey::me()),
                QueryFilter::scope(Resource::Users, Scope::Detail),
            ],
        };
        self.write_through(MutationKey::Compose, plan, &tweet).await
    }

    async fn write_through(&self, key: MutationKey, plan: Plan, tweet: &ComposeTweet) -> Result<Tweet, ApiError> {
        let dispatch = async {
            let created = self.api.create_tweet(tweet).await?;
            self.cache
                .set_query_data(QueryKey::tweet(&created.id), CacheValue::Tweet(created.clone()));
            Ok(created)
        };
        self.run(key, plan, |_| {}, dispatch).await
    }

    pub async fn mark_notifications_read(&self, ids: &[String]) -> Result<(), ApiError> {
        if ids.is_empty() {
            return Ok(());
        }
        let plan = Plan {
            cancel: vec![QueryFilter::resource(Resource::Notifications)],
            invalidate: vec![QueryFilter::resource(Resource::Notifications)],
        };
        self.run(
            MutationKey::MarkRead,
            plan,
            |cache| {
                // Counted and applied in one pass so overlapping calls subtract each id once.
                cache.update_queries_batch(&QueryFilter::resource(Resource::Notifications), |entries| {
                    let mut newly_read = HashSet::new();
                    for (key, value) in entries.iter() {
                        if key.scope == Scope::List
                            && let CacheValue::Notifications(pages) = &**value
                        {
                            newly_read.extend(
                                pages
                                    .iter()
                                    .filter(|notification| !notification.read && ids.contains(&notification.id))
                                    .map(|notification| notification.id.clone()),
                            );
                        }
                    }
                    let newly_read = newly_read.len() as u64;

                    let mut changed = Vec::new();
                    for (key, value) in entries.iter_mut() {
                        let touched = match &mut **value {
                            CacheValue::Count(unread) => {
                                let before = *unread;
                                *unread = unread.saturating_sub(newly_read);
                                *unread != before
                            }
                            other => transforms::mark_notifications_read(other, ids) > 0,
                        };
                        if touched {
                            changed.push((*key).clone());
                        }
                    }
                    changed
                });
            },
            self.api.mark_read(ids),
        )
        .await
    }

    /// Validates, then writes the returned profile to the viewer's entries.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        validate_profile(update)?;
        let mut cancel = vec![QueryFilter::from(QueryKey::me())];
        if let Some(viewer) = self.viewer() {
            cancel.push(QueryFilter::from(QueryKey::user(&viewer)));
        }
        let plan = Plan {
            cancel,
            invalidate: vec![
                QueryFilter::from(QueryKey::me()),
                QueryFilter::resource(Resource::Users),
                QueryFilter::resource(Resource::Tweets),
            ],
        };
        let dispatch = async {
            let user = self.api.update_profile(update).await?;
            self.cache.set_query_data(QueryKey::me(), CacheValue::User(user.clone()));
            self.cache
                .set_query_data(QueryKey::user(&user.username), CacheValue::User(user.clone()));
            Ok(user)
        };
        self.run(MutationKey::Profile, plan, |_| {}, dispatch).await
    }
}
