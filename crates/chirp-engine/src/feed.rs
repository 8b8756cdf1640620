//! Feed composition: the global feed, user profiles and comment threads.

use chirp_store::Database;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{missing, Result};
use crate::view::{follow_label, AuthorView, Expander, FollowLabel, TweetView};

/// Tweets per feed page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of the global feed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub tweets: Vec<TweetView>,
    pub active_user: AuthorView,
}

/// A user's profile as seen by a viewer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage {
    pub username: String,
    pub avatar: String,
    /// The profile's tweet index, retweet-copies included.
    pub tweets: Vec<TweetView>,
    pub followers: usize,
    pub follow_btn: FollowLabel,
    /// The viewer's username.
    pub active_user: String,
}

/// Build a page of the global feed for `viewer`.
///
/// Only original tweets are listed (retweet-copies are reachable through the
/// retweeter's profile).  Pagination is offset based: pages are stable as
/// long as no tweet is inserted or removed between requests.
pub fn build_feed(db: &Database, viewer: &str, skip: u32, limit: u32) -> Result<FeedPage> {
    let user = db.get_user_by_username(viewer).map_err(missing("user"))?;
    let limit = limit.clamp(1, MAX_PAGE_SIZE);

    let tweets = db.list_feed(limit, skip)?;
    debug!(viewer = %viewer, skip, limit, count = tweets.len(), "feed page loaded");

    Ok(FeedPage {
        tweets: Expander::new(db, Some(viewer)).tweets(tweets)?,
        active_user: AuthorView::from(&user),
    })
}

/// Build `profile_username`'s profile as seen by `viewer`.
pub fn build_profile(db: &Database, viewer: &str, profile_username: &str) -> Result<ProfilePage> {
    let profile = db
        .get_user_by_username(profile_username)
        .map_err(missing("user"))?;

    let tweets = db.tweets_in_index(&profile.username)?;
    let tweets = Expander::new(db, Some(viewer)).tweets(tweets)?;

    Ok(ProfilePage {
        follow_btn: follow_label(&profile.followers, Some(viewer)),
        followers: profile.followers.len(),
        username: profile.username,
        avatar: profile.avatar,
        tweets,
        active_user: viewer.to_string(),
    })
}

/// Load a tweet with its comments and their authors expanded.  Button fields
/// are computed for `viewer`, or left off when there is none.
pub fn fetch_comments(db: &Database, tweet_id: Uuid, viewer: Option<&str>) -> Result<TweetView> {
    let tweet = db.get_tweet(tweet_id).map_err(missing("tweet"))?;
    Expander::new(db, viewer).tweet(tweet)
}
