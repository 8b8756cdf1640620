//! Like, retweet and follow toggles.
//!
//! Each toggle flips the actor's membership in one set: applying the same
//! `(actor, target)` pair twice restores the original membership.

use chirp_store::Database;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{missing, Result};
use crate::view::{follow_label, like_button, retweet_button, ButtonColor, FollowLabel};

/// Outcome of a tweet or comment like toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeToggle {
    pub liked: bool,
    pub likes: usize,
    pub btn_color: ButtonColor,
}

/// Outcome of a retweet toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetweetToggle {
    pub retweeted: bool,
    pub retweets: usize,
    pub retweet_btn: ButtonColor,
    /// The copy created by (or removed with) this toggle.
    pub copy_id: Option<Uuid>,
}

/// Outcome of a follow toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowToggle {
    /// `false` when the toggle was ignored (self-follow).
    pub changed: bool,
    pub followers: usize,
    pub follow_btn: FollowLabel,
}

fn ensure_user(db: &Database, username: &str) -> Result<()> {
    db.get_user_by_username(username).map_err(missing("user"))?;
    Ok(())
}

/// Toggle `actor`'s like on exactly the addressed tweet.
pub fn toggle_like(db: &Database, actor: &str, tweet_id: Uuid) -> Result<LikeToggle> {
    ensure_user(db, actor)?;
    let tweet = db.get_tweet(tweet_id).map_err(missing("tweet"))?;

    let mut likes = tweet.likes;
    if let Some(pos) = likes.iter().position(|u| u == actor) {
        db.remove_tweet_like(tweet_id, actor)?;
        likes.remove(pos);
    } else {
        db.add_tweet_like(tweet_id, actor)?;
        likes.push(actor.to_string());
    }

    let btn_color = like_button(&likes, Some(actor));
    info!(tweet = %tweet_id, actor = %actor, color = btn_color.as_str(), "tweet like toggled");

    Ok(LikeToggle {
        liked: btn_color == ButtonColor::DeepPink,
        likes: likes.len(),
        btn_color,
    })
}

/// Toggle `actor`'s like on a comment.
pub fn toggle_comment_like(db: &Database, actor: &str, comment_id: Uuid) -> Result<LikeToggle> {
    ensure_user(db, actor)?;
    let comment = db.get_comment(comment_id).map_err(missing("comment"))?;

    let mut likes = comment.likes;
    if let Some(pos) = likes.iter().position(|u| u == actor) {
        db.remove_comment_like(comment_id, actor)?;
        likes.remove(pos);
    } else {
        db.add_comment_like(comment_id, actor)?;
        likes.push(actor.to_string());
    }

    let btn_color = like_button(&likes, Some(actor));
    info!(comment = %comment_id, actor = %actor, color = btn_color.as_str(), "comment like toggled");

    Ok(LikeToggle {
        liked: btn_color == ButtonColor::DeepPink,
        likes: likes.len(),
        btn_color,
    })
}

/// Toggle `actor`'s retweet of a tweet.
///
/// Retweeting creates a retweet-copy at the front of the actor's tweet index
/// and records the actor on the original; un-retweeting removes both.
/// Addressing a retweet-copy toggles the retweet of its original.
pub fn toggle_retweet(db: &mut Database, actor: &str, tweet_id: Uuid) -> Result<RetweetToggle> {
    ensure_user(db, actor)?;
    let mut original = db.get_tweet(tweet_id).map_err(missing("tweet"))?;
    if let Some(source) = original.retweet_of {
        original = db.get_tweet(source).map_err(missing("tweet"))?;
    }

    let (copy_id, retweets) = if original.retweets.iter().any(|u| u == actor) {
        let removed = db.remove_retweet(original.id, actor)?;
        if removed.is_none() {
            tracing::warn!(
                tweet = %original.id,
                actor = %actor,
                "retweet recorded without a copy; membership removed"
            );
        }
        let retweets: Vec<String> = original
            .retweets
            .into_iter()
            .filter(|u| u != actor)
            .collect();
        (removed, retweets)
    } else {
        let copy = db.create_retweet(&original, actor)?;
        let mut retweets = original.retweets;
        retweets.push(actor.to_string());
        (Some(copy.id), retweets)
    };

    let retweet_btn = retweet_button(&retweets, Some(actor));
    info!(
        tweet = %original.id,
        actor = %actor,
        color = retweet_btn.as_str(),
        "retweet toggled"
    );

    Ok(RetweetToggle {
        retweeted: retweet_btn == ButtonColor::Green,
        retweets: retweets.len(),
        retweet_btn,
        copy_id,
    })
}

/// Toggle `actor`'s presence in `target`'s follower set.
///
/// Following yourself is ignored.  Only the followed user's record changes;
/// no following list is kept for the actor.
pub fn toggle_follow(db: &Database, actor: &str, target: &str) -> Result<FollowToggle> {
    ensure_user(db, actor)?;
    let target_user = db.get_user_by_username(target).map_err(missing("user"))?;
    let mut followers = target_user.followers;

    if actor == target_user.username {
        return Ok(FollowToggle {
            changed: false,
            followers: followers.len(),
            follow_btn: follow_label(&followers, Some(actor)),
        });
    }

    if let Some(pos) = followers.iter().position(|u| u == actor) {
        db.remove_follower(&target_user.username, actor)?;
        followers.remove(pos);
    } else {
        db.add_follower(&target_user.username, actor)?;
        followers.push(actor.to_string());
    }

    let follow_btn = follow_label(&followers, Some(actor));
    info!(actor = %actor, target = %target_user.username, label = ?follow_btn, "follow toggled");

    Ok(FollowToggle {
        changed: true,
        followers: followers.len(),
        follow_btn,
    })
}
