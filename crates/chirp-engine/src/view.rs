//! Response-shaped views and viewer-relative projection fields.
//!
//! Button colors and follow labels describe the relationship between the
//! requesting viewer and a record.  They are derived from set membership on
//! every read and are not part of the stored record.

use std::collections::HashMap;

use chirp_store::{Comment, Database, Tweet, User};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{missing, Result};

/// Color of a like / retweet button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonColor {
    /// Viewer has not liked / retweeted.
    Black,
    /// Viewer likes the tweet or comment.
    DeepPink,
    /// Viewer has retweeted.
    Green,
}

impl ButtonColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            ButtonColor::Black => "black",
            ButtonColor::DeepPink => "deeppink",
            ButtonColor::Green => "green",
        }
    }
}

/// Label of the follow button on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FollowLabel {
    Follow,
    Following,
}

fn contains(set: &[String], viewer: Option<&str>) -> bool {
    viewer.is_some_and(|v| set.iter().any(|name| name == v))
}

pub fn like_button(likes: &[String], viewer: Option<&str>) -> ButtonColor {
    if contains(likes, viewer) {
        ButtonColor::DeepPink
    } else {
        ButtonColor::Black
    }
}

pub fn retweet_button(retweets: &[String], viewer: Option<&str>) -> ButtonColor {
    if contains(retweets, viewer) {
        ButtonColor::Green
    } else {
        ButtonColor::Black
    }
}

pub fn follow_label(followers: &[String], viewer: Option<&str>) -> FollowLabel {
    if contains(followers, viewer) {
        FollowLabel::Following
    } else {
        FollowLabel::Follow
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Public summary of a user, used wherever an author is expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorView {
    pub id: Uuid,
    pub username: String,
    pub avatar: String,
}

impl From<&User> for AuthorView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            username: u.username.clone(),
            avatar: u.avatar.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub content: String,
    pub posted_by: AuthorView,
    pub posted_comment_time: String,
    pub likes: Vec<String>,
    pub is_edited: bool,
    pub like_comment_btn: ButtonColor,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: Uuid,
    pub content: String,
    pub posted_by: AuthorView,
    pub image: Option<String>,
    pub posted_tweet_time: String,
    pub likes: Vec<String>,
    pub retweets: Vec<String>,
    pub comments: Vec<CommentView>,
    pub is_retweeted: bool,
    pub retweeted_by_user: Option<String>,
    pub retweet_of: Option<Uuid>,
    pub is_edited: bool,
    pub like_tweet_btn: ButtonColor,
    pub retweet_btn: ButtonColor,
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

/// Expands author and comment references into views for one viewer,
/// memoizing author lookups for the lifetime of a request.
pub(crate) struct Expander<'a> {
    db: &'a Database,
    viewer: Option<&'a str>,
    authors: HashMap<Uuid, AuthorView>,
}

impl<'a> Expander<'a> {
    pub(crate) fn new(db: &'a Database, viewer: Option<&'a str>) -> Self {
        Self {
            db,
            viewer,
            authors: HashMap::new(),
        }
    }

    pub(crate) fn author(&mut self, id: Uuid) -> Result<AuthorView> {
        if let Some(author) = self.authors.get(&id) {
            return Ok(author.clone());
        }
        let user = self.db.get_user(id).map_err(missing("author"))?;
        let author = AuthorView::from(&user);
        self.authors.insert(id, author.clone());
        Ok(author)
    }

    pub(crate) fn comment(&mut self, comment: Comment) -> Result<CommentView> {
        let posted_by = self.author(comment.posted_by)?;
        Ok(CommentView {
            like_comment_btn: like_button(&comment.likes, self.viewer),
            id: comment.id,
            tweet_id: comment.tweet_id,
            content: comment.content,
            posted_by,
            posted_comment_time: comment.posted_comment_time,
            likes: comment.likes,
            is_edited: comment.is_edited,
        })
    }

    /// Expand a tweet, its author and every comment with its author.
    pub(crate) fn tweet(&mut self, tweet: Tweet) -> Result<TweetView> {
        let posted_by = self.author(tweet.posted_by)?;
        let comments = self
            .db
            .comments_for_tweet(tweet.id)?
            .into_iter()
            .map(|c| self.comment(c))
            .collect::<Result<Vec<_>>>()?;

        Ok(TweetView {
            like_tweet_btn: like_button(&tweet.likes, self.viewer),
            retweet_btn: retweet_button(&tweet.retweets, self.viewer),
            id: tweet.id,
            content: tweet.content,
            posted_by,
            image: tweet.image,
            posted_tweet_time: tweet.posted_tweet_time,
            likes: tweet.likes,
            retweets: tweet.retweets,
            comments,
            is_retweeted: tweet.is_retweeted,
            retweeted_by_user: tweet.retweeted_by_user,
            retweet_of: tweet.retweet_of,
            is_edited: tweet.is_edited,
        })
    }

    pub(crate) fn tweets(&mut self, tweets: Vec<Tweet>) -> Result<Vec<TweetView>> {
        tweets.into_iter().map(|t| self.tweet(t)).collect()
    }
}
