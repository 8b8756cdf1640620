//! Compose, edit and delete tweets and comments.

use chirp_store::{Database, NewTweet};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{missing, EngineError, Result};
use crate::view::{CommentView, Expander, TweetView};

/// Maximum length of a tweet or comment, in characters.
pub const MAX_CONTENT_CHARS: usize = 280;

/// Result of posting a comment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentPosted {
    /// Number of comments on the tweet after posting.
    pub comments: usize,
    pub comment: CommentView,
}

fn validate_content(content: &str, allow_empty: bool) -> Result<String> {
    let content = content.trim();
    if content.is_empty() && !allow_empty {
        return Err(EngineError::Validation("content must not be empty".into()));
    }
    let len = content.chars().count();
    if len > MAX_CONTENT_CHARS {
        return Err(EngineError::Validation(format!(
            "content is {len} characters (max {MAX_CONTENT_CHARS})"
        )));
    }
    Ok(content.to_string())
}

/// Post a new tweet by `author`.  A tweet may omit text when it carries an
/// image.  Returns the expanded tweet as seen by its author.
pub fn compose_tweet(
    db: &mut Database,
    author: &str,
    content: &str,
    image: Option<String>,
) -> Result<TweetView> {
    let image = image.filter(|i| !i.trim().is_empty());
    let content = validate_content(content, image.is_some())?;
    let user = db.get_user_by_username(author).map_err(missing("user"))?;

    let tweet = db.insert_tweet(&NewTweet {
        content,
        author_id: user.id,
        author_username: user.username.clone(),
        image,
    })?;
    info!(tweet = %tweet.id, author = %user.username, "tweet posted");

    Expander::new(db, Some(author)).tweet(tweet)
}

/// Post a comment by `author` on a tweet.
pub fn compose_comment(
    db: &Database,
    author: &str,
    tweet_id: Uuid,
    content: &str,
) -> Result<CommentPosted> {
    let content = validate_content(content, false)?;
    let user = db.get_user_by_username(author).map_err(missing("user"))?;

    let comment = db
        .insert_comment(tweet_id, user.id, &content)
        .map_err(missing("tweet"))?;
    let comments = db.get_tweet(tweet_id).map_err(missing("tweet"))?.comments.len();
    info!(comment = %comment.id, tweet = %tweet_id, author = %author, "comment posted");

    Ok(CommentPosted {
        comments,
        comment: Expander::new(db, Some(author)).comment(comment)?,
    })
}

/// Load a tweet that `actor` is allowed to modify directly.
fn owned_original(db: &Database, actor: &str, tweet_id: Uuid) -> Result<chirp_store::Tweet> {
    let tweet = db.get_tweet(tweet_id).map_err(missing("tweet"))?;
    if tweet.is_retweeted {
        return Err(EngineError::Validation(
            "retweets are undone by toggling the retweet".into(),
        ));
    }
    let author = db.get_user(tweet.posted_by).map_err(missing("author"))?;
    if author.username != actor {
        return Err(EngineError::Forbidden(format!(
            "{actor} is not the author of this tweet"
        )));
    }
    Ok(tweet)
}

/// Replace a tweet's content.  Only the author may edit, and the change does
/// not reach existing retweet-copies.
pub fn edit_tweet(db: &Database, actor: &str, tweet_id: Uuid, content: &str) -> Result<()> {
    let tweet = owned_original(db, actor, tweet_id)?;
    let content = validate_content(content, tweet.image.is_some())?;
    db.update_tweet_content(tweet_id, &content)?;
    info!(tweet = %tweet_id, actor = %actor, "tweet edited");
    Ok(())
}

/// Delete a tweet and everything attached to it.  Only the author may delete.
pub fn delete_tweet(db: &mut Database, actor: &str, tweet_id: Uuid) -> Result<()> {
    owned_original(db, actor, tweet_id)?;
    db.delete_tweet(tweet_id)?;
    info!(tweet = %tweet_id, actor = %actor, "tweet deleted");
    Ok(())
}

/// Replace a comment's content.  Only the comment's author may edit.
pub fn edit_comment(db: &Database, actor: &str, comment_id: Uuid, content: &str) -> Result<()> {
    let comment = db.get_comment(comment_id).map_err(missing("comment"))?;
    let author = db.get_user(comment.posted_by).map_err(missing("author"))?;
    if author.username != actor {
        return Err(EngineError::Forbidden(format!(
            "{actor} is not the author of this comment"
        )));
    }

    let content = validate_content(content, false)?;
    db.update_comment_content(comment_id, &content)?;
    info!(comment = %comment_id, actor = %actor, "comment edited");
    Ok(())
}

/// Delete a comment.  Allowed for the comment's author and for the author of
/// the tweet it is attached to.
pub fn delete_comment(db: &mut Database, actor: &str, comment_id: Uuid) -> Result<()> {
    let comment = db.get_comment(comment_id).map_err(missing("comment"))?;
    let comment_author = db.get_user(comment.posted_by).map_err(missing("author"))?;

    let allowed = comment_author.username == actor || {
        let tweet = db.get_tweet(comment.tweet_id).map_err(missing("tweet"))?;
        db.get_user(tweet.posted_by).map_err(missing("author"))?.username == actor
    };
    if !allowed {
        return Err(EngineError::Forbidden(format!(
            "{actor} may not delete this comment"
        )));
    }

    db.delete_comment(comment_id)?;
    info!(comment = %comment_id, actor = %actor, "comment deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{db_with_users, tweet};
    use crate::ButtonColor;

    #[test]
    fn compose_prepends_to_author_index() {
        let mut db = db_with_users(&["alice"]);
        let first = tweet(&mut db, "alice", "one");
        let second = tweet(&mut db, "alice", "  two  ");

        assert_eq!(second.content, "two");
        assert_eq!(second.posted_by.username, "alice");
        assert_eq!(second.like_tweet_btn, ButtonColor::Black);
        assert_eq!(db.tweet_index("alice").unwrap(), vec![second.id, first.id]);
    }

    #[test]
    fn empty_tweet_requires_image() {
        let mut db = db_with_users(&["alice"]);
        assert!(matches!(
            compose_tweet(&mut db, "alice", "   ", None),
            Err(EngineError::Validation(_))
        ));

        let view = compose_tweet(&mut db, "alice", "", Some("/tweetImages/a.png".into())).unwrap();
        assert_eq!(view.image.as_deref(), Some("/tweetImages/a.png"));
    }

    #[test]
    fn overlong_content_rejected() {
        let mut db = db_with_users(&["alice"]);
        let long = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(matches!(
            compose_tweet(&mut db, "alice", &long, None),
            Err(EngineError::Validation(_))
        ));
        assert!(compose_tweet(&mut db, "alice", &"é".repeat(MAX_CONTENT_CHARS), None).is_ok());
    }

    #[test]
    fn compose_comment_counts_and_expands_author() {
        let mut db = db_with_users(&["alice", "bob"]);
        let t = tweet(&mut db, "alice", "hello");

        compose_comment(&db, "bob", t.id, "hi").unwrap();
        let posted = compose_comment(&db, "alice", t.id, "hey bob").unwrap();
        assert_eq!(posted.comments, 2);
        assert_eq!(posted.comment.posted_by.username, "alice");
        assert_eq!(posted.comment.like_comment_btn, ButtonColor::Black);
    }

    #[test]
    fn comment_on_missing_tweet_is_not_found() {
        let db = db_with_users(&["bob"]);
        assert!(matches!(
            compose_comment(&db, "bob", Uuid::new_v4(), "hi"),
            Err(EngineError::NotFound("tweet"))
        ));
    }

    #[test]
    fn only_author_edits_tweet() {
        let mut db = db_with_users(&["alice", "bob"]);
        let t = tweet(&mut db, "alice", "draft");

        assert!(matches!(
            edit_tweet(&db, "bob", t.id, "hijacked"),
            Err(EngineError::Forbidden(_))
        ));
        edit_tweet(&db, "alice", t.id, "final").unwrap();

        let stored = db.get_tweet(t.id).unwrap();
        assert_eq!(stored.content, "final");
        assert!(stored.is_edited);
    }

    #[test]
    fn retweet_copy_cannot_be_edited_or_deleted() {
        let mut db = db_with_users(&["alice", "carol"]);
        let t = tweet(&mut db, "alice", "hello");
        let copy = crate::engagement::toggle_retweet(&mut db, "carol", t.id)
            .unwrap()
            .copy_id
            .unwrap();

        assert!(matches!(
            edit_tweet(&db, "alice", copy, "x"),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            delete_tweet(&mut db, "carol", copy),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn delete_tweet_by_author() {
        let mut db = db_with_users(&["alice", "bob"]);
        let t = tweet(&mut db, "alice", "bye");

        assert!(matches!(
            delete_tweet(&mut db, "bob", t.id),
            Err(EngineError::Forbidden(_))
        ));
        delete_tweet(&mut db, "alice", t.id).unwrap();
        assert!(db.tweet_index("alice").unwrap().is_empty());
        assert!(matches!(
            delete_tweet(&mut db, "alice", t.id),
            Err(EngineError::NotFound("tweet"))
        ));
    }

    #[test]
    fn comment_edit_and_delete_permissions() {
        let mut db = db_with_users(&["alice", "bob", "carol"]);
        let t = tweet(&mut db, "alice", "hello");
        let c = compose_comment(&db, "bob", t.id, "hi").unwrap().comment;

        assert!(matches!(
            edit_comment(&db, "alice", c.id, "x"),
            Err(EngineError::Forbidden(_))
        ));
        edit_comment(&db, "bob", c.id, "hello!").unwrap();
        assert!(db.get_comment(c.id).unwrap().is_edited);

        assert!(matches!(
            delete_comment(&mut db, "carol", c.id),
            Err(EngineError::Forbidden(_))
        ));
        // The tweet's author may remove comments on it.
        delete_comment(&mut db, "alice", c.id).unwrap();
        assert!(db.get_tweet(t.id).unwrap().comments.is_empty());
    }
}
