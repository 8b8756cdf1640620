//! Content store: [`Comment`] records and their like sets.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::database::{query_strings, timestamp_col, uuid_col, Database};
use crate::error::{not_found, Result, StoreError};
use crate::models::{display_timestamp, Comment};

const COMMENT_COLUMNS: &str =
    "id, tweet_id, content, posted_by, posted_comment_time, is_edited, created_at";

impl Database {
    /// Attach a new comment to a tweet.  The comment becomes the first entry
    /// of the tweet's comment list.
    ///
    /// Returns [`StoreError::NotFound`] if the tweet does not exist.
    pub fn insert_comment(&self, tweet_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment> {
        let exists: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM tweets WHERE id = ?1)",
            params![tweet_id.to_string()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StoreError::NotFound);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO comments
                 (id, tweet_id, content, posted_by, posted_comment_time, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                tweet_id.to_string(),
                content,
                author_id.to_string(),
                display_timestamp(now),
                now.to_rfc3339(),
            ],
        )?;

        tracing::debug!(comment = %id, tweet = %tweet_id, "comment inserted");

        self.get_comment(id)
    }

    /// Fetch a single comment by id.
    pub fn get_comment(&self, id: Uuid) -> Result<Comment> {
        let comment = self
            .conn()
            .query_row(
                &format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = ?1"),
                params![id.to_string()],
                row_to_comment,
            )
            .map_err(not_found)?;
        self.hydrate_comment(comment)
    }

    /// Comments of a tweet, most recent first.
    pub fn comments_for_tweet(&self, tweet_id: Uuid) -> Result<Vec<Comment>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE tweet_id = ?1 ORDER BY seq DESC"
        ))?;
        let rows = stmt.query_map(params![tweet_id.to_string()], row_to_comment)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(self.hydrate_comment(row?)?);
        }
        Ok(comments)
    }

    pub fn add_comment_like(&self, comment_id: Uuid, username: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO comment_likes (comment_id, username) VALUES (?1, ?2)",
            params![comment_id.to_string(), username],
        )?;
        Ok(affected > 0)
    }

    pub fn remove_comment_like(&self, comment_id: Uuid, username: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM comment_likes WHERE comment_id = ?1 AND username = ?2",
            params![comment_id.to_string(), username],
        )?;
        Ok(affected > 0)
    }

    /// Replace the content of a comment and flag it as edited.
    pub fn update_comment_content(&self, comment_id: Uuid, content: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE comments SET content = ?1, is_edited = 1 WHERE id = ?2",
            params![content, comment_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Delete a comment and its like set.  Returns `true` if it existed.
    pub fn delete_comment(&mut self, comment_id: Uuid) -> Result<bool> {
        let id = comment_id.to_string();
        let tx = self.conn_mut().transaction()?;
        tx.execute("DELETE FROM comment_likes WHERE comment_id = ?1", params![id])?;
        let affected = tx.execute("DELETE FROM comments WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(affected > 0)
    }

    fn hydrate_comment(&self, mut comment: Comment) -> Result<Comment> {
        comment.likes = query_strings(
            self.conn(),
            "SELECT username FROM comment_likes WHERE comment_id = ?1 ORDER BY seq ASC",
            params![comment.id.to_string()],
        )?;
        Ok(comment)
    }
}

/// Map a `rusqlite::Row` to a [`Comment`] with an empty like set.
fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let id_str: String = row.get(0)?;
    let tweet_id_str: String = row.get(1)?;
    let posted_by_str: String = row.get(3)?;
    let created_str: String = row.get(6)?;

    Ok(Comment {
        id: uuid_col(0, &id_str)?,
        tweet_id: uuid_col(1, &tweet_id_str)?,
        content: row.get(2)?,
        posted_by: uuid_col(3, &posted_by_str)?,
        posted_comment_time: row.get(4)?,
        likes: Vec::new(),
        is_edited: row.get(5)?,
        created_at: timestamp_col(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewTweet;

    fn setup() -> (Database, Uuid, Uuid) {
        let mut db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "h").unwrap();
        let tweet = db
            .insert_tweet(&NewTweet {
                content: "hello".into(),
                author_id: alice.id,
                author_username: alice.username.clone(),
                image: None,
            })
            .unwrap();
        (db, alice.id, tweet.id)
    }

    #[test]
    fn comments_are_most_recent_first_on_tweet() {
        let (db, alice, tweet) = setup();
        let first = db.insert_comment(tweet, alice, "first").unwrap();
        let second = db.insert_comment(tweet, alice, "second").unwrap();

        assert_eq!(db.get_tweet(tweet).unwrap().comments, vec![second.id, first.id]);
        let contents: Vec<_> = db
            .comments_for_tweet(tweet)
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["second", "first"]);
    }

    #[test]
    fn comment_on_missing_tweet_is_not_found() {
        let (db, alice, _) = setup();
        assert!(matches!(
            db.insert_comment(Uuid::new_v4(), alice, "x"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn comment_likes_toggle_membership() {
        let (db, alice, tweet) = setup();
        let comment = db.insert_comment(tweet, alice, "nice").unwrap();

        assert!(db.add_comment_like(comment.id, "bob").unwrap());
        assert!(!db.add_comment_like(comment.id, "bob").unwrap());
        assert_eq!(db.get_comment(comment.id).unwrap().likes, vec!["bob"]);
        assert!(db.remove_comment_like(comment.id, "bob").unwrap());
        assert!(db.get_comment(comment.id).unwrap().likes.is_empty());
    }

    #[test]
    fn edit_and_delete_comment() {
        let (mut db, alice, tweet) = setup();
        let comment = db.insert_comment(tweet, alice, "typo").unwrap();

        assert!(db.update_comment_content(comment.id, "fixed").unwrap());
        let loaded = db.get_comment(comment.id).unwrap();
        assert_eq!(loaded.content, "fixed");
        assert!(loaded.is_edited);

        assert!(db.delete_comment(comment.id).unwrap());
        assert!(!db.delete_comment(comment.id).unwrap());
        assert!(db.get_tweet(tweet).unwrap().comments.is_empty());
    }
}
