//! Content store: [`Tweet`] records, their like/retweet sets and retweet-copies.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::{query_strings, query_uuids, timestamp_col, uuid_col, Database};
use crate::error::{not_found, Result};
use crate::models::{display_timestamp, NewTweet, Tweet};
use crate::users::prepend_tweet_index;

const TWEET_COLUMNS: &str = "t.id, t.content, t.posted_by, t.image, t.posted_tweet_time, \
     t.is_retweeted, t.retweeted_by_user, t.retweet_of, t.is_edited, t.created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new original tweet and push it to the front of its author's
    /// tweet index.
    pub fn insert_tweet(&mut self, new: &NewTweet) -> Result<Tweet> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT INTO tweets
                 (id, content, posted_by, image, posted_tweet_time, is_retweeted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                id.to_string(),
                new.content,
                new.author_id.to_string(),
                new.image,
                display_timestamp(now),
                now.to_rfc3339(),
            ],
        )?;
        prepend_tweet_index(&tx, &new.author_username, id)?;
        tx.commit()?;

        tracing::debug!(tweet = %id, author = %new.author_username, "tweet inserted");

        self.get_tweet(id)
    }

    /// Create (or reuse) `actor`'s retweet-copy of `original` and record the
    /// retweet on the original, in a single transaction.
    ///
    /// The copy shares the original's content, author, image, display time
    /// and a snapshot of its likes.  If a copy by `actor` already exists it is
    /// returned instead of creating a second one.
    pub fn create_retweet(&mut self, original: &Tweet, actor: &str) -> Result<Tweet> {
        let tx = self.conn_mut().transaction()?;

        let copy_id = match find_retweet_copy(&tx, original.id, actor)? {
            Some(existing) => {
                tracing::warn!(
                    tweet = %original.id,
                    copy = %existing,
                    actor = %actor,
                    "reusing existing retweet copy"
                );
                existing
            }
            None => {
                let copy_id = Uuid::new_v4();
                tx.execute(
                    "INSERT INTO tweets
                         (id, content, posted_by, image, posted_tweet_time, is_retweeted,
                          retweeted_by_user, retweet_of, is_edited, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?8, ?9)",
                    params![
                        copy_id.to_string(),
                        original.content,
                        original.posted_by.to_string(),
                        original.image,
                        original.posted_tweet_time,
                        actor,
                        original.id.to_string(),
                        original.is_edited,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                for liker in &original.likes {
                    tx.execute(
                        "INSERT OR IGNORE INTO tweet_likes (tweet_id, username) VALUES (?1, ?2)",
                        params![copy_id.to_string(), liker],
                    )?;
                }
                tx.execute(
                    "INSERT INTO tweet_retweets (tweet_id, username) VALUES (?1, ?2)",
                    params![copy_id.to_string(), actor],
                )?;
                prepend_tweet_index(&tx, actor, copy_id)?;
                copy_id
            }
        };

        tx.execute(
            "INSERT OR IGNORE INTO tweet_retweets (tweet_id, username) VALUES (?1, ?2)",
            params![original.id.to_string(), actor],
        )?;
        tx.commit()?;

        self.get_tweet(copy_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single tweet by id.
    pub fn get_tweet(&self, id: Uuid) -> Result<Tweet> {
        let tweet = self
            .conn()
            .query_row(
                &format!("SELECT {TWEET_COLUMNS} FROM tweets t WHERE t.id = ?1"),
                params![id.to_string()],
                row_to_tweet,
            )
            .map_err(not_found)?;
        self.hydrate_tweet(tweet)
    }

    /// A page of original tweets (retweet-copies excluded), newest first.
    pub fn list_feed(&self, limit: u32, offset: u32) -> Result<Vec<Tweet>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TWEET_COLUMNS} FROM tweets t
             WHERE t.is_retweeted = 0
             ORDER BY t.seq DESC
             LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, offset], row_to_tweet)?;
        self.collect_tweets(rows)
    }

    /// Tweets referenced by `username`'s tweet index, most recent first.
    /// Index entries whose tweet no longer exists are skipped.
    pub fn tweets_in_index(&self, username: &str) -> Result<Vec<Tweet>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {TWEET_COLUMNS} FROM user_tweets ut
             JOIN tweets t ON t.id = ut.tweet_id
             WHERE ut.username = ?1
             ORDER BY ut.seq DESC"
        ))?;
        let rows = stmt.query_map(params![username], row_to_tweet)?;
        self.collect_tweets(rows)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Add `username` to the tweet's like set.  Returns `false` if it was
    /// already present.
    pub fn add_tweet_like(&self, tweet_id: Uuid, username: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO tweet_likes (tweet_id, username) VALUES (?1, ?2)",
            params![tweet_id.to_string(), username],
        )?;
        Ok(affected > 0)
    }

    /// Remove `username` from the tweet's like set.
    pub fn remove_tweet_like(&self, tweet_id: Uuid, username: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM tweet_likes WHERE tweet_id = ?1 AND username = ?2",
            params![tweet_id.to_string(), username],
        )?;
        Ok(affected > 0)
    }

    /// Replace the content of a tweet and flag it as edited.
    pub fn update_tweet_content(&self, tweet_id: Uuid, content: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE tweets SET content = ?1, is_edited = 1 WHERE id = ?2",
            params![content, tweet_id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete `actor`'s retweet-copy of `original_id` and remove `actor` from
    /// the original's retweet set, in a single transaction.
    ///
    /// Returns the id of the deleted copy, or `None` if no copy existed (the
    /// membership is removed either way).
    pub fn remove_retweet(&mut self, original_id: Uuid, actor: &str) -> Result<Option<Uuid>> {
        let tx = self.conn_mut().transaction()?;

        let copy = find_retweet_copy(&tx, original_id, actor)?;
        if let Some(copy_id) = copy {
            purge_tweet(&tx, copy_id)?;
        }
        tx.execute(
            "DELETE FROM tweet_retweets WHERE tweet_id = ?1 AND username = ?2",
            params![original_id.to_string(), actor],
        )?;
        tx.commit()?;

        Ok(copy)
    }

    /// Delete a tweet together with its engagement sets, comments, index
    /// entries and, for an original, every retweet-copy of it.  Deleting a
    /// copy also withdraws its retweeter from the original's retweet set.
    ///
    /// Returns `true` if the tweet existed.
    pub fn delete_tweet(&mut self, tweet_id: Uuid) -> Result<bool> {
        let tx = self.conn_mut().transaction()?;

        let copy_link: Option<(Option<String>, Option<String>)> = tx
            .query_row(
                "SELECT retweet_of, retweeted_by_user FROM tweets WHERE id = ?1",
                params![tweet_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((retweet_of, retweeted_by)) = copy_link else {
            return Ok(false);
        };

        if let (Some(original), Some(user)) = (retweet_of, retweeted_by) {
            tx.execute(
                "DELETE FROM tweet_retweets WHERE tweet_id = ?1 AND username = ?2",
                params![original, user],
            )?;
        }

        let copies = query_uuids(
            &tx,
            "SELECT id FROM tweets WHERE retweet_of = ?1",
            params![tweet_id.to_string()],
        )?;
        for copy_id in copies {
            purge_tweet(&tx, copy_id)?;
        }
        purge_tweet(&tx, tweet_id)?;
        tx.commit()?;

        tracing::debug!(tweet = %tweet_id, "tweet deleted");
        Ok(true)
    }

    fn collect_tweets(
        &self,
        rows: impl Iterator<Item = rusqlite::Result<Tweet>>,
    ) -> Result<Vec<Tweet>> {
        let mut tweets = Vec::new();
        for row in rows {
            tweets.push(self.hydrate_tweet(row?)?);
        }
        Ok(tweets)
    }

    fn hydrate_tweet(&self, mut tweet: Tweet) -> Result<Tweet> {
        let id = tweet.id.to_string();
        tweet.likes = query_strings(
            self.conn(),
            "SELECT username FROM tweet_likes WHERE tweet_id = ?1 ORDER BY seq ASC",
            params![id],
        )?;
        tweet.retweets = query_strings(
            self.conn(),
            "SELECT username FROM tweet_retweets WHERE tweet_id = ?1 ORDER BY seq ASC",
            params![id],
        )?;
        tweet.comments = query_uuids(
            self.conn(),
            "SELECT id FROM comments WHERE tweet_id = ?1 ORDER BY seq DESC",
            params![id],
        )?;
        Ok(tweet)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn find_retweet_copy(conn: &Connection, original_id: Uuid, username: &str) -> Result<Option<Uuid>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM tweets
             WHERE retweet_of = ?1 AND retweeted_by_user = ?2 AND is_retweeted = 1
             ORDER BY seq ASC
             LIMIT 1",
            params![original_id.to_string(), username],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id.map(|s| Uuid::parse_str(&s)).transpose()?)
}

/// Remove a tweet row and everything hanging off it.
fn purge_tweet(conn: &Connection, tweet_id: Uuid) -> Result<()> {
    let id = tweet_id.to_string();
    conn.execute(
        "DELETE FROM comment_likes
         WHERE comment_id IN (SELECT id FROM comments WHERE tweet_id = ?1)",
        params![id],
    )?;
    conn.execute("DELETE FROM comments WHERE tweet_id = ?1", params![id])?;
    conn.execute("DELETE FROM tweet_likes WHERE tweet_id = ?1", params![id])?;
    conn.execute("DELETE FROM tweet_retweets WHERE tweet_id = ?1", params![id])?;
    conn.execute("DELETE FROM user_tweets WHERE tweet_id = ?1", params![id])?;
    conn.execute("DELETE FROM tweets WHERE id = ?1", params![id])?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`Tweet`] with empty sets.
fn row_to_tweet(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tweet> {
    let id_str: String = row.get(0)?;
    let posted_by_str: String = row.get(2)?;
    let retweet_of_str: Option<String> = row.get(7)?;
    let created_str: String = row.get(9)?;

    Ok(Tweet {
        id: uuid_col(0, &id_str)?,
        content: row.get(1)?,
        posted_by: uuid_col(2, &posted_by_str)?,
        image: row.get(3)?,
        posted_tweet_time: row.get(4)?,
        likes: Vec::new(),
        retweets: Vec::new(),
        comments: Vec::new(),
        is_retweeted: row.get(5)?,
        retweeted_by_user: row.get(6)?,
        retweet_of: retweet_of_str.map(|s| uuid_col(7, &s)).transpose()?,
        is_edited: row.get(8)?,
        created_at: timestamp_col(9, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;

    fn setup() -> (Database, crate::User) {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", "h").unwrap();
        (db, alice)
    }

    fn post(db: &mut Database, author: &crate::User, content: &str) -> Tweet {
        db.insert_tweet(&NewTweet {
            content: content.to_string(),
            author_id: author.id,
            author_username: author.username.clone(),
            image: None,
        })
        .unwrap()
    }

    #[test]
    fn insert_prepends_to_author_index() {
        let (mut db, alice) = setup();
        let first = post(&mut db, &alice, "one");
        let second = post(&mut db, &alice, "two");

        assert!(!first.is_retweeted);
        assert!(first.likes.is_empty());
        assert_eq!(db.tweet_index("alice").unwrap(), vec![second.id, first.id]);
    }

    #[test]
    fn feed_is_newest_first_with_offset() {
        let (mut db, alice) = setup();
        let ids: Vec<Uuid> = (0..5).map(|i| post(&mut db, &alice, &i.to_string()).id).collect();

        let page: Vec<Uuid> = db.list_feed(2, 1).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(page, vec![ids[3], ids[2]]);
    }

    #[test]
    fn likes_are_a_set() {
        let (mut db, alice) = setup();
        let tweet = post(&mut db, &alice, "hello");

        assert!(db.add_tweet_like(tweet.id, "bob").unwrap());
        assert!(!db.add_tweet_like(tweet.id, "bob").unwrap());
        assert_eq!(db.get_tweet(tweet.id).unwrap().likes, vec!["bob"]);

        assert!(db.remove_tweet_like(tweet.id, "bob").unwrap());
        assert!(db.get_tweet(tweet.id).unwrap().likes.is_empty());
    }

    #[test]
    fn retweet_copy_is_excluded_from_feed_and_indexed_for_retweeter() {
        let (mut db, alice) = setup();
        db.create_user("carol", "h").unwrap();
        let original = post(&mut db, &alice, "hello");
        db.add_tweet_like(original.id, "bob").unwrap();
        let original = db.get_tweet(original.id).unwrap();

        let copy = db.create_retweet(&original, "carol").unwrap();
        assert!(copy.is_retweeted);
        assert_eq!(copy.retweeted_by_user.as_deref(), Some("carol"));
        assert_eq!(copy.retweet_of, Some(original.id));
        assert_eq!(copy.retweets, vec!["carol"]);
        assert_eq!(copy.likes, vec!["bob"]);
        assert_eq!(copy.posted_by, alice.id);

        assert_eq!(db.get_tweet(original.id).unwrap().retweets, vec!["carol"]);
        assert_eq!(db.tweet_index("carol").unwrap(), vec![copy.id]);

        let feed: Vec<Uuid> = db.list_feed(20, 0).unwrap().iter().map(|t| t.id).collect();
        assert_eq!(feed, vec![original.id]);
    }

    #[test]
    fn create_retweet_reuses_existing_copy() {
        let (mut db, alice) = setup();
        let original = post(&mut db, &alice, "hello");

        let first = db.create_retweet(&original, "carol").unwrap();
        let second = db.create_retweet(&original, "carol").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(db.tweet_index("carol").unwrap(), vec![first.id]);
    }

    #[test]
    fn remove_retweet_deletes_copy_and_membership() {
        let (mut db, alice) = setup();
        let original = post(&mut db, &alice, "hello");
        let copy = db.create_retweet(&original, "carol").unwrap();

        assert_eq!(db.remove_retweet(original.id, "carol").unwrap(), Some(copy.id));
        assert!(matches!(db.get_tweet(copy.id), Err(StoreError::NotFound)));
        assert!(db.get_tweet(original.id).unwrap().retweets.is_empty());
        assert!(db.tweet_index("carol").unwrap().is_empty());

        assert_eq!(db.remove_retweet(original.id, "carol").unwrap(), None);
    }

    #[test]
    fn delete_original_removes_copies_and_index_entries() {
        let (mut db, alice) = setup();
        let original = post(&mut db, &alice, "hello");
        let copy = db.create_retweet(&original, "carol").unwrap();

        assert!(db.delete_tweet(original.id).unwrap());
        assert!(matches!(db.get_tweet(copy.id), Err(StoreError::NotFound)));
        assert!(db.tweet_index("alice").unwrap().is_empty());
        assert!(db.tweet_index("carol").unwrap().is_empty());
        assert!(!db.delete_tweet(original.id).unwrap());
    }

    #[test]
    fn delete_copy_withdraws_retweet_membership() {
        let (mut db, alice) = setup();
        let original = post(&mut db, &alice, "hello");
        let copy = db.create_retweet(&original, "carol").unwrap();

        assert!(db.delete_tweet(copy.id).unwrap());
        assert!(db.get_tweet(original.id).unwrap().retweets.is_empty());
    }

    #[test]
    fn tweets_in_index_skips_dangling_entries() {
        let (mut db, alice) = setup();
        let tweet = post(&mut db, &alice, "kept");
        prepend_tweet_index(db.conn(), "alice", Uuid::new_v4()).unwrap();

        let ids: Vec<Uuid> = db
            .tweets_in_index("alice")
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec![tweet.id]);
    }

    #[test]
    fn update_content_marks_edited() {
        let (mut db, alice) = setup();
        let tweet = post(&mut db, &alice, "draft");

        assert!(db.update_tweet_content(tweet.id, "final").unwrap());
        let loaded = db.get_tweet(tweet.id).unwrap();
        assert_eq!(loaded.content, "final");
        assert!(loaded.is_edited);
        assert!(!db.update_tweet_content(Uuid::new_v4(), "x").unwrap());
    }
}
