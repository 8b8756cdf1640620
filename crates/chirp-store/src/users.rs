//! Identity store: [`User`] records, follower sets and per-user tweet index.

use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::database::{query_strings, query_uuids, timestamp_col, uuid_col, Database};
use crate::error::{is_constraint_violation, not_found, Result, StoreError};
use crate::models::{User, DEFAULT_AVATAR};

const USER_COLUMNS: &str = "id, username, password_hash, avatar, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user.  The username is lowercased before storage.
    ///
    /// Returns [`StoreError::Conflict`] when the (lowercased) username is
    /// already taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> Result<User> {
        let username = username.to_lowercase();
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.conn()
            .execute(
                "INSERT INTO users (id, username, password_hash, avatar, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    username,
                    password_hash,
                    DEFAULT_AVATAR,
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Conflict(format!("username '{username}' already taken"))
                } else {
                    StoreError::Sqlite(e)
                }
            })?;

        tracing::debug!(user = %username, id = %id, "user created");

        Ok(User {
            id,
            username,
            password_hash: password_hash.to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
            tweets: Vec::new(),
            followers: Vec::new(),
            created_at: now,
        })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a user by exact (case-sensitive) username.
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
                params![username],
                row_to_user,
            )
            .map_err(not_found)?;
        self.hydrate_user(user)
    }

    /// Fetch a user by id.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        let user = self
            .conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
                row_to_user,
            )
            .map_err(not_found)?;
        self.hydrate_user(user)
    }

    /// Case-insensitive literal substring search over usernames, ordered by
    /// username.
    pub fn search_users(&self, fragment: &str) -> Result<Vec<User>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users
             WHERE instr(username, ?1) > 0
             ORDER BY username ASC"
        ))?;
        let rows = stmt.query_map(params![fragment.to_lowercase()], row_to_user)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(self.hydrate_user(row?)?);
        }
        Ok(users)
    }

    /// Usernames following `username`, in follow order.
    pub fn followers_of(&self, username: &str) -> Result<Vec<String>> {
        query_strings(
            self.conn(),
            "SELECT follower FROM followers WHERE username = ?1 ORDER BY seq ASC",
            params![username],
        )
    }

    /// Tweet ids in `username`'s index, most recent first.
    pub fn tweet_index(&self, username: &str) -> Result<Vec<Uuid>> {
        query_uuids(
            self.conn(),
            "SELECT tweet_id FROM user_tweets WHERE username = ?1 ORDER BY seq DESC",
            params![username],
        )
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace a user's avatar.  Returns `true` if a row was updated.
    pub fn set_avatar(&self, username: &str, avatar: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE users SET avatar = ?1 WHERE username = ?2",
            params![avatar, username],
        )?;
        Ok(affected > 0)
    }

    /// Add `follower` to `username`'s follower set.  Returns `false` if it
    /// was already present.
    pub fn add_follower(&self, username: &str, follower: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO followers (username, follower, created_at)
             VALUES (?1, ?2, ?3)",
            params![username, follower, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Remove `follower` from `username`'s follower set.  Returns `false` if
    /// it was not present.
    pub fn remove_follower(&self, username: &str, follower: &str) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM followers WHERE username = ?1 AND follower = ?2",
            params![username, follower],
        )?;
        Ok(affected > 0)
    }

    fn hydrate_user(&self, mut user: User) -> Result<User> {
        user.tweets = self.tweet_index(&user.username)?;
        user.followers = self.followers_of(&user.username)?;
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Push `tweet_id` to the front of `username`'s tweet index.
pub(crate) fn prepend_tweet_index(conn: &Connection, username: &str, tweet_id: Uuid) -> Result<()> {
    conn.execute(
        "INSERT INTO user_tweets (username, tweet_id) VALUES (?1, ?2)",
        params![username, tweet_id.to_string()],
    )?;
    Ok(())
}

/// Map a `rusqlite::Row` to a [`User`] with empty sets.
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let created_str: String = row.get(4)?;

    Ok(User {
        id: uuid_col(0, &id_str)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        avatar: row.get(3)?,
        tweets: Vec::new(),
        followers: Vec::new(),
        created_at: timestamp_col(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn create_user_lowercases_and_sets_default_avatar() {
        let db = db();
        let user = db.create_user("Dave", "hash").unwrap();
        assert_eq!(user.username, "dave");
        assert_eq!(user.avatar, DEFAULT_AVATAR);

        let loaded = db.get_user_by_username("dave").unwrap();
        assert_eq!(loaded.id, user.id);
        assert!(matches!(
            db.get_user_by_username("Dave"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn duplicate_username_conflicts_case_insensitively() {
        let db = db();
        db.create_user("alice", "h1").unwrap();
        let err = db.create_user("ALICE", "h2").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn get_user_by_id() {
        let db = db();
        let user = db.create_user("bob", "h").unwrap();
        assert_eq!(db.get_user(user.id).unwrap().username, "bob");
        assert!(matches!(db.get_user(Uuid::new_v4()), Err(StoreError::NotFound)));
    }

    #[test]
    fn followers_are_a_set_in_follow_order() {
        let db = db();
        db.create_user("alice", "h").unwrap();

        assert!(db.add_follower("alice", "bob").unwrap());
        assert!(db.add_follower("alice", "carol").unwrap());
        assert!(!db.add_follower("alice", "bob").unwrap());
        assert_eq!(db.followers_of("alice").unwrap(), vec!["bob", "carol"]);

        assert!(db.remove_follower("alice", "bob").unwrap());
        assert!(!db.remove_follower("alice", "bob").unwrap());
        assert_eq!(
            db.get_user_by_username("alice").unwrap().followers,
            vec!["carol"]
        );
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let db = db();
        db.create_user("alice", "h").unwrap();
        db.create_user("malice", "h").unwrap();
        db.create_user("bob", "h").unwrap();

        let names: Vec<_> = db
            .search_users("LIC")
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["alice", "malice"]);

        // Pattern characters are matched literally.
        assert!(db.search_users("%").unwrap().is_empty());
    }

    #[test]
    fn set_avatar_updates_existing_user_only() {
        let db = db();
        db.create_user("alice", "h").unwrap();
        assert!(db.set_avatar("alice", "https://example.com/a.png").unwrap());
        assert!(!db.set_avatar("nobody", "x.png").unwrap());
        assert_eq!(
            db.get_user_by_username("alice").unwrap().avatar,
            "https://example.com/a.png"
        );
    }

    #[test]
    fn tweet_index_is_most_recent_first() {
        let db = db();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        prepend_tweet_index(db.conn(), "alice", a).unwrap();
        prepend_tweet_index(db.conn(), "alice", b).unwrap();
        assert_eq!(db.tweet_index("alice").unwrap(), vec![b, a]);
    }
}
