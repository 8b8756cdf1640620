//! v001 -- Initial schema creation.
//!
//! Records (`users`, `tweets`, `comments`) carry an autoincrement `seq`
//! column that fixes creation order.  Sets and ordered index lists live in
//! their own membership tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    seq           INTEGER PRIMARY KEY AUTOINCREMENT,
    id            TEXT NOT NULL UNIQUE,        -- UUID v4
    username      TEXT NOT NULL UNIQUE,        -- lowercase
    password_hash TEXT NOT NULL,               -- PHC string
    avatar        TEXT NOT NULL,               -- filename or URL
    created_at    TEXT NOT NULL                -- RFC-3339
);

-- Followers are stored on the followed user only.
CREATE TABLE IF NOT EXISTS followers (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT NOT NULL,                  -- the followed user
    follower   TEXT NOT NULL,                  -- the following user
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_followers_unique ON followers(username, follower);

-- Per-user tweet index, newest entry has the highest seq.
CREATE TABLE IF NOT EXISTS user_tweets (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    tweet_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_user_tweets_username ON user_tweets(username, seq DESC);
CREATE INDEX IF NOT EXISTS idx_user_tweets_tweet ON user_tweets(tweet_id);

-- ----------------------------------------------------------------
-- Tweets (originals and retweet-copies)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tweets (
    seq               INTEGER PRIMARY KEY AUTOINCREMENT,
    id                TEXT NOT NULL UNIQUE,   -- UUID v4
    content           TEXT NOT NULL,
    posted_by         TEXT NOT NULL,          -- users(id)
    image             TEXT,
    posted_tweet_time TEXT NOT NULL,          -- display timestamp
    is_retweeted      INTEGER NOT NULL DEFAULT 0,
    retweeted_by_user TEXT,
    retweet_of        TEXT,                   -- tweets(id) of the original
    is_edited         INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tweets_feed ON tweets(is_retweeted, seq DESC);
CREATE INDEX IF NOT EXISTS idx_tweets_retweet_of ON tweets(retweet_of, retweeted_by_user);

CREATE TABLE IF NOT EXISTS tweet_likes (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    tweet_id TEXT NOT NULL,
    username TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tweet_likes_unique ON tweet_likes(tweet_id, username);

CREATE TABLE IF NOT EXISTS tweet_retweets (
    seq      INTEGER PRIMARY KEY AUTOINCREMENT,
    tweet_id TEXT NOT NULL,
    username TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tweet_retweets_unique ON tweet_retweets(tweet_id, username);

-- ----------------------------------------------------------------
-- Comments
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS comments (
    seq                 INTEGER PRIMARY KEY AUTOINCREMENT,
    id                  TEXT NOT NULL UNIQUE,  -- UUID v4
    tweet_id            TEXT NOT NULL,         -- tweets(id)
    content             TEXT NOT NULL,
    posted_by           TEXT NOT NULL,         -- users(id)
    posted_comment_time TEXT NOT NULL,
    is_edited           INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_comments_tweet ON comments(tweet_id, seq DESC);

CREATE TABLE IF NOT EXISTS comment_likes (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    comment_id TEXT NOT NULL,
    username   TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_comment_likes_unique ON comment_likes(comment_id, username);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
