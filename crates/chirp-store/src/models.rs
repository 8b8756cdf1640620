//! Domain model structs persisted in the SQLite database.
//!
//! Sets such as `likes` or `followers` are materialized from their membership
//! tables whenever a record is loaded, in insertion order.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Avatar assigned to every account at signup.
pub const DEFAULT_AVATAR: &str = "initial-avatar.png";

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    /// Unique, lowercase.
    pub username: String,
    /// PHC-format password hash.
    pub password_hash: String,
    /// Filename under the avatar directory, or an absolute URL.
    pub avatar: String,
    /// Tweet index, most recent first.  Includes retweet-copies.
    pub tweets: Vec<Uuid>,
    /// Usernames following this user.
    pub followers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tweet
// ---------------------------------------------------------------------------

/// A tweet.  Retweets are stored as independent copies of the original with
/// `is_retweeted` set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tweet {
    pub id: Uuid,
    pub content: String,
    /// Author's user id.
    pub posted_by: Uuid,
    /// Path under `/tweetImages` or an external URL.
    pub image: Option<String>,
    /// Human-readable creation time, e.g. "October 16th 2026, 3:04:05 pm".
    pub posted_tweet_time: String,
    /// Usernames who liked this record.
    pub likes: Vec<String>,
    /// Usernames who retweeted this record.
    pub retweets: Vec<String>,
    /// Comment ids, most recent first.
    pub comments: Vec<Uuid>,
    /// `true` only on retweet-copies.
    pub is_retweeted: bool,
    /// Set only on retweet-copies.
    pub retweeted_by_user: Option<String>,
    /// Id of the original, set only on retweet-copies.
    pub retweet_of: Option<Uuid>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for [`Database::insert_tweet`](crate::Database::insert_tweet).
#[derive(Debug, Clone)]
pub struct NewTweet {
    pub content: String,
    pub author_id: Uuid,
    pub author_username: String,
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment attached to a tweet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub tweet_id: Uuid,
    pub content: String,
    pub posted_by: Uuid,
    pub posted_comment_time: String,
    pub likes: Vec<String>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
}

/// Format a timestamp the way tweets and comments display it:
/// `"October 16th 2026, 3:04:05 pm"`.
pub fn display_timestamp(at: DateTime<Utc>) -> String {
    let day = at.day();
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!(
        "{} {}{} {}",
        at.format("%B"),
        day,
        suffix,
        at.format("%Y, %-I:%M:%S %P")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn display_timestamp_afternoon() {
        let at = Utc.with_ymd_and_hms(2026, 10, 16, 15, 4, 5).unwrap();
        assert_eq!(display_timestamp(at), "October 16th 2026, 3:04:05 pm");
    }

    #[test]
    fn display_timestamp_ordinals() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (31, "31st"),
        ];
        for (day, expected) in cases {
            let at = Utc.with_ymd_and_hms(2026, 1, day, 0, 0, 0).unwrap();
            let formatted = display_timestamp(at);
            assert!(
                formatted.starts_with(&format!("January {expected} 2026")),
                "{formatted}"
            );
        }
    }

    #[test]
    fn display_timestamp_midnight_is_twelve_am() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 0, 7, 9).unwrap();
        assert_eq!(display_timestamp(at), "March 1st 2026, 12:07:09 am");
    }
}
