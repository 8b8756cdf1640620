//! # chirp-store
//!
//! SQLite-backed persistence for the chirp microblogging service.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for users
//! (the identity store) and for tweets and comments (the content store).
//! Engagement sets (likes, retweets, followers) are stored as membership
//! rows so that every toggle is a single insert or delete.

pub mod comments;
pub mod database;
pub mod migrations;
pub mod models;
pub mod tweets;
pub mod users;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
