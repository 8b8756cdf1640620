//! # chirp-server
//!
//! HTTP front end for the chirp microblog.
//!
//! - **api**: axum router and handlers for the feed, engagement toggles,
//!   posting, profiles and search
//! - **auth**: JWT session tokens and the caller-identity extractors
//! - **images**: tweet image and avatar uploads on disk
//! - **password**: Argon2id password hashing

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod images;
pub mod password;
