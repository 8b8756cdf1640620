//! # chirp-engine
//!
//! Social-graph logic on top of [`chirp_store`]:
//!
//! - **engagement**: like / retweet / follow toggles
//! - **feed**: paginated feed, profile and comment views
//! - **posting**: compose, edit and delete tweets and comments
//! - **accounts**: registration, login lookup, search and avatars
//!
//! Every operation is synchronous and works on a borrowed
//! [`Database`](chirp_store::Database).  Results are returned as view structs
//! whose button fields are computed for the requesting viewer and never
//! written back to storage.

pub mod accounts;
pub mod engagement;
pub mod feed;
pub mod posting;
pub mod view;

mod error;

pub use error::{EngineError, Result};
pub use view::{AuthorView, ButtonColor, CommentView, FollowLabel, TweetView};
