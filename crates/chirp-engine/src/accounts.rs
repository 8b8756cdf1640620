//! Account operations: registration, login lookup, search and avatars.
//!
//! Password hashing is the caller's concern; this module only ever sees the
//! resulting hash.

use chirp_store::{Database, User};
use tracing::info;

use crate::error::{missing, EngineError, Result};
use crate::view::AuthorView;

/// Maximum username length, in characters.
pub const MAX_USERNAME_CHARS: usize = 30;

/// Normalize and validate a username: trimmed, lowercased, 1 to
/// [`MAX_USERNAME_CHARS`] characters of letters, digits, `_`, `.` or `-`.
pub fn normalize_username(raw: &str) -> Result<String> {
    let name = raw.trim().to_lowercase();
    if name.is_empty() {
        return Err(EngineError::Validation("username must not be empty".into()));
    }
    if name.chars().count() > MAX_USERNAME_CHARS {
        return Err(EngineError::Validation(format!(
            "username must be at most {MAX_USERNAME_CHARS} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(EngineError::Validation(
            "username may only contain letters, digits, '_', '.' and '-'".into(),
        ));
    }
    Ok(name)
}

/// Create an account.  The username is stored lowercased; a name that is
/// already taken (in any case) is rejected.
pub fn register(db: &Database, username: &str, password_hash: &str) -> Result<AuthorView> {
    let username = normalize_username(username)?;
    let user = db.create_user(&username, password_hash).map_err(|e| match e {
        chirp_store::StoreError::Conflict(_) => {
            EngineError::Validation("username already taken".into())
        }
        other => other.into(),
    })?;
    info!(user = %user.username, "account registered");
    Ok(AuthorView::from(&user))
}

/// Look up the account a login attempt refers to.  Matching is
/// case-insensitive since stored usernames are lowercase.
pub fn find_for_login(db: &Database, username: &str) -> Result<User> {
    db.get_user_by_username(&username.trim().to_lowercase())
        .map_err(missing("user"))
}

/// Users whose name contains `fragment`, ignoring case.
pub fn search(db: &Database, fragment: &str) -> Result<Vec<AuthorView>> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return Ok(Vec::new());
    }
    Ok(db
        .search_users(fragment)?
        .iter()
        .map(AuthorView::from)
        .collect())
}

/// Replace `username`'s avatar with a stored filename or an external URL.
pub fn update_avatar(db: &Database, username: &str, avatar: &str) -> Result<()> {
    let avatar = avatar.trim();
    if avatar.is_empty() {
        return Err(EngineError::Validation("avatar must not be empty".into()));
    }
    if !db.set_avatar(username, avatar)? {
        return Err(EngineError::NotFound("user"));
    }
    info!(user = %username, avatar = %avatar, "avatar updated");
    Ok(())
}
