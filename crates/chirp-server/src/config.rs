//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use chirp_engine::feed::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

/// Secret used when `JWT_SECRET` is not set.  Development only.
pub const DEV_JWT_SECRET: &str = "chirp-dev-secret";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./chirp.db`
    pub database_path: PathBuf,

    /// Directory for uploaded tweet images, served under `/tweetImages`.
    /// Env: `TWEET_IMAGE_PATH`
    /// Default: `./tweetImages`
    pub tweet_image_path: PathBuf,

    /// Directory for uploaded avatars, served under `/images`.
    /// Env: `AVATAR_PATH`
    /// Default: `./images`
    pub avatar_path: PathBuf,

    /// HMAC secret for signing session tokens.
    /// Env: `JWT_SECRET`
    pub jwt_secret: String,

    /// Session token lifetime in seconds.
    /// Env: `TOKEN_TTL_SECS`
    /// Default: `86400`
    pub token_ttl_secs: i64,

    /// Tweets per feed page.
    /// Env: `FEED_PAGE_SIZE`
    /// Default: `20`
    pub feed_page_size: u32,

    /// Maximum upload size in bytes (5 MiB).
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("tweet_image_path", &self.tweet_image_path)
            .field("avatar_path", &self.avatar_path)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("feed_page_size", &self.feed_page_size)
            .field("max_upload_size", &self.max_upload_size)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5000).into(),
            database_path: PathBuf::from("./chirp.db"),
            tweet_image_path: PathBuf::from("./tweetImages"),
            avatar_path: PathBuf::from("./images"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 86_400,
            feed_page_size: DEFAULT_PAGE_SIZE,
            max_upload_size: 5 * 1024 * 1024, // 5 MiB
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("TWEET_IMAGE_PATH") {
            config.tweet_image_path = PathBuf::from(path);
        }

        if let Some(path) = lookup("AVATAR_PATH") {
            config.avatar_path = PathBuf::from(path);
        }

        match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => tracing::warn!("JWT_SECRET not set, using development secret"),
        }

        if let Some(val) = lookup("TOKEN_TTL_SECS") {
            match val.parse::<i64>() {
                Ok(n) if n > 0 => config.token_ttl_secs = n,
                _ => tracing::warn!(value = %val, "Invalid TOKEN_TTL_SECS, using default"),
            }
        }

        if let Some(val) = lookup("FEED_PAGE_SIZE") {
            match val.parse::<u32>() {
                Ok(n) if (1..=MAX_PAGE_SIZE).contains(&n) => config.feed_page_size = n,
                _ => tracing::warn!(value = %val, "Invalid FEED_PAGE_SIZE, using default"),
            }
        }

        if let Some(val) = lookup("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = from_map(&[]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.feed_page_size, 20);
        assert_eq!(config.token_ttl_secs, 86_400);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
    }

    #[test]
    fn test_overrides() {
        let config = from_map(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/x.db"),
            ("JWT_SECRET", "s3cret"),
            ("FEED_PAGE_SIZE", "50"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.feed_page_size, 50);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_map(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("FEED_PAGE_SIZE", "0"),
            ("TOKEN_TTL_SECS", "-5"),
        ]);
        assert_eq!(config.http_addr, ServerConfig::default().http_addr);
        assert_eq!(config.feed_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.token_ttl_secs, 86_400);
    }

    #[test]
    fn test_invalid_upload_size_falls_back() {
        let default = ServerConfig::default().max_upload_size;
        for bad in ["ten megabytes", "-1", "0", ""] {
            let config = from_map(&[("MAX_UPLOAD_SIZE", bad)]);
            assert_eq!(config.max_upload_size, default, "value {bad:?}");
        }
        let config = from_map(&[("MAX_UPLOAD_SIZE", "2048")]);
        assert_eq!(config.max_upload_size, 2048);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = from_map(&[("JWT_SECRET", "hunter2")]);
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
