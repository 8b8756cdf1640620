//! Session tokens and caller identity.
//!
//! Tokens are HS256 JWTs carrying the username as `sub`.  They are read from
//! the `x-access-token` header or from `Authorization: Bearer <token>`.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::ApiError;

/// Header the web client sends its token in.
pub const TOKEN_HEADER: &str = "x-access-token";

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username (lowercase).
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// Issues and verifies session tokens.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl_secs,
        }
    }

    /// Issue a signed token for `username`.
    pub fn issue(&self, username: &str) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: username.to_string(),
            iat: now,
            exp: now + self.ttl_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "token rejected");
                ApiError::Unauthenticated
            })
    }
}

/// Extract the raw token from request headers, if any.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(token.trim());
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// The authenticated caller.  Rejects the request with
/// [`ApiError::Unauthenticated`] when no valid token is present.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
}

impl AuthUser {
    /// Require that a path segment naming the acting user matches the caller.
    pub fn ensure_is(&self, username: &str) -> Result<(), ApiError> {
        if self.username == username.to_lowercase() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "cannot act as {username} while signed in as {}",
                self.username
            )))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthenticated)?;
        let claims = state.tokens.verify(token)?;
        Ok(AuthUser {
            username: claims.sub,
        })
    }
}

/// The caller if a valid token is present; anonymous otherwise.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = token_from_headers(&parts.headers)
            .and_then(|token| state.tokens.verify(token).ok())
            .map(|claims| AuthUser {
                username: claims.sub,
            });
        Ok(MaybeAuthUser(user))
    }
}
