use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ucaep_core::{AccountId, SessionId};

use crate::{Account, Role};

/// Issuer written into (and required from) every token.
pub const TOKEN_ISSUER: &str = "ucaep";

/// Bearer token claims.
///
/// Timestamps travel as unix seconds (`iat`/`exp`) so that any standard JWT
/// tooling can read them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject / account identifier.
    pub sub: AccountId,

    pub email: String,

    pub role: Role,

    pub iss: String,

    /// Session this token belongs to. Logout ends the session, not the account.
    pub jti: SessionId,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl TokenClaims {
    /// Claims for a new session of `account`, valid for `ttl` starting at `now`
    /// (truncated to whole seconds).
    pub fn for_account(account: &Account, now: DateTime<Utc>, ttl: Duration) -> Self {
        let issued_at = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        Self {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            iss: TOKEN_ISSUER.to_string(),
            jti: SessionId::new(),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate token claims against `now`.
///
/// A token is expired from its expiry instant onwards (`now >= expires_at`).
/// Signature verification happens in [`crate::TokenIssuer`].
pub fn validate_claims(
    claims: &TokenClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
