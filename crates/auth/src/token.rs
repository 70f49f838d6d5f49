//! Bearer token issuing and verification (HS256 JWT).

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::claims::{TOKEN_ISSUER, TokenClaims, validate_claims};
use crate::{Account, AuthError};

/// Default token lifetime.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKeys {
    fn from_secret(secret: &[u8]) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::ServerConfiguration(
                "token signing secret is not configured".to_string(),
            ));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }
}

/// Issues and verifies signed, time-boxed bearer tokens.
///
/// Expiry is checked by [`validate_claims`] against the caller-supplied `now`
/// rather than by the JWT library, so the boundary policy (`now >= exp` is
/// expired) lives in one place.
pub struct TokenIssuer {
    keys: RwLock<SigningKeys>,
    validation: Validation,
    ttl: Duration,
}

impl TokenIssuer {
    /// Fails with `ServerConfiguration` when `secret` is empty.
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, AuthError> {
        let keys = SigningKeys::from_secret(secret.as_ref())?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "iss".to_string(), "sub".to_string()]);
        validation.set_issuer(&[TOKEN_ISSUER]);

        Ok(Self {
            keys: RwLock::new(keys),
            validation,
            ttl,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token embedding `{accountId, email, role}` valid for the configured TTL.
    pub fn issue(&self, account: &Account, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = TokenClaims::for_account(account, now, self.ttl);
        self.sign(&claims)
    }

    /// Sign arbitrary claims (tests and tooling).
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        encode(&Header::new(Algorithm::HS256), claims, &keys.encoding)
            .map_err(|e| AuthError::ServerConfiguration(format!("failed to sign token: {e}")))
    }

    /// Verify signature, issuer and time window. Never falls back to a default role.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
        let claims = {
            let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
            decode::<TokenClaims>(token, &keys.decoding, &self.validation)
                .map_err(|e| {
                    tracing::debug!(error = %e, "token rejected");
                    AuthError::TokenInvalid
                })?
                .claims
        };
        validate_claims(&claims, now)?;
        Ok(claims)
    }

    /// Replace the signing secret. Tokens signed with the old secret stop verifying.
    pub fn rotate_secret(&self, secret: impl AsRef<[u8]>) -> Result<(), AuthError> {
        let keys = SigningKeys::from_secret(secret.as_ref())?;
        *self.keys.write().unwrap_or_else(PoisonError::into_inner) = keys;
        tracing::info!("token signing secret rotated");
        Ok(())
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &TOKEN_ISSUER)
            .field("ttl", &self.ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountStatus, Role};
    use chrono::TimeZone;
    use ucaep_core::AccountId;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-testing";

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(SECRET, Duration::hours(DEFAULT_TOKEN_TTL_HOURS)).unwrap()
    }

    fn account(role: Role) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId::new(),
            email: "alice@x.com".into(),
            first_name: "Alice".into(),
            last_name: "Martin".into(),
            phone: None,
            role,
            status: AccountStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn missing_secret_is_a_configuration_error() {
        let err = TokenIssuer::new("", Duration::hours(24)).unwrap_err();
        assert!(matches!(err, AuthError::ServerConfiguration(_)));
    }

    #[test]
    fn issue_then_verify_roundtrips_identity() {
        let issuer = issuer();
        for role in Role::ALL {
            let acct = account(role);
            let now = Utc::now();
            let token = issuer.issue(&acct, now).unwrap();
            let claims = issuer.verify(&token, now).unwrap();
            assert_eq!(claims.sub, acct.id);
            assert_eq!(claims.role, acct.role);
            assert_eq!(claims.email, acct.email);
        }
    }

    #[test]
    fn token_expires_exactly_at_ttl() {
        let issuer = issuer();
        let issued = at(1_700_000_000);
        let token = issuer.issue(&account(Role::Producer), issued).unwrap();

        let expiry = issued + Duration::hours(24);
        assert!(issuer.verify(&token, expiry - Duration::seconds(1)).is_ok());
        assert_eq!(issuer.verify(&token, expiry), Err(AuthError::TokenExpired));
    }

    #[test]
    fn rotated_secret_invalidates_old_tokens() {
        let issuer = issuer();
        let now = Utc::now();
        let token = issuer.issue(&account(Role::Admin), now).unwrap();

        issuer.rotate_secret("a-completely-different-secret-value").unwrap();
        assert_eq!(issuer.verify(&token, now), Err(AuthError::TokenInvalid));

        let fresh = issuer.issue(&account(Role::Admin), now).unwrap();
        assert!(issuer.verify(&fresh, now).is_ok());
    }

    #[test]
    fn rotate_to_empty_secret_is_refused() {
        assert!(matches!(
            issuer().rotate_secret(""),
            Err(AuthError::ServerConfiguration(_))
        ));
    }

    #[test]
    fn garbage_and_forged_tokens_are_invalid() {
        let issuer = issuer();
        let now = Utc::now();
        assert_eq!(issuer.verify("invalid.token.here", now), Err(AuthError::TokenInvalid));

        let other =
            TokenIssuer::new("secret-two-for-testing-purposes", Duration::hours(1)).unwrap();
        let forged = other.issue(&account(Role::Admin), now).unwrap();
        assert_eq!(issuer.verify(&forged, now), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn foreign_issuer_is_invalid() {
        let issuer = issuer();
        let now = at(1_700_000_000);
        let mut claims = TokenClaims::for_account(&account(Role::Viewer), now, Duration::hours(1));
        claims.iss = "someone-else".into();
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify(&token, now), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn unknown_role_claim_is_invalid_not_defaulted() {
        let issuer = issuer();
        let now = at(1_700_000_000);
        let claims = serde_json::json!({
            "sub": AccountId::new(),
            "email": "x@x.com",
            "role": "superuser",
            "iss": TOKEN_ISSUER,
            "jti": ucaep_core::SessionId::new(),
            "iat": 1_700_000_000i64,
            "exp": 1_700_003_600i64,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert_eq!(issuer.verify(&token, now), Err(AuthError::TokenInvalid));
    }
}
