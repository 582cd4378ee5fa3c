//! Access-token codec: HS256 JWTs carrying the user ID as `sub`.
//!
//! Time checks are done here against the caller's `now` instead of inside
//! `jsonwebtoken`, so [`TokenCodec`] stays a pure function of its inputs.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::auth::TokenClaims;

/// The only algorithm accepted on verify.
pub const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why an access token was rejected (or could not be produced).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("signature check failed")]
    SignatureInvalid,

    #[error("token expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("jwt encode: {0}")]
    Encode(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            // A header naming another algorithm is treated like a forged signature.
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                TokenError::SignatureInvalid
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::ImmatureSignature => TokenError::NotYetValid,
            _ => TokenError::Malformed,
        }
    }
}

/// Signs and verifies access tokens with a server-held secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec for the given signing secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for `user_id`, valid from `now` for `ttl`.
    pub fn issue(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encode("expiry out of range".into()))?;
        let claims = TokenClaims {
            sub: user_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            nbf: Some(now.timestamp()),
        };
        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verify a token at `now` and return its subject.
    ///
    /// Timestamps have one-second resolution: a token is expired once
    /// `now.timestamp() >= exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Uuid, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?.claims;
        let now = now.timestamp();

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if let Some(nbf) = claims.nbf
            && now < nbf
        {
            return Err(TokenError::NotYetValid);
        }
        Ok(claims.sub)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("acct")
        .join("jwt-secret")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issue_then_verify_returns_subject() {
        let codec = TokenCodec::new(SECRET);
        let user_id = Uuid::new_v4();
        let token = codec.issue(user_id, t0(), Duration::minutes(15)).unwrap();

        assert_eq!(codec.verify(&token, t0()).unwrap(), user_id);
        assert_eq!(
            codec
                .verify(&token, t0() + Duration::minutes(15) - Duration::seconds(1))
                .unwrap(),
            user_id
        );
    }

    #[test]
    fn expired_at_and_after_exp() {
        let codec = TokenCodec::new(SECRET);
        let token = codec
            .issue(Uuid::new_v4(), t0(), Duration::seconds(60))
            .unwrap();

        for late in [
            Duration::seconds(60),
            Duration::seconds(60) + Duration::milliseconds(1),
            Duration::days(1),
        ] {
            assert_eq!(codec.verify(&token, t0() + late), Err(TokenError::Expired));
        }
    }

    #[test]
    fn one_second_token_is_dead_two_seconds_later() {
        let codec = TokenCodec::new(SECRET);
        let token = codec
            .issue(Uuid::new_v4(), t0(), Duration::seconds(1))
            .unwrap();
        assert_eq!(
            codec.verify(&token, t0() + Duration::seconds(2)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn used_before_issue_time_is_not_yet_valid() {
        let codec = TokenCodec::new(SECRET);
        let token = codec
            .issue(Uuid::new_v4(), t0(), Duration::minutes(5))
            .unwrap();
        assert_eq!(
            codec.verify(&token, t0() - Duration::seconds(30)),
            Err(TokenError::NotYetValid)
        );
    }

    #[test]
    fn token_without_nbf_is_accepted() {
        let codec = TokenCodec::new(SECRET);
        let user_id = Uuid::new_v4();
        let claims = json!({
            "sub": user_id,
            "iat": t0().timestamp(),
            "exp": (t0() + Duration::minutes(5)).timestamp(),
        });
        let token = encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(codec.verify(&token, t0()).unwrap(), user_id);
    }

    #[test]
    fn unrepresentable_expiry_fails_to_issue() {
        let codec = TokenCodec::new(SECRET);
        let err = codec
            .issue(Uuid::new_v4(), t0(), Duration::days(100_000_000))
            .unwrap_err();
        assert!(matches!(err, TokenError::Encode(_)));
    }

    #[test]
    fn wrong_secret_is_signature_invalid() {
        let issuer = TokenCodec::new(b"other-secret");
        let token = issuer
            .issue(Uuid::new_v4(), t0(), Duration::minutes(5))
            .unwrap();
        assert_eq!(
            TokenCodec::new(SECRET).verify(&token, t0()),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn other_algorithm_is_rejected() {
        let claims = TokenClaims {
            sub: Uuid::new_v4(),
            iat: t0().timestamp(),
            exp: (t0() + Duration::minutes(5)).timestamp(),
            nbf: None,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            TokenCodec::new(SECRET).verify(&token, t0()),
            Err(TokenError::SignatureInvalid)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let codec = TokenCodec::new(SECRET);
        for token in ["", "not-a-token", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30"] {
            assert_eq!(codec.verify(token, t0()), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn non_uuid_subject_is_malformed() {
        let claims = json!({
            "sub": "42",
            "iat": t0().timestamp(),
            "exp": (t0() + Duration::minutes(5)).timestamp(),
        });
        let token = encode(
            &Header::new(ALGORITHM),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert_eq!(
            TokenCodec::new(SECRET).verify(&token, t0()),
            Err(TokenError::Malformed)
        );
    }
}
