//! Session/token service: login, refresh, logout and access-token validation.
//!
//! A refresh token is *active* while its reverse mapping exists, and is
//! *rotated*, *revoked* or *expired* once that mapping is gone. Only the
//! write of the user's slot is allowed to fail an operation; every other
//! mapping write or delete is best-effort and left to TTL expiry on failure.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::credentials::CredentialVerifier;
use super::jwt::TokenCodec;
use super::password::DEFAULT_BCRYPT_COST;
use super::session_store::SessionStore;
use crate::kv::KeyValueStore;
use crate::models::auth::TokenPair;
use crate::users::UserDirectory;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;

/// Refresh token lifetime: 30 days.
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 30;

/// Upper bound for a single store or directory call.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 2_000;

/// Lifetimes and limits for issued sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub call_timeout: std::time::Duration,
    /// Cost of the stand-in hash checked when an email is unknown.
    pub bcrypt_cost: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::minutes(DEFAULT_ACCESS_TOKEN_TTL_MINUTES),
            refresh_token_ttl: Duration::days(DEFAULT_REFRESH_TOKEN_TTL_DAYS),
            call_timeout: std::time::Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

/// Generate a cryptographically random refresh token (64 alphanumeric chars).
fn generate_refresh_token() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Orchestrates the token codec, the session store and the user directory.
///
/// Holds no mutable state of its own; share it behind an `Arc`.
pub struct SessionService {
    codec: TokenCodec,
    store: SessionStore,
    verifier: CredentialVerifier,
    directory: Arc<dyn UserDirectory>,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        codec: TokenCodec,
        kv: Arc<dyn KeyValueStore>,
        directory: Arc<dyn UserDirectory>,
        config: SessionConfig,
    ) -> Self {
        Self {
            codec,
            store: SessionStore::new(kv, config.call_timeout),
            verifier: CredentialVerifier::new(
                directory.clone(),
                config.call_timeout,
                config.bcrypt_cost,
            ),
            directory,
            config,
        }
    }

    /// Authenticate with email + password and start a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.verifier.verify(email, password).await?;

        let superseded = match self.store.get_refresh_for_user(user_id).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!(%user_id, error = %e, "could not read previous refresh token");
                None
            }
        };

        let pair = self.start_session(user_id).await?;
        if let Some(old) = superseded {
            self.forget_refresh_token(user_id, &old).await;
        }

        info!(%user_id, "login");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. The presented token is retired.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let Some(user_id) = self.store.get_user_for_refresh(refresh_token).await? else {
            debug!("refresh token unknown, revoked or expired");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        let user = tokio::time::timeout(self.config.call_timeout, self.directory.get_by_id(user_id))
            .await
            .map_err(|_| AuthError::Internal("user directory: get_by_id timed out".into()))??;
        if user.is_none() {
            warn!(%user_id, "refresh token belongs to a deleted user");
            self.forget_refresh_token(user_id, refresh_token).await;
            return Err(AuthError::InvalidOrExpiredToken);
        }

        let pair = self.start_session(user_id).await?;
        self.forget_refresh_token(user_id, refresh_token).await;

        debug!(%user_id, "refresh token rotated");
        Ok(pair)
    }

    /// End the user's session. Succeeds when there is no session.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        if let Some(token) = self.store.get_refresh_for_user(user_id).await? {
            self.forget_refresh_token(user_id, &token).await;
        }
        self.store.delete_refresh_for_user(user_id).await?;

        info!(%user_id, "logout");
        Ok(())
    }

    /// Verify an access token and return its subject. Stateless.
    pub fn validate_token(&self, access_token: &str) -> Result<Uuid, AuthError> {
        self.codec
            .verify(access_token, Utc::now())
            .map_err(|reason| {
                debug!(%reason, "access token rejected");
                AuthError::InvalidToken
            })
    }

    /// Issue a token pair and write both mappings, user slot first.
    ///
    /// If the reverse mapping fails to write, the pair is still returned: the
    /// access token works and the refresh token fails until the user logs in
    /// again.
    async fn start_session(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let access_token = self
            .codec
            .issue(user_id, Utc::now(), self.config.access_token_ttl)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let refresh_token = generate_refresh_token();
        let ttl = self.config.refresh_token_ttl;

        self.store
            .put_refresh_for_user(user_id, &refresh_token, ttl)
            .await?;

        if let Err(e) = self
            .store
            .put_user_for_refresh(&refresh_token, user_id, ttl)
            .await
        {
            warn!(%user_id, error = %e, "refresh mapping not written, refresh token unusable");
        }

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Best-effort delete of a refresh token's reverse mapping.
    async fn forget_refresh_token(&self, user_id: Uuid, token: &str) {
        if let Err(e) = self.store.delete_user_for_refresh(token).await {
            warn!(%user_id, error = %e, "stale refresh mapping left to expire");
        }
    }
}
