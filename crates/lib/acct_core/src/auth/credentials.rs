//! Email + password verification against the user directory.

use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};
use uuid::Uuid;

use super::AuthError;
use super::password::{hash_password, verify_password};
use crate::users::UserDirectory;

/// Password behind the stand-in hash. Never matches a real login.
const DUMMY_PASSWORD: &str = "acct-unknown-email-placeholder";

/// Checks login credentials. An unknown email and a wrong password produce
/// the same [`AuthError::InvalidCredentials`], and both pay for one bcrypt
/// verification.
#[derive(Clone)]
pub struct CredentialVerifier {
    directory: Arc<dyn UserDirectory>,
    timeout: std::time::Duration,
    bcrypt_cost: u32,
    dummy_hash: Arc<OnceLock<Option<String>>>,
}

impl CredentialVerifier {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        timeout: std::time::Duration,
        bcrypt_cost: u32,
    ) -> Self {
        Self {
            directory,
            timeout,
            bcrypt_cost,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    /// Hash checked on the unknown-email path, built on first use.
    fn dummy_hash(&self) -> Option<&str> {
        self.dummy_hash
            .get_or_init(|| match hash_password(DUMMY_PASSWORD, self.bcrypt_cost) {
                Ok(hash) => Some(hash),
                Err(e) => {
                    warn!(error = %e, "could not build stand-in password hash");
                    None
                }
            })
            .as_deref()
    }

    /// Return the user ID if `password` matches the account registered under `email`.
    pub async fn verify(&self, email: &str, password: &str) -> Result<Uuid, AuthError> {
        let lookup = tokio::time::timeout(self.timeout, self.directory.get_by_email(email))
            .await
            .map_err(|_| AuthError::Internal("user directory: get_by_email timed out".into()))?;

        let Some(user) = lookup? else {
            if let Some(hash) = self.dummy_hash() {
                let _ = verify_password(password, hash);
            }
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.check_password(password)? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user.id)
    }
}
