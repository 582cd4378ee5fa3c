//! Authentication and session logic.
//!
//! Provides password hashing, the access-token codec, the refresh-token
//! session store and the [`service::SessionService`] that ties them together.
//! Shared by the HTTP and RPC adapters in `acct_api`.

pub mod credentials;
pub mod jwt;
pub mod password;
pub mod service;
pub mod session_store;

use thiserror::Error;

use crate::kv::KvError;
use crate::users::DirectoryError;

/// Authentication errors as seen by transports.
///
/// Credential and token failures never say why they failed; the reason is
/// only logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired refresh token")]
    InvalidOrExpiredToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<KvError> for AuthError {
    fn from(e: KvError) -> Self {
        AuthError::Internal(format!("session store: {e}"))
    }
}

impl From<DirectoryError> for AuthError {
    fn from(e: DirectoryError) -> Self {
        AuthError::Internal(format!("user directory: {e}"))
    }
}
