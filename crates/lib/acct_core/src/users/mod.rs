//! User directory: account records keyed by ID and email.
//!
//! [`UserDirectory`] is the seam the auth flows and the account service
//! depend on. [`postgres::PgUserDirectory`] is the deployed implementation,
//! [`memory::MemoryUserDirectory`] backs tests and local runs.

pub mod memory;
pub mod postgres;
pub mod service;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use self::memory::MemoryUserDirectory;
pub use self::postgres::PgUserDirectory;
use crate::models::user::{NewUser, ProfileUpdate, UserRecord};

/// User directory errors. Lookups that find nothing return `Ok(None)`.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Email already registered")]
    EmailTaken,

    #[error("Database error: {0}")]
    DbError(#[from] sqlx::Error),
}

/// Storage for user accounts.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new account. Fails with [`DirectoryError::EmailTaken`] on a duplicate email.
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError>;

    /// Exact, case-sensitive email match.
    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Apply a partial update. `Ok(None)` if the account does not exist.
    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, DirectoryError>;

    /// Replace the password hash. `Ok(false)` if the account does not exist.
    async fn set_password_hash(&self, id: Uuid, password_hash: &str)
    -> Result<bool, DirectoryError>;

    /// Remove the account. `Ok(false)` if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError>;
}
