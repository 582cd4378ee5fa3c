//! Account service: registration, lookup, profile update, password change
//! and deletion on top of a [`UserDirectory`].

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use super::{DirectoryError, UserDirectory};
use crate::auth::AuthError;
use crate::auth::password::{DEFAULT_BCRYPT_COST, hash_password};
use crate::auth::service::{DEFAULT_CALL_TIMEOUT_MS, SessionService};
use crate::models::user::{NewUser, ProfileUpdate, User};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Account operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DirectoryError> for UserError {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::EmailTaken => UserError::Conflict("Email already registered".into()),
            DirectoryError::DbError(e) => UserError::Internal(format!("user directory: {e}")),
        }
    }
}

impl From<AuthError> for UserError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => UserError::InvalidCredentials,
            other => UserError::Internal(other.to_string()),
        }
    }
}

/// Trim surrounding whitespace and check the result looks like an address.
fn normalize_email(email: &str) -> Result<String, UserError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(UserError::Validation("A valid email is required".into()));
    }
    Ok(email.to_string())
}

fn validate_password(password: &str) -> Result<(), UserError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(UserError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Account CRUD. Password changes and deletions also end the user's session.
pub struct UserService {
    directory: Arc<dyn UserDirectory>,
    sessions: Arc<SessionService>,
    bcrypt_cost: u32,
    call_timeout: std::time::Duration,
}

impl UserService {
    pub fn new(directory: Arc<dyn UserDirectory>, sessions: Arc<SessionService>) -> Self {
        Self {
            directory,
            sessions,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            call_timeout: std::time::Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
        }
    }

    /// Override the bcrypt cost used for new hashes.
    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    /// Override the bound on each user directory call.
    pub fn with_call_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, UserError> {
        let result = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| UserError::Internal(format!("user directory: {op} timed out")))?;
        Ok(result?)
    }

    /// Create a new account.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<User, UserError> {
        let email = normalize_email(email)?;
        validate_password(password)?;

        let password_hash = hash_password(password, self.bcrypt_cost)?;
        let record = self
            .bounded(
                "create",
                self.directory.create(NewUser {
                    email,
                    name: name.map(str::to_string),
                    password_hash,
                }),
            )
            .await?;

        info!(user_id = %record.id, "user registered");
        Ok(record.into())
    }

    pub async fn get(&self, id: Uuid) -> Result<User, UserError> {
        self.bounded("get_by_id", self.directory.get_by_id(id))
            .await?
            .map(User::from)
            .ok_or(UserError::NotFound)
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        mut update: ProfileUpdate,
    ) -> Result<User, UserError> {
        if let Some(email) = update.email.take() {
            update.email = Some(normalize_email(&email)?);
        }
        let record = self
            .bounded("update_profile", self.directory.update_profile(id, update))
            .await?
            .ok_or(UserError::NotFound)?;
        Ok(record.into())
    }

    /// Replace the password after checking the current one.
    pub async fn change_password(
        &self,
        id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError> {
        let record = self
            .bounded("get_by_id", self.directory.get_by_id(id))
            .await?
            .ok_or(UserError::NotFound)?;
        if !record.check_password(current_password)? {
            return Err(UserError::InvalidCredentials);
        }
        validate_password(new_password)?;

        let password_hash = hash_password(new_password, self.bcrypt_cost)?;
        if !self
            .bounded(
                "set_password_hash",
                self.directory.set_password_hash(id, &password_hash),
            )
            .await?
        {
            return Err(UserError::NotFound);
        }

        info!(user_id = %id, "password changed");
        self.end_session(id).await;
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), UserError> {
        if !self.bounded("delete", self.directory.delete(id)).await? {
            return Err(UserError::NotFound);
        }

        info!(user_id = %id, "user deleted");
        self.end_session(id).await;
        Ok(())
    }

    async fn end_session(&self, id: Uuid) {
        if let Err(e) = self.sessions.logout(id).await {
            warn!(user_id = %id, error = %e, "session not revoked, left to expire");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::auth::jwt::TokenCodec;
    use crate::auth::password::MIN_BCRYPT_COST;
    use crate::auth::service::SessionConfig;
    use crate::kv::MemoryKvStore;
    use crate::models::user::UserRecord;
    use crate::users::MemoryUserDirectory;

    fn services() -> (UserService, Arc<SessionService>) {
        let directory: Arc<dyn UserDirectory> = Arc::new(MemoryUserDirectory::new());
        let sessions = Arc::new(SessionService::new(
            TokenCodec::new(b"test-secret"),
            Arc::new(MemoryKvStore::new()),
            directory.clone(),
            SessionConfig::default(),
        ));
        let users = UserService::new(directory, sessions.clone()).with_bcrypt_cost(MIN_BCRYPT_COST);
        (users, sessions)
    }

    #[tokio::test]
    async fn register_then_login() {
        let (users, sessions) = services();
        let user = users
            .register("new@x.com", "password123", Some("New"))
            .await
            .unwrap();
        assert_eq!(user.name.as_deref(), Some("New"));

        let pair = sessions.login("new@x.com", "password123").await.unwrap();
        assert_eq!(sessions.validate_token(&pair.access_token).unwrap(), user.id);
        assert_eq!(users.get(user.id).await.unwrap(), user);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (users, _) = services();
        assert!(matches!(
            users.register("no-at-sign", "password123", None).await,
            Err(UserError::Validation(_))
        ));
        assert!(matches!(
            users.register("a@x.com", "short", None).await,
            Err(UserError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let (users, _) = services();
        users.register("a@x.com", "password123", None).await.unwrap();
        assert!(matches!(
            users.register("a@x.com", "password456", None).await,
            Err(UserError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn update_profile_changes_fields() {
        let (users, _) = services();
        let user = users.register("a@x.com", "password123", None).await.unwrap();

        let updated = users
            .update_profile(
                user.id,
                ProfileUpdate {
                    email: Some("b@x.com".into()),
                    name: Some("Bee".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "b@x.com");
        assert_eq!(updated.name.as_deref(), Some("Bee"));

        assert_eq!(
            users
                .update_profile(Uuid::new_v4(), ProfileUpdate::default())
                .await,
            Err(UserError::NotFound)
        );
    }

    #[tokio::test]
    async fn change_password_checks_current_and_ends_session() {
        let (users, sessions) = services();
        let user = users.register("a@x.com", "password123", None).await.unwrap();
        let pair = sessions.login("a@x.com", "password123").await.unwrap();

        assert_eq!(
            users
                .change_password(user.id, "wrong-current", "newpassword1")
                .await,
            Err(UserError::InvalidCredentials)
        );

        users
            .change_password(user.id, "password123", "newpassword1")
            .await
            .unwrap();

        assert_eq!(
            sessions.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        );
        assert_eq!(
            sessions.login("a@x.com", "password123").await,
            Err(AuthError::InvalidCredentials)
        );
        sessions.login("a@x.com", "newpassword1").await.unwrap();
    }

    #[tokio::test]
    async fn delete_removes_account_and_session() {
        let (users, sessions) = services();
        let user = users.register("a@x.com", "password123", None).await.unwrap();
        let pair = sessions.login("a@x.com", "password123").await.unwrap();

        users.delete(user.id).await.unwrap();

        assert_eq!(users.get(user.id).await, Err(UserError::NotFound));
        assert_eq!(
            sessions.refresh(&pair.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        );
        assert_eq!(users.delete(user.id).await, Err(UserError::NotFound));
    }

    #[tokio::test]
    async fn email_is_stored_trimmed() {
        let (users, sessions) = services();
        let user = users
            .register("  a@x.com ", "password123", None)
            .await
            .unwrap();
        assert_eq!(user.email, "a@x.com");

        assert!(matches!(
            users.register("a@x.com", "password456", None).await,
            Err(UserError::Conflict(_))
        ));
        sessions.login("a@x.com", "password123").await.unwrap();

        let updated = users
            .update_profile(
                user.id,
                ProfileUpdate {
                    email: Some(" b@x.com\t".into()),
                    name: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "b@x.com");
    }

    /// Directory whose calls never complete.
    struct HangingDirectory;

    #[async_trait]
    impl UserDirectory for HangingDirectory {
        async fn create(&self, _user: NewUser) -> Result<UserRecord, DirectoryError> {
            std::future::pending().await
        }
        async fn get_by_id(&self, _id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
            std::future::pending().await
        }
        async fn get_by_email(&self, _email: &str) -> Result<Option<UserRecord>, DirectoryError> {
            std::future::pending().await
        }
        async fn update_profile(
            &self,
            _id: Uuid,
            _update: ProfileUpdate,
        ) -> Result<Option<UserRecord>, DirectoryError> {
            std::future::pending().await
        }
        async fn set_password_hash(
            &self,
            _id: Uuid,
            _password_hash: &str,
        ) -> Result<bool, DirectoryError> {
            std::future::pending().await
        }
        async fn delete(&self, _id: Uuid) -> Result<bool, DirectoryError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_directory_times_out() {
        let directory: Arc<dyn UserDirectory> = Arc::new(HangingDirectory);
        let sessions = Arc::new(SessionService::new(
            TokenCodec::new(b"test-secret"),
            Arc::new(MemoryKvStore::new()),
            directory.clone(),
            SessionConfig::default(),
        ));
        let users = UserService::new(directory, sessions)
            .with_bcrypt_cost(MIN_BCRYPT_COST)
            .with_call_timeout(std::time::Duration::from_millis(50));
        let id = Uuid::new_v4();

        let timed_out = |r: &Result<(), UserError>| {
            matches!(r, Err(UserError::Internal(m)) if m.contains("timed out"))
        };

        assert!(timed_out(
            &users.register("a@x.com", "password123", None).await.map(|_| ())
        ));
        assert!(timed_out(&users.get(id).await.map(|_| ())));
        assert!(timed_out(
            &users
                .update_profile(id, ProfileUpdate::default())
                .await
                .map(|_| ())
        ));
        assert!(timed_out(
            &users.change_password(id, "password123", "password456").await
        ));
        assert!(timed_out(&users.delete(id).await));
    }
}
