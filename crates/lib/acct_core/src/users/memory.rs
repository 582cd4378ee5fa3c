//! In-memory user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DirectoryError, UserDirectory};
use crate::models::user::{NewUser, ProfileUpdate, UserRecord};

/// Accounts held in a map behind a single lock, so email uniqueness is
/// checked and enforced in one critical section.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<Uuid, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_in_use(users: &HashMap<Uuid, UserRecord>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create(&self, user: NewUser) -> Result<UserRecord, DirectoryError> {
        let mut users = self.users.write().await;
        if email_in_use(&users, &user.email, None) {
            return Err(DirectoryError::EmailTaken);
        }
        let record = UserRecord {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        update: ProfileUpdate,
    ) -> Result<Option<UserRecord>, DirectoryError> {
        let mut users = self.users.write().await;
        if let Some(email) = &update.email
            && email_in_use(&users, email, Some(id))
        {
            return Err(DirectoryError::EmailTaken);
        }
        let Some(record) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = update.email {
            record.email = email;
        }
        if let Some(name) = update.name {
            record.name = Some(name);
        }
        Ok(Some(record.clone()))
    }

    async fn set_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, DirectoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(record) => {
                record.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DirectoryError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
