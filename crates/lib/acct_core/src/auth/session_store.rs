//! Refresh-token session state over a [`KeyValueStore`].
//!
//! A session is two reciprocal entries written and deleted as a pair:
//!
//! * `session:user:<user_id>` → refresh token
//! * `session:refresh:<token>` → user id
//!
//! The pair is not atomic. If one half fails to write or delete, the other
//! half stays until its TTL runs out.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::kv::{KeyValueStore, KvError};

const USER_PREFIX: &str = "session:user:";
const REFRESH_PREFIX: &str = "session:refresh:";

fn user_key(user_id: Uuid) -> String {
    format!("{USER_PREFIX}{user_id}")
}

fn refresh_key(token: &str) -> String {
    format!("{REFRESH_PREFIX}{token}")
}

/// Session adapter. Each method is one store round trip bounded by `timeout`.
#[derive(Clone)]
pub struct SessionStore {
    kv: Arc<dyn KeyValueStore>,
    timeout: std::time::Duration,
}

impl SessionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, timeout: std::time::Duration) -> Self {
        Self { kv, timeout }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, KvError>>,
    ) -> Result<T, KvError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| KvError::Timeout(op))?
    }

    /// Point the user's slot at `token`, replacing any previous one.
    pub async fn put_refresh_for_user(
        &self,
        user_id: Uuid,
        token: &str,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let key = user_key(user_id);
        self.bounded("put_refresh_for_user", self.kv.set(&key, token, ttl))
            .await
    }

    pub async fn get_refresh_for_user(&self, user_id: Uuid) -> Result<Option<String>, KvError> {
        let key = user_key(user_id);
        self.bounded("get_refresh_for_user", self.kv.get(&key)).await
    }

    pub async fn delete_refresh_for_user(&self, user_id: Uuid) -> Result<(), KvError> {
        let key = user_key(user_id);
        self.bounded("delete_refresh_for_user", self.kv.delete(&key))
            .await
    }

    pub async fn put_user_for_refresh(
        &self,
        token: &str,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let key = refresh_key(token);
        let value = user_id.to_string();
        self.bounded("put_user_for_refresh", self.kv.set(&key, &value, ttl))
            .await
    }

    /// Resolve the owner of a refresh token.
    pub async fn get_user_for_refresh(&self, token: &str) -> Result<Option<Uuid>, KvError> {
        let key = refresh_key(token);
        let value = self
            .bounded("get_user_for_refresh", self.kv.get(&key))
            .await?;
        value
            .map(|v| Uuid::parse_str(&v).map_err(|_| KvError::InvalidValue { key }))
            .transpose()
    }

    pub async fn delete_user_for_refresh(&self, token: &str) -> Result<(), KvError> {
        let key = refresh_key(token);
        self.bounded("delete_user_for_refresh", self.kv.delete(&key))
            .await
    }
}
