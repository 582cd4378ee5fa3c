//! Key-value store capability used for refresh-token state.
//!
//! Two backends: [`redis::RedisKvStore`] for deployments and
//! [`memory::MemoryKvStore`] for tests and single-process runs.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;

pub use self::memory::MemoryKvStore;
pub use self::redis::RedisKvStore;

/// Key-value store errors. A missing key is not an error.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("kv backend: {0}")]
    Backend(String),

    #[error("kv call timed out: {0}")]
    Timeout(&'static str),

    #[error("kv value for {key} is invalid")]
    InvalidValue { key: String },
}

impl From<::redis::RedisError> for KvError {
    fn from(e: ::redis::RedisError) -> Self {
        KvError::Backend(e.to_string())
    }
}

/// Minimal string key-value store with per-key expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Set `key` to `value`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Get the live value for `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}
