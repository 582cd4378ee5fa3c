//! Redis-backed key-value store.

use async_trait::async_trait;
use chrono::Duration;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use super::{KeyValueStore, KvError};

/// Store over a multiplexed, auto-reconnecting Redis connection.
#[derive(Clone)]
pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379/0`).
    pub async fn connect(url: &str) -> Result<Self, KvError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("connected to redis");
        Ok(Self { conn })
    }
}

/// Redis expiry is whole seconds; anything shorter rounds up to one.
fn ttl_secs(ttl: Duration) -> u64 {
    let millis = ttl.num_milliseconds().max(1);
    (millis.saturating_add(999) / 1000) as u64
}

#[async_trait]
impl KeyValueStore for RedisKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl)).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
