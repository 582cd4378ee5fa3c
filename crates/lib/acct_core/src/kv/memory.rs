//! In-process key-value store with lazy TTL expiry.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use super::{KeyValueStore, KvError};

/// A stored value with expiry.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// `DashMap`-backed store. Expired entries read as absent and are removed
/// on that read; [`MemoryKvStore::purge_expired`] sweeps the rest.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: DashMap<String, Entry>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let live = now < entry.expires_at;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of entries held, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| KvError::Backend(format!("ttl out of range for {key}")))?;
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let found = self
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.expires_at));

        match found {
            None => Ok(None),
            Some((value, expires_at)) if Utc::now() < expires_at => Ok(Some(value)),
            Some(_) => {
                // Re-check under the shard lock: a concurrent set may have refreshed it.
                self.entries
                    .remove_if(key, |_, entry| Utc::now() >= entry.expires_at);
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.remove(key);
        Ok(())
    }
}
