//! API server configuration.

use std::fmt;

use acct_core::auth::password::{DEFAULT_BCRYPT_COST, MIN_BCRYPT_COST};
use acct_core::auth::service::{
    DEFAULT_ACCESS_TOKEN_TTL_MINUTES, DEFAULT_CALL_TIMEOUT_MS, DEFAULT_REFRESH_TOKEN_TTL_DAYS,
    SessionConfig,
};
use chrono::Duration;
use thiserror::Error;

/// Upper bound for `access_token_ttl_minutes`: one day.
pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
/// Upper bound for `refresh_token_ttl_days`: one year.
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
/// Upper bound for `store_timeout_ms`: one minute.
pub const MAX_STORE_TIMEOUT_MS: u64 = 60_000;
/// bcrypt rejects costs above this.
pub const MAX_BCRYPT_COST: u32 = 31;

/// A configuration value outside its accepted range.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{field} must be between {min} and {max}, got {value}")]
pub struct ConfigError {
    pub field: &'static str,
    pub value: i128,
    pub min: i128,
    pub max: i128,
}

fn check_range(field: &'static str, value: i128, min: i128, max: i128) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Redis URL for session state. `None` keeps sessions in process memory.
    pub redis_url: Option<String>,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    /// Per-call bound for session store and user directory round trips.
    pub store_timeout_ms: u64,
    pub bcrypt_cost: u32,
}

impl ApiConfig {
    /// Defaults for everything except the signing secret.
    ///
    /// | Field                      | Default                          |
    /// |----------------------------|----------------------------------|
    /// | `bind_addr`                | `127.0.0.1:3100`                 |
    /// | `pg_connection_url`        | `postgres://localhost:5432/acct` |
    /// | `redis_url`                | none (in-memory)                 |
    /// | `access_token_ttl_minutes` | 15                               |
    /// | `refresh_token_ttl_days`   | 30                               |
    /// | `store_timeout_ms`         | 2000                             |
    /// | `bcrypt_cost`              | 10                               |
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:3100".into(),
            pg_connection_url: "postgres://localhost:5432/acct".into(),
            redis_url: None,
            jwt_secret: jwt_secret.into(),
            access_token_ttl_minutes: DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
            refresh_token_ttl_days: DEFAULT_REFRESH_TOKEN_TTL_DAYS,
            store_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Reject lifetimes, timeouts and costs outside their accepted ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "access_token_ttl_minutes",
            self.access_token_ttl_minutes.into(),
            1,
            MAX_ACCESS_TOKEN_TTL_MINUTES.into(),
        )?;
        check_range(
            "refresh_token_ttl_days",
            self.refresh_token_ttl_days.into(),
            1,
            MAX_REFRESH_TOKEN_TTL_DAYS.into(),
        )?;
        check_range(
            "store_timeout_ms",
            self.store_timeout_ms.into(),
            1,
            MAX_STORE_TIMEOUT_MS.into(),
        )?;
        check_range(
            "bcrypt_cost",
            self.bcrypt_cost.into(),
            MIN_BCRYPT_COST.into(),
            MAX_BCRYPT_COST.into(),
        )
    }

    /// Out-of-range lifetimes saturate here; issuing with them then fails
    /// instead of panicking. [`ApiConfig::validate`] rejects them up front.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            access_token_ttl: Duration::try_minutes(self.access_token_ttl_minutes)
                .unwrap_or(Duration::MAX),
            refresh_token_ttl: Duration::try_days(self.refresh_token_ttl_days)
                .unwrap_or(Duration::MAX),
            call_timeout: std::time::Duration::from_millis(self.store_timeout_ms),
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    /// Access token lifetime as reported to clients in `expiresIn`.
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.access_token_ttl_minutes.saturating_mul(60)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("pg_connection_url", &self.pg_connection_url)
            .field("redis_url", &self.redis_url)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_follows_fields() {
        let mut config = ApiConfig::new("s");
        config.access_token_ttl_minutes = 5;
        config.refresh_token_ttl_days = 7;
        config.store_timeout_ms = 250;

        let session = config.session_config();
        assert_eq!(session.access_token_ttl, chrono::Duration::minutes(5));
        assert_eq!(session.refresh_token_ttl, chrono::Duration::days(7));
        assert_eq!(session.call_timeout, std::time::Duration::from_millis(250));
        assert_eq!(config.access_token_ttl_secs(), 300);
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(ApiConfig::new("s").validate(), Ok(()));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut config = ApiConfig::new("s");
        config.refresh_token_ttl_days = 100_000_000;
        let err = config.validate().unwrap_err();
        assert_eq!(err.field, "refresh_token_ttl_days");

        let mut config = ApiConfig::new("s");
        config.access_token_ttl_minutes = 0;
        assert_eq!(
            config.validate().unwrap_err().field,
            "access_token_ttl_minutes"
        );

        let mut config = ApiConfig::new("s");
        config.store_timeout_ms = 0;
        assert_eq!(config.validate().unwrap_err().field, "store_timeout_ms");

        let mut config = ApiConfig::new("s");
        config.bcrypt_cost = 99;
        assert_eq!(config.validate().unwrap_err().field, "bcrypt_cost");
    }

    #[test]
    fn huge_lifetimes_do_not_panic_when_converted() {
        let mut config = ApiConfig::new("s");
        config.access_token_ttl_minutes = i64::MAX;
        config.refresh_token_ttl_days = i64::MAX;

        let session = config.session_config();
        assert_eq!(session.access_token_ttl, chrono::Duration::MAX);
        assert_eq!(session.refresh_token_ttl, chrono::Duration::MAX);
        assert_eq!(config.access_token_ttl_secs(), i64::MAX);
    }

    #[test]
    fn debug_hides_secret() {
        let rendered = format!("{:?}", ApiConfig::new("super-secret-value"));
        assert!(!rendered.contains("super-secret-value"));
    }
}
