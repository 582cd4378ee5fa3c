//! # acct_core
//!
//! Core domain logic for Acct.
//!
//! The session subsystem lives in [`auth`]; it depends on a [`kv::KeyValueStore`]
//! for refresh-token state and a [`users::UserDirectory`] for user records, both
//! injected at construction.

pub mod auth;
pub mod kv;
pub mod migrate;
pub mod models;
pub mod users;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
