//! Domain models shared by the core services and the transport crates.

pub mod auth;
pub mod user;
