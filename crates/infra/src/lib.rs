//! Infrastructure layer: stores, issuance engines, configuration.

pub mod config;
pub mod issuer;
pub mod store;

pub use config::AppConfig;
pub use store::{InMemoryStore, PostgresStore};
