//! Configuration loading and representation.
//!
//! Everything comes from environment variables; see `AppConfig::from_env`.

use std::net::SocketAddr;

use anyhow::Context;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_PROVIDER: &str = "https://licensehub.local";

/// Upstream license server used by the remote issuance engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind: SocketAddr,
    /// When set, Postgres backs both the store and the issuance engine.
    pub database_url: Option<String>,
    /// Provider URI stamped into locally generated licenses.
    pub provider: String,
    pub remote: Option<RemoteConfig>,
}

impl AppConfig {
    /// Read `LICENSEHUB_BIND`, `DATABASE_URL`, `LICENSEHUB_PROVIDER` and the
    /// `LCP_SERVER_*` triple from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_raw = non_empty("LICENSEHUB_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .with_context(|| format!("LICENSEHUB_BIND is not a socket address: {bind_raw}"))?;

        let remote = match non_empty("LCP_SERVER_URL") {
            Some(base_url) => Some(RemoteConfig {
                base_url,
                username: non_empty("LCP_SERVER_USER")
                    .context("LCP_SERVER_USER is required when LCP_SERVER_URL is set")?,
                password: non_empty("LCP_SERVER_PASSWORD")
                    .context("LCP_SERVER_PASSWORD is required when LCP_SERVER_URL is set")?,
            }),
            None => None,
        };

        Ok(Self {
            bind,
            database_url: non_empty("DATABASE_URL"),
            provider: non_empty("LICENSEHUB_PROVIDER")
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            remote,
        })
    }
}
