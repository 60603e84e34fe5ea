//! Environment-driven server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use treeindex::config::DEFAULT_CACHE_MAX_AGE_HOURS;
use treeindex::IndexConfig;

use crate::error::ServerError;

pub const ADDR_VAR: &str = "TREEINDEX_ADDR";
pub const CACHE_DIR_VAR: &str = "TREEINDEX_CACHE_DIR";
pub const CACHE_MAX_AGE_VAR: &str = "TREEINDEX_CACHE_MAX_AGE_HOURS";

pub const DEFAULT_ADDR: &str = "0.0.0.0:5000";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub index: IndexConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let addr_raw = value(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw.parse::<SocketAddr>().map_err(|error| {
            ServerError::Config(format!("{ADDR_VAR}={addr_raw} is not a socket address: {error}"))
        })?;

        let cache_dir = match value(CACHE_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir()?,
        };

        let max_age_hours = match value(CACHE_MAX_AGE_VAR) {
            Some(raw) => raw.parse::<u64>().map_err(|error| {
                ServerError::Config(format!(
                    "{CACHE_MAX_AGE_VAR}={raw} is not a number of hours: {error}"
                ))
            })?,
            None => DEFAULT_CACHE_MAX_AGE_HOURS,
        };

        Ok(Self {
            addr,
            index: IndexConfig::new(cache_dir).with_cache_max_age_hours(max_age_hours),
        })
    }
}

fn default_cache_dir() -> Result<PathBuf, ServerError> {
    dirs::cache_dir()
        .map(|dir| dir.join("treeindex"))
        .ok_or_else(|| {
            ServerError::Config(format!(
                "no user cache directory available; set {CACHE_DIR_VAR}"
            ))
        })
}
