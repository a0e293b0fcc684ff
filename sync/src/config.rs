//! Configuration management for the sync service.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::reconcile::DEFAULT_PARALLELISM;
use crate::remote::RemoteConfig;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway host address
    pub host: String,
    /// Gateway port
    pub port: u16,
    /// SQLite URL of the local cache
    pub database_url: String,
    /// Base URL of the remote REST store
    pub remote_url: String,
    /// Bearer token sent to the remote store
    pub remote_token: Option<String>,
    /// Connect and request timeout for remote calls
    pub remote_timeout: Duration,
    /// How often the lifecycle worker runs
    pub lifecycle_interval: Duration,
    /// How often reachability is probed
    pub probe_interval: Duration,
    /// Settle time after the network comes back before syncing
    pub stabilization: Duration,
    /// Concurrent pushes per entity kind
    pub sync_parallelism: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://groundbook.db".to_string());

        let remote_url = env::var("REMOTE_API_URL").map_err(|_| ConfigError::MissingRemoteUrl)?;
        let remote_token = env::var("REMOTE_API_TOKEN").ok().filter(|t| !t.is_empty());

        Ok(Self {
            host,
            port,
            database_url,
            remote_url,
            remote_token,
            remote_timeout: Duration::from_secs(number("REMOTE_TIMEOUT_SECS", 30)?),
            lifecycle_interval: Duration::from_secs(number("LIFECYCLE_INTERVAL_SECS", 300)?),
            probe_interval: Duration::from_secs(number("PROBE_INTERVAL_SECS", 15)?),
            stabilization: Duration::from_millis(number("STABILIZATION_MS", 2000)?),
            sync_parallelism: number("SYNC_PARALLELISM", DEFAULT_PARALLELISM)?,
        })
    }

    /// Settings for the remote client.
    pub fn remote(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.remote_url.clone(),
            token: self.remote_token.clone(),
            timeout: self.remote_timeout,
        }
    }
}

fn number<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_API_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {0} value")]
    InvalidNumber(&'static str),
}
