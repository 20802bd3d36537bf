//! Client configuration.
//!
//! The defaults point at a local backend behind the usual `/api` proxy
//! prefix; deployments override them through the environment.

use serde::{Deserialize, Serialize};

/// Default backend base URL (development proxy).
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Environment variable overriding the backend base URL.
const ENV_BASE_URL: &str = "PAYCACHE_API_URL";

/// Environment variable overriding the request timeout, in seconds.
const ENV_TIMEOUT_SECS: &str = "PAYCACHE_TIMEOUT_SECS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Some(secs) = std::env::var(ENV_TIMEOUT_SECS)
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.request_timeout_secs = secs;
        }
        config
    }
}
