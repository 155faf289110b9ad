//! Navio client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Navio API client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavioConfig {
    /// Base URL of the Navio API.
    pub base_url: String,

    /// API key, sent as the `X-Api-Key` header.
    pub api_key: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl NavioConfig {
    /// Create a config with default timeouts.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}
