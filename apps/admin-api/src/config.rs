//! Application configuration loaded from environment variables.
//!
//! Fail-fast loading with validation: required variables must be present and
//! valid or the application exits with a clear error message.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use zonesync_pipeline::coverage::CoverageThresholds;
use zonesync_pipeline::retry::RetryPolicy;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable holds an unparseable value.
    #[error("Invalid value for {name}: {message}")]
    Invalid {
        name: &'static str,
        message: String,
    },
}

/// Runtime configuration for the admin API.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Maximum pooled database connections.
    pub db_max_connections: u32,

    /// Socket address to bind the HTTP server to.
    pub bind_addr: SocketAddr,

    /// Navio API base URL.
    pub navio_api_url: String,

    /// Navio API key.
    pub navio_api_key: String,

    /// Classifier service base URL.
    pub classifier_url: String,

    /// Classifier service API key.
    pub classifier_api_key: String,

    /// Backoff policy for upstream calls and commit steps.
    pub retry: RetryPolicy,

    /// Coverage health thresholds.
    pub coverage: CoverageThresholds,
}

impl Config {
    /// Load configuration from the environment, failing fast on problems.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = required("DATABASE_URL")?;
        let navio_api_url = required("NAVIO_API_URL")?;
        let navio_api_key = required("NAVIO_API_KEY")?;
        let classifier_url = required("CLASSIFIER_URL")?;
        let classifier_api_key = required("CLASSIFIER_API_KEY")?;

        let bind_addr = parsed("BIND_ADDR", "0.0.0.0:8080")?;
        let db_max_connections = parsed("DB_MAX_CONNECTIONS", "10")?;

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parsed("RETRY_MAX_ATTEMPTS", "3")?,
            base_delay: Duration::from_millis(parsed(
                "RETRY_BASE_DELAY_MS",
                &defaults.base_delay.as_millis().to_string(),
            )?),
            max_delay: Duration::from_millis(parsed(
                "RETRY_MAX_DELAY_MS",
                &defaults.max_delay.as_millis().to_string(),
            )?),
            jitter: parsed("RETRY_JITTER", "true")?,
        };

        let threshold_defaults = CoverageThresholds::default();
        let coverage = CoverageThresholds {
            uncovered_warning: parsed(
                "COVERAGE_UNCOVERED_WARNING",
                &threshold_defaults.uncovered_warning.to_string(),
            )?,
            uncovered_critical: parsed(
                "COVERAGE_UNCOVERED_CRITICAL",
                &threshold_defaults.uncovered_critical.to_string(),
            )?,
            orphaned_warning: parsed(
                "COVERAGE_ORPHANED_WARNING",
                &threshold_defaults.orphaned_warning.to_string(),
            )?,
        };

        Ok(Self {
            database_url,
            db_max_connections,
            bind_addr,
            navio_api_url,
            navio_api_key,
            classifier_url,
            classifier_api_key,
            retry,
            coverage,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parsed<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_the_default() {
        let value: u32 = parsed("ZONESYNC_TEST_UNSET_VAR", "7").unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        std::env::set_var("ZONESYNC_TEST_BAD_NUMBER", "not-a-number");
        let err = parsed::<u32>("ZONESYNC_TEST_BAD_NUMBER", "1").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "ZONESYNC_TEST_BAD_NUMBER",
                ..
            }
        ));
        std::env::remove_var("ZONESYNC_TEST_BAD_NUMBER");
    }
}
