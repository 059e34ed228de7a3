//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PAPERBACK_API_BASE_URL` - Backend base URL including the `/api` prefix
//!   (default: `http://localhost:8080/api`)
//! - `PAPERBACK_HTTP_TIMEOUT_SECS` - Outbound request timeout (default: 10)
//! - `PAPERBACK_CREDENTIAL_PATH` - Durable credential file location
//!   (default: `.paperback/credential.json`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default outbound request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client application configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL including the `/api` prefix.
    pub api_base_url: Url,
    /// Outbound request timeout.
    pub http_timeout: Duration,
    /// Durable credential file location.
    pub credential_path: PathBuf,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid (bad URL,
    /// non-numeric timeout).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_env_or_default("PAPERBACK_API_BASE_URL", "http://localhost:8080/api")
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PAPERBACK_API_BASE_URL".to_string(), e.to_string())
            })?;

        let timeout_secs = get_env_or_default(
            "PAPERBACK_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("PAPERBACK_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let credential_path = PathBuf::from(get_env_or_default(
            "PAPERBACK_CREDENTIAL_PATH",
            ".paperback/credential.json",
        ));

        Ok(Self {
            api_base_url,
            http_timeout: Duration::from_secs(timeout_secs),
            credential_path,
        })
    }

    /// Build a configuration directly, for tests and embedding.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            credential_path: PathBuf::from(".paperback/credential.json"),
        }
    }
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
