//! Service configuration
//!
//! YAML file with `${VAR}` / `${VAR:-default}` expansion:
//!
//! ```yaml
//! connection:
//!   connection_string: "DataSource=${AS400_HOST};UserID=${AS400_USER};Password=${AS400_PASSWORD}"
//!   connect_timeout_ms: 10000
//! retry:
//!   max_attempts: 5
//!   backoff_ms: [1000, 2000, 4000, 8000, 16000]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use crate::connection::ConnectionConfig;
use crate::error::{Error, Result};
use crate::retry::{RetryPolicy, DEFAULT_BACKOFF_SECS};

static ENV_VAR_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)(?::-([^}]*))?\}")
        .expect("env var regex pattern is invalid - this is a bug")
});

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Connection settings
    pub connection: ConnectionSettings,

    /// Retry settings
    #[serde(default)]
    pub retry: RetrySettings,
}

/// Connection section
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Driver connection string
    pub connection_string: String,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Application name reported to the server
    #[serde(default)]
    pub application_name: Option<String>,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field(
                "connection_string",
                &ConnectionConfig::new(self.connection_string.as_str())
                    .redacted_connection_string(),
            )
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("application_name", &self.application_name)
            .finish()
    }
}

/// Retry section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempt budget, initial attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff per failed attempt in milliseconds
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_max_attempts() -> u32 {
    u32::try_from(DEFAULT_BACKOFF_SECS.len()).unwrap_or(u32::MAX)
}

fn default_backoff_ms() -> Vec<u64> {
    DEFAULT_BACKOFF_SECS.iter().map(|s| s * 1000).collect()
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = Self::expand_env_vars(content);

        let config: Self = serde_yaml::from_str(&expanded)
            .map_err(|e| Error::config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Expand environment variables in the format ${VAR} or ${VAR:-default}
    fn expand_env_vars(content: &str) -> String {
        ENV_VAR_REGEX
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                let default = caps.get(2).map(|m| m.as_str());

                std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
            })
            .to_string()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.connection.connection_string.trim().is_empty() {
            return Err(Error::config("connection.connection_string must not be empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }
        if self.retry.max_attempts > 1 && self.retry.backoff_ms.is_empty() {
            return Err(Error::config(
                "retry.backoff_ms must list at least one delay when retries are enabled",
            ));
        }
        Ok(())
    }

    /// Connection configuration for the driver factory
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.connection.connection_string.as_str())
            .with_connect_timeout(self.connection.connect_timeout_ms);
        if let Some(name) = &self.connection.application_name {
            config = config.with_application_name(name.as_str());
        }
        config
    }

    /// Retry policy described by the retry section
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            self.retry
                .backoff_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
        )
    }
}
