//! Client configuration, read from `PLANNER_*` environment variables

use std::time::Duration;
use thiserror::Error;

use crate::api::RateLimitConfig;
use crate::plan::store::DEFAULT_ARTIFACT_KEY;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),
}

/// Dashboard client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the artifact API. `None` runs local-only.
    pub api_base_url: Option<String>,

    /// Remote key the plan is stored under
    pub artifact_key: String,

    /// SQLite file for the local cache. `None` keeps it in memory.
    pub db_path: Option<String>,

    pub request_timeout_secs: u64,

    /// Plan refresh cadence (0 = no background refresh)
    pub refresh_interval_secs: u64,

    /// Remote calls per second, burst included
    pub requests_per_second: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            artifact_key: DEFAULT_ARTIFACT_KEY.to_string(),
            db_path: None,
            request_timeout_secs: 10,
            refresh_interval_secs: 5,
            requests_per_second: 5,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparseable values
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            api_base_url: text("PLANNER_API_BASE_URL"),

            artifact_key: text("PLANNER_ARTIFACT_KEY").unwrap_or(defaults.artifact_key),

            db_path: text("PLANNER_DB_PATH"),

            request_timeout_secs: text("PLANNER_REQUEST_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),

            refresh_interval_secs: text("PLANNER_REFRESH_INTERVAL_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.refresh_interval_secs),

            requests_per_second: text("PLANNER_REQUESTS_PER_SECOND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.requests_per_second),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = &self.api_base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "api_base_url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }
        if self.artifact_key.contains('/') {
            return Err(ConfigError::Invalid("artifact_key must not contain '/'".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        if self.requests_per_second == 0 {
            return Err(ConfigError::Invalid("requests_per_second must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            requests_per_second: self.requests_per_second,
            burst_size: self.requests_per_second,
        }
    }
}
