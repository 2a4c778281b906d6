//! Analytics configuration loading and validation
//!
//! Config file resolution follows the same priority order as the other
//! SmarTalk tools:
//! 1. Explicit path (command-line argument)
//! 2. `SMARTALK_ANALYTICS_CONFIG` environment variable
//! 3. `<platform config dir>/smartalk/analytics.toml`
//! 4. Compiled defaults
//!
//! Missing files are not fatal: a warning is logged and defaults are used.
//! A file that exists but does not parse is an error.

use crate::time::millis_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SMARTALK_ANALYTICS_CONFIG";

/// Environment override for `enabled` ("true"/"false"/"1"/"0")
pub const ENABLED_ENV_VAR: &str = "SMARTALK_ANALYTICS_ENABLED";

/// Environment override for `base_url`
pub const URL_ENV_VAR: &str = "SMARTALK_ANALYTICS_URL";

/// Path of the batch ingestion route, relative to `base_url`
pub const BATCH_PATH: &str = "/analytics/events/batch";

/// Analytics pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// When false, tracking calls are no-ops
    pub enabled: bool,
    /// Backend API root, e.g. `http://localhost:3001/api/v1`
    pub base_url: String,
    /// Queue length that triggers an immediate flush
    pub batch_size: usize,
    /// Period of the recurring flush timer
    pub flush_interval_ms: u64,
    /// Upper bound on a single batch delivery
    pub request_timeout_ms: u64,
    /// Buffer ceiling; the oldest events are dropped past it
    pub max_buffer_size: usize,
    /// Backoff applied after consecutive delivery failures
    pub retry: RetryConfig,
}

/// Exponential backoff bounds for failed deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:3001/api/v1".to_string(),
            batch_size: 10,
            flush_interval_ms: 30_000,
            request_timeout_ms: 5_000,
            max_buffer_size: 1_000,
            retry: RetryConfig::default(),
        }
    }
}

impl AnalyticsConfig {
    /// Resolve, load, apply environment overrides and validate
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_path) {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading analytics config");
                Self::from_file(&path)?
            }
            Some(path) => {
                warn!(
                    path = %path.display(),
                    "Analytics config file not found, using defaults"
                );
                Self::default()
            }
            None => {
                debug!("No analytics config file, using compiled defaults");
                Self::default()
            }
        };

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file (no env overrides, no validation)
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse TOML text; absent keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `SMARTALK_ANALYTICS_ENABLED` and `SMARTALK_ANALYTICS_URL`
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var(ENABLED_ENV_VAR) {
            self.enabled = parse_bool(&raw).ok_or_else(|| {
                Error::Config(format!("{} must be true/false/1/0, got {:?}", ENABLED_ENV_VAR, raw))
            })?;
        }
        if let Ok(url) = std::env::var(URL_ENV_VAR) {
            self.base_url = url;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        validate_pipeline_limits(
            self.batch_size,
            self.flush_interval(),
            self.request_timeout(),
            self.max_buffer_size,
            self.retry,
        )
    }

    /// Full URL of the batch ingestion endpoint
    pub fn batch_endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), BATCH_PATH)
    }

    pub fn flush_interval(&self) -> Duration {
        millis_to_duration(self.flush_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        millis_to_duration(self.request_timeout_ms)
    }
}

/// Limits shared by the file config and the runtime buffer options
pub fn validate_pipeline_limits(
    batch_size: usize,
    flush_interval: Duration,
    request_timeout: Duration,
    max_buffer_size: usize,
    retry: RetryConfig,
) -> Result<()> {
    if batch_size == 0 {
        return Err(Error::Config("batch_size must be at least 1".to_string()));
    }
    if flush_interval.is_zero() {
        return Err(Error::Config("flush interval must be positive".to_string()));
    }
    if request_timeout.is_zero() {
        return Err(Error::Config("request timeout must be positive".to_string()));
    }
    if max_buffer_size < batch_size {
        return Err(Error::Config(format!(
            "max_buffer_size ({}) must be >= batch_size ({})",
            max_buffer_size, batch_size
        )));
    }
    if retry.base_delay_ms == 0 || retry.max_delay_ms < retry.base_delay_ms {
        return Err(Error::Config(format!(
            "retry delays must satisfy 0 < base_delay_ms ({}) <= max_delay_ms ({})",
            retry.base_delay_ms, retry.max_delay_ms
        )));
    }
    Ok(())
}

/// Pick the config file candidate by priority; `None` when nothing applies
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config dir, only if present
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/smartalk/analytics.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("smartalk").join("analytics.toml"))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AnalyticsConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.enabled);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.flush_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_batch_endpoint_joins_paths() {
        let mut config = AnalyticsConfig::default();
        config.base_url = "https://api.smartalk.app/api/v1/".to_string();
        assert_eq!(
            config.batch_endpoint(),
            "https://api.smartalk.app/api/v1/analytics/events/batch"
        );
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AnalyticsConfig::from_toml_str("batch_size = 25\n[retry]\nmax_delay_ms = 5000\n")
            .expect("partial config should parse");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.flush_interval_ms, 30_000);
        assert_eq!(config.retry.base_delay_ms, 1_000);
        assert_eq!(config.retry.max_delay_ms, 5_000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cases: [fn(&mut AnalyticsConfig); 7] = [
            |c| c.batch_size = 0,
            |c| c.flush_interval_ms = 0,
            |c| c.request_timeout_ms = 0,
            |c| c.max_buffer_size = 5,
            |c| c.base_url = "localhost:3001".to_string(),
            |c| c.retry.base_delay_ms = 0,
            |c| c.retry.max_delay_ms = 10,
        ];

        for mutate in cases {
            let mut config = AnalyticsConfig::default();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(Error::Config(_))),
                "expected rejection for {:?}",
                config
            );
        }
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let result = AnalyticsConfig::from_toml_str("batch_size = \"lots\"");
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
