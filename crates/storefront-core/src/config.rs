//! Client configuration.
//!
//! Supports environment-based configuration with defaults matching the
//! storefront backend.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error};
use crate::retry::RetryPolicy;
use crate::types::BaseUrl;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default path of the refresh endpoint, relative to the base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/refresh";

/// Paths exempt from the 401 refresh flow by default.
pub const DEFAULT_BOOTSTRAP_PATHS: &[&str] = &["/login", "/register", "/refresh"];

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend base URL; request targets are appended to it.
    pub base_url: BaseUrl,
    /// Per-attempt request timeout.
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Backoff for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Targets that never trigger a credential refresh.
    #[serde(default = "default_bootstrap_paths")]
    pub bootstrap_paths: Vec<String>,
    /// Target of the refresh call.
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    /// Headers sent with every request.
    #[serde(default)]
    pub default_headers: BTreeMap<String, String>,
}

fn default_bootstrap_paths() -> Vec<String> {
    DEFAULT_BOOTSTRAP_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl ClientConfig {
    /// Configuration for `base_url` with all other values defaulted.
    pub fn new(base_url: BaseUrl) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            bootstrap_paths: default_bootstrap_paths(),
            refresh_path: default_refresh_path(),
            default_headers: BTreeMap::new(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Reads:
    /// - `STOREFRONT_API_URL` (required): backend base URL
    /// - `STOREFRONT_TIMEOUT_MS`: request timeout in milliseconds
    /// - `STOREFRONT_MAX_RETRIES`: retries after the original attempt
    /// - `STOREFRONT_RETRY_BASE_MS`: base backoff delay in milliseconds
    pub fn from_env() -> Result<Self, Error> {
        let base_url = env::var("STOREFRONT_API_URL")
            .map_err(|_| ConfigError::MissingEnvVar("STOREFRONT_API_URL".into()))?;
        Self::new(BaseUrl::new(base_url)?).with_env_overrides()
    }

    /// Apply the optional tuning variables read by [`from_env`](Self::from_env).
    pub fn with_env_overrides(mut self) -> Result<Self, Error> {
        if let Some(ms) = env_number::<u64>("STOREFRONT_TIMEOUT_MS")? {
            self.timeout = Duration::from_millis(ms);
        }
        if let Some(retries) = env_number::<u32>("STOREFRONT_MAX_RETRIES")? {
            self.retry.max_retries = retries;
        }
        if let Some(ms) = env_number::<u64>("STOREFRONT_RETRY_BASE_MS")? {
            self.retry.base_delay = Duration::from_millis(ms);
        }

        self.validate()?;
        Ok(self)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_bootstrap_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.bootstrap_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Add a header sent with every request. The name is lowercased.
    #[must_use]
    pub fn with_default_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.default_headers
            .insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Whether `target` is an auth-bootstrap endpoint.
    pub fn is_bootstrap(&self, target: &str) -> bool {
        let path = target.split('?').next().unwrap_or(target);
        self.bootstrap_paths
            .iter()
            .any(|p| !p.is_empty() && path.contains(p.as_str()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout cannot be zero".into()).into());
        }
        if self.refresh_path.trim().is_empty() {
            return Err(ConfigError::Invalid("refresh_path cannot be empty".into()).into());
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar {
                name: name.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

pub(crate) mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let ms = Option::<u64>::deserialize(deserializer)?;
        Ok(ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::new(BaseUrl::new("http://localhost:8080/api").unwrap())
    }

    #[test]
    fn defaults() {
        let config = config();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(1000));
        assert_eq!(config.refresh_path, "/refresh");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bootstrap_paths_match_by_substring() {
        let config = config();
        assert!(config.is_bootstrap("/login"));
        assert!(config.is_bootstrap("/register"));
        assert!(config.is_bootstrap("/refresh"));
        assert!(config.is_bootstrap("/auth/login"));
        assert!(!config.is_bootstrap("/cart"));
        assert!(!config.is_bootstrap("/products?redirect=/login"));
    }

    #[test]
    fn custom_bootstrap_paths() {
        let config = config().with_bootstrap_paths(["/session"]);
        assert!(config.is_bootstrap("/session/new"));
        assert!(!config.is_bootstrap("/login"));
    }

    #[test]
    fn validation() {
        assert!(config().with_timeout(Duration::ZERO).validate().is_err());
        assert!(config().with_refresh_path("  ").validate().is_err());
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url": "https://shop.example.com", "timeout": 10000}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.bootstrap_paths.len(), 3);
    }

    #[test]
    fn default_headers_are_lowercased() {
        let config = config().with_default_header("X-Client", "storefront");
        assert_eq!(
            config.default_headers.get("x-client").map(String::as_str),
            Some("storefront")
        );
    }
}
