// Booking client configuration: defaults, environment overrides and validation

use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

pub const ENV_BASE_URL: &str = "TRIP_BOOKING_BASE_URL";
pub const ENV_API_KEY: &str = "TRIP_BOOKING_API_KEY";
pub const ENV_TIMEOUT_MS: &str = "TRIP_BOOKING_TIMEOUT_MS";
pub const ENV_MAX_RETRIES: &str = "TRIP_BOOKING_MAX_RETRIES";
pub const ENV_CACHE_TTL_SECONDS: &str = "TRIP_BOOKING_CACHE_TTL_SECONDS";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub retry_config: RetryConfig,
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            api_key: String::new(),
            timeout_ms: 10_000,
            retry_config: RetryConfig::default(),
            cache_ttl_seconds: 120,
            cache_max_entries: 64,
        }
    }
}

// Retries only ever apply to idempotent reads
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ClientError> {
    value
        .trim()
        .parse()
        .map_err(|_| ClientError::ConfigError(format!("{} has an invalid value '{}'", name, value)))
}

impl ClientConfig {
    /// Defaults overlaid with any `TRIP_BOOKING_*` environment variables, then validated.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        info!("Booking client configured for {}", config.base_url);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ClientError> {
        if let Ok(val) = env::var(ENV_BASE_URL) {
            self.base_url = val;
        }
        if let Ok(val) = env::var(ENV_API_KEY) {
            self.api_key = val;
        }
        if let Ok(val) = env::var(ENV_TIMEOUT_MS) {
            self.timeout_ms = parse_env(ENV_TIMEOUT_MS, &val)?;
        }
        if let Ok(val) = env::var(ENV_MAX_RETRIES) {
            self.retry_config.max_retries = parse_env(ENV_MAX_RETRIES, &val)?;
        }
        if let Ok(val) = env::var(ENV_CACHE_TTL_SECONDS) {
            self.cache_ttl_seconds = parse_env(ENV_CACHE_TTL_SECONDS, &val)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(ClientError::ConfigError("base_url cannot be empty".to_string()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ClientError::ConfigError(format!(
                "base_url must be an http(s) URL, got '{}'",
                url
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ClientError::ConfigError(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        let retry = &self.retry_config;
        if retry.backoff_multiplier < 1.0 {
            return Err(ClientError::ConfigError(
                "backoff_multiplier must be at least 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(ClientError::ConfigError(
                "jitter_factor must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test_case(ClientConfig { base_url: "".to_string(), ..Default::default() }; "#1 empty url")]
    #[test_case(ClientConfig { base_url: "ftp://hotels".to_string(), ..Default::default() }; "#2 wrong scheme")]
    #[test_case(ClientConfig { timeout_ms: 0, ..Default::default() }; "#3 zero timeout")]
    #[test_case(ClientConfig { retry_config: RetryConfig { jitter_factor: 1.5, ..Default::default() }, ..Default::default() }; "#4 jitter out of range")]
    #[test_case(ClientConfig { retry_config: RetryConfig { backoff_multiplier: 0.5, ..Default::default() }, ..Default::default() }; "#5 shrinking backoff")]
    fn test_invalid_config(config: ClientConfig) {
        assert!(matches!(config.validate(), Err(ClientError::ConfigError(_))));
    }

    // Single test touching the environment so parallel tests don't race on it
    #[test]
    fn test_env_overrides() {
        env::set_var(ENV_BASE_URL, "https://hotels.example.com/v2");
        env::set_var(ENV_TIMEOUT_MS, "2500");
        env::set_var(ENV_MAX_RETRIES, "1");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.base_url, "https://hotels.example.com/v2");
        assert_eq!(config.timeout(), Duration::from_millis(2500));
        assert_eq!(config.retry_config.max_retries, 1);

        env::set_var(ENV_CACHE_TTL_SECONDS, "soon");
        let err = ClientConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(ENV_CACHE_TTL_SECONDS));

        for name in [ENV_BASE_URL, ENV_TIMEOUT_MS, ENV_MAX_RETRIES, ENV_CACHE_TTL_SECONDS] {
            env::remove_var(name);
        }
    }
}
