use core_config::{ConfigError, FromEnv, env_or_default, env_parse};
use std::time::Duration;

use crate::retry::RetryConfig;

/// Public bulk interruption/savings feed
pub const DEFAULT_SPOT_DATA_URL: &str =
    "https://spot-bid-advisor.s3.amazonaws.com/spot-advisor-data.json";

/// Local pricing endpoint served by `spot-advisor serve`
pub const DEFAULT_PRICING_API_URL: &str = "http://localhost:8000";

/// Where the domain fetches its two datasets from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub spot_data_url: String,
    pub pricing_api_url: String,
    pub retry: RetryConfig,
    pub http_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            spot_data_url: DEFAULT_SPOT_DATA_URL.to_string(),
            pricing_api_url: DEFAULT_PRICING_API_URL.to_string(),
            retry: RetryConfig::default(),
            http_timeout: Duration::from_secs(30),
        }
    }
}

impl FromEnv for SourceConfig {
    /// - SPOT_DATA_URL: bulk dataset URL
    /// - PRICING_API_URL: pricing endpoint base (default http://localhost:8000)
    /// - SPOT_FETCH_MAX_RETRIES: retries after the first dataset attempt (default 3)
    /// - SPOT_FETCH_RETRY_DELAY_MS: pause between attempts (default 1000)
    /// - HTTP_TIMEOUT_SECS: per-request timeout (default 30)
    fn from_env() -> Result<Self, ConfigError> {
        let max_retries = env_parse("SPOT_FETCH_MAX_RETRIES", 3u32)?;
        let delay_ms = env_parse("SPOT_FETCH_RETRY_DELAY_MS", 1000u64)?;
        let timeout_secs = env_parse("HTTP_TIMEOUT_SECS", 30u64)?;

        if timeout_secs == 0 {
            return Err(ConfigError::ParseError {
                key: "HTTP_TIMEOUT_SECS".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            spot_data_url: env_or_default("SPOT_DATA_URL", DEFAULT_SPOT_DATA_URL),
            pricing_api_url: env_or_default("PRICING_API_URL", DEFAULT_PRICING_API_URL),
            retry: RetryConfig::new()
                .with_max_retries(max_retries)
                .with_delay(Duration::from_millis(delay_ms)),
            http_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
