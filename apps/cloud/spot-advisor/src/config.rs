//! Configuration for the spot advisor binary

use core_config::server::ServerConfig;
use core_config::{env_or_default, ConfigError, FromEnv};
use domain_spot::SourceConfig;
use std::path::PathBuf;

const DEFAULT_PRICING_SNAPSHOT_PATH: &str = "data/ec2_pricing.json";
const DEFAULT_SPOT_DATA_CACHE_PATH: &str = "data/spot_advisor_data.json";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub sources: SourceConfig,
    /// Combined on-demand snapshot written by `download-pricing`
    pub pricing_snapshot_path: PathBuf,
    /// Local copy of the bulk interruption dataset
    pub spot_data_cache_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Adds PRICING_SNAPSHOT_PATH and SPOT_DATA_CACHE_PATH on top of the
    /// server and source settings.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig::from_env()?,
            sources: SourceConfig::from_env()?,
            pricing_snapshot_path: env_or_default(
                "PRICING_SNAPSHOT_PATH",
                DEFAULT_PRICING_SNAPSHOT_PATH,
            )
            .into(),
            spot_data_cache_path: env_or_default(
                "SPOT_DATA_CACHE_PATH",
                DEFAULT_SPOT_DATA_CACHE_PATH,
            )
            .into(),
        })
    }
}
