//! Remote data sources
//!
//! Two traits sit between the caches and the network so tests can substitute
//! fakes: [`SpotDataSource`] for the bulk interruption dataset and
//! [`PricingSource`] for per-(region, OS) on-demand rates.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::models::{OperatingSystem, PricingResponse, SpotDataset};

/// Body fragment the pricing endpoint uses when nothing is published
pub const NO_PRICING_DATA_MARKER: &str = "No pricing data found for region";

/// How long a locally cached dataset copy is served before refetching
pub const DATASET_CACHE_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors raised by a data source
///
/// Messages are kept as strings so the error can be cloned to every waiter
/// of a shared fetch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// The endpoint reported that it has no data for the key
    #[error("no data published")]
    NoData,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("invalid payload: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}

/// Supplier of the global interruption/savings dataset
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotDataSource: Send + Sync {
    async fn fetch_dataset(&self) -> Result<SpotDataset, SourceError>;
}

/// Supplier of on-demand pricing for one (region, OS)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PricingSource: Send + Sync {
    /// Returns [`SourceError::NoData`] when the endpoint explicitly has nothing
    /// for the key; every other error is a transient fetch failure.
    async fn fetch_pricing(
        &self,
        region: &str,
        os: OperatingSystem,
    ) -> Result<PricingResponse, SourceError>;
}

fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .gzip(true)
        .build()
        .map_err(SourceError::from)
}

/// Bulk dataset over HTTP GET
pub struct HttpSpotDataSource {
    client: Client,
    url: String,
}

impl HttpSpotDataSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: url.into(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        Self::new(config.spot_data_url.clone(), config.http_timeout)
    }
}

#[async_trait]
impl SpotDataSource for HttpSpotDataSource {
    async fn fetch_dataset(&self) -> Result<SpotDataset, SourceError> {
        debug!(url = %self.url, "Fetching spot advisor dataset");

        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let dataset = response.json::<SpotDataset>().await?;
        debug!(
            regions = dataset.regions.len(),
            instance_types = dataset.instance_specs.len(),
            "Spot advisor dataset received"
        );
        Ok(dataset)
    }
}

/// Map a non-success pricing response to a source error.
///
/// A 404 carrying the "no data" message is the endpoint's explicit negative
/// answer; anything else is a failure that may succeed on a later call.
pub fn classify_pricing_failure(status: StatusCode, body: &str) -> SourceError {
    if status == StatusCode::NOT_FOUND && body.contains(NO_PRICING_DATA_MARKER) {
        SourceError::NoData
    } else {
        SourceError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        }
    }
}

/// On-demand pricing from the local pricing endpoint
pub struct HttpPricingSource {
    client: Client,
    base_url: String,
}

impl HttpPricingSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let base_url: String = base_url.into();
        Ok(Self {
            client: build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self, SourceError> {
        Self::new(config.pricing_api_url.clone(), config.http_timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/api/pricing", self.base_url)
    }
}

#[async_trait]
impl PricingSource for HttpPricingSource {
    async fn fetch_pricing(
        &self,
        region: &str,
        os: OperatingSystem,
    ) -> Result<PricingResponse, SourceError> {
        debug!(region = region, os = %os, "Fetching on-demand pricing");

        let response = self
            .client
            .get(self.endpoint())
            .query(&[("region", region), ("os", os.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_pricing_failure(status, &body));
        }

        Ok(response.json::<PricingResponse>().await?)
    }
}

/// Read-through file cache in front of another dataset source
///
/// A local copy younger than `max_age` is served without touching the network.
/// Only payloads that pass [`SpotDataset::validate`] are written, and a local
/// copy that fails it is deleted. Cache I/O problems are logged and never fail
/// the fetch.
pub struct CachedSpotDataSource<S> {
    inner: S,
    path: PathBuf,
    max_age: Duration,
}

impl<S: SpotDataSource> CachedSpotDataSource<S> {
    pub fn new(inner: S, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            max_age: DATASET_CACHE_MAX_AGE,
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    async fn read_fresh(&self) -> Result<Option<SpotDataset>, SourceError> {
        let metadata = match tokio::fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let age = match metadata.modified() {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .unwrap_or(Duration::ZERO),
            Err(_) => Duration::MAX,
        };
        if age > self.max_age {
            info!(path = %self.path.display(), age_secs = age.as_secs(), "Dataset cache expired");
            return Ok(None);
        }

        let bytes = tokio::fs::read(&self.path).await?;
        let dataset = serde_json::from_slice::<SpotDataset>(&bytes)?;
        if let Err(reason) = dataset.validate() {
            self.discard().await;
            return Err(SourceError::Invalid(reason));
        }
        Ok(Some(dataset))
    }

    /// Remove a local copy that must not be served again
    async fn discard(&self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => info!(path = %self.path.display(), "Removed invalid dataset cache"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove dataset cache"),
        }
    }

    async fn write(&self, dataset: &SpotDataset) -> Result<(), SourceError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec(dataset)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: SpotDataSource> SpotDataSource for CachedSpotDataSource<S> {
    async fn fetch_dataset(&self) -> Result<SpotDataset, SourceError> {
        match self.read_fresh().await {
            Ok(Some(dataset)) => {
                info!(path = %self.path.display(), "Serving spot dataset from local cache");
                return Ok(dataset);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable dataset cache");
            }
        }

        let dataset = self.inner.fetch_dataset().await?;
        // Only a payload that passes the shape check may be persisted
        dataset.validate().map_err(SourceError::Invalid)?;

        match self.write(&dataset).await {
            Ok(()) => debug!(path = %self.path.display(), "Dataset cache refreshed"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to write dataset cache"),
        }

        Ok(dataset)
    }
}
