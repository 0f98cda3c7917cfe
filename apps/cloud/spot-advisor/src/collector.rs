//! Pricing snapshot collector
//!
//! Downloads the per-(region, OS) on-demand metered-unit maps from the public
//! pricing site and combines them into the snapshot file `PricingCatalog`
//! reads. Documents that fail to download are logged and left out.

use chrono::{DateTime, Utc};
use domain_spot::regions::RegionInfo;
use domain_spot::{MeteredUnitMap, OperatingSystem, PricingSnapshot};
use futures::future::join_all;
use observability::{OperationTimer, SpotAdvisorMetrics};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// On-demand metered-unit maps, keyed by `{display name}/{os}/index.json`
pub const PRICING_SITE_BASE_URL: &str = "https://b0.p.awsstatic.com/pricing/2.0/meteredUnitMaps/ec2/USD/current/ec2-ondemand-without-sec-sel";

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("pricing site returned {0}")]
    Status(StatusCode),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

/// A (region, OS) document that could not be downloaded
#[derive(Debug, Clone, Serialize)]
pub struct FailedDocument {
    pub region: String,
    pub os: OperatingSystem,
    pub error: String,
}

/// Result of a snapshot download run
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResult {
    #[serde(skip)]
    pub snapshot: PricingSnapshot,
    pub documents_fetched: usize,
    pub failed: Vec<FailedDocument>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

pub struct SnapshotCollector {
    client: Client,
    base_url: String,
}

impl SnapshotCollector {
    pub fn new(timeout: Duration) -> Result<Self, CollectError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;
        Ok(Self {
            client,
            base_url: PRICING_SITE_BASE_URL.to_string(),
        })
    }

    /// Point the collector at a different pricing site mirror
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn document_url(&self, display_name: &str, os: OperatingSystem) -> String {
        format!(
            "{}/{}/{}/index.json",
            self.base_url,
            urlencoding::encode(display_name),
            os
        )
    }

    async fn fetch_document(
        &self,
        region: &RegionInfo,
        os: OperatingSystem,
    ) -> Result<MeteredUnitMap, CollectError> {
        let url = self.document_url(region.pricing_name, os);
        debug!(region = region.code, os = %os, url = %url, "Downloading pricing document");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CollectError::Status(response.status()));
        }
        Ok(response.json::<MeteredUnitMap>().await?)
    }

    /// Download both OS documents for every region concurrently
    pub async fn collect(&self, regions: &[RegionInfo]) -> CollectionResult {
        let timer = OperationTimer::start();

        let jobs = regions.iter().flat_map(|region| {
            OperatingSystem::ALL
                .into_iter()
                .map(move |os| async move { (region, os, self.fetch_document(region, os).await) })
        });
        let results = join_all(jobs).await;

        let mut snapshot = PricingSnapshot::new();
        let mut documents_fetched = 0;
        let mut failed = Vec::new();

        for region in regions {
            snapshot.entry(region.code.to_string()).or_default();
        }

        for (region, os, result) in results {
            match result {
                Ok(document) => {
                    documents_fetched += 1;
                    snapshot
                        .entry(region.code.to_string())
                        .or_default()
                        .insert(os, document);
                }
                Err(e) => {
                    error!(
                        region = region.code,
                        os = %os,
                        error = %e,
                        "Failed to download pricing document"
                    );
                    failed.push(FailedDocument {
                        region: region.code.to_string(),
                        os,
                        error: e.to_string(),
                    });
                }
            }
        }

        let duration = timer.elapsed();
        SpotAdvisorMetrics::record_snapshot_collection(documents_fetched, failed.len(), duration);

        CollectionResult {
            snapshot,
            documents_fetched,
            failed,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

/// Write the combined snapshot, creating the parent directory if needed
pub async fn write_snapshot(path: &Path, snapshot: &PricingSnapshot) -> Result<(), CollectError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec(snapshot)?;
    tokio::fs::write(path, bytes).await?;

    info!(path = %path.display(), regions = snapshot.len(), "Pricing snapshot written");
    Ok(())
}
