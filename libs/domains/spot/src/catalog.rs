//! Pricing catalog
//!
//! Answers `(region, OS)` pricing lookups from a local snapshot of the public
//! on-demand metered-unit maps. The snapshot file has the shape
//!
//! ```text
//! { "<region code>": { "Linux" | "Windows": { "regions": { "<display name>": {
//!     "<sku key>": { "Instance Type": "m5.large", "price": "0.0960000000", ... } } } } } }
//! ```
//!
//! The catalog backs the `/api/pricing` endpoint and also implements
//! [`PricingSource`] so an analysis can run straight off a snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{DEFAULT_UNIT, OperatingSystem, PricingRate, PricingResponse};
use crate::regions;
use crate::source::{PricingSource, SourceError};

/// One priced SKU in a metered-unit map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteredEntry {
    #[serde(rename = "Instance Type", default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// The per-(region, OS) document published by the public pricing site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeteredUnitMap {
    /// display name -> SKU key -> entry
    #[serde(default)]
    pub regions: HashMap<String, HashMap<String, MeteredEntry>>,
}

/// Region code -> OS -> metered-unit map
pub type PricingSnapshot = HashMap<String, HashMap<OperatingSystem, MeteredUnitMap>>;

/// In-memory pricing snapshot
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    snapshot: PricingSnapshot,
}

impl PricingCatalog {
    pub fn from_snapshot(snapshot: PricingSnapshot) -> Self {
        Self { snapshot }
    }

    /// Read a snapshot file written by `download-pricing`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let snapshot: PricingSnapshot = serde_json::from_slice(&bytes)?;
        info!(
            path = %path.display(),
            regions = snapshot.len(),
            "Pricing snapshot loaded"
        );
        Ok(Self { snapshot })
    }

    pub fn region_count(&self) -> usize {
        self.snapshot.len()
    }

    /// On-demand rates for a region code, or `None` when the snapshot has nothing
    pub fn lookup(&self, region: &str, os: OperatingSystem) -> Option<PricingResponse> {
        let display_name = regions::display_name(region).unwrap_or(region);

        // Prefer the region's own document, then any document that lists the
        // display name.
        let own = self
            .snapshot
            .get(region)
            .and_then(|by_os| by_os.get(&os))
            .and_then(|map| map.regions.get(display_name));
        let entries = own.or_else(|| {
            self.snapshot
                .values()
                .filter_map(|by_os| by_os.get(&os))
                .find_map(|map| map.regions.get(display_name))
        })?;

        let rates: HashMap<String, PricingRate> = entries
            .values()
            .filter_map(|entry| {
                let instance_type = entry.instance_type.as_ref()?;
                let price = entry.price.as_ref()?;
                Some((
                    instance_type.clone(),
                    PricingRate {
                        price: price.clone(),
                        unit: DEFAULT_UNIT.to_string(),
                        description: Some(format!("On-demand price for {instance_type}")),
                    },
                ))
            })
            .collect();

        debug!(region = region, os = %os, rates = rates.len(), "Catalog lookup");

        if rates.is_empty() {
            return None;
        }

        Some(PricingResponse {
            regions: HashMap::from([(region.to_string(), rates)]),
        })
    }
}

#[async_trait]
impl PricingSource for PricingCatalog {
    async fn fetch_pricing(
        &self,
        region: &str,
        os: OperatingSystem,
    ) -> Result<PricingResponse, SourceError> {
        self.lookup(region, os).ok_or(SourceError::NoData)
    }
}
