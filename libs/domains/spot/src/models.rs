use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use utoipa::ToSchema;

use crate::regions;

/// Currency assumed when the pricing endpoint omits one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Billing unit assumed when the pricing endpoint omits one
pub const DEFAULT_UNIT: &str = "Hrs";

/// Label used for cells with no interruption data
pub const NOT_AVAILABLE: &str = "Not Available";

/// Operating system of a priced cell
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    ToSchema,
)]
#[strum(ascii_case_insensitive)]
pub enum OperatingSystem {
    #[default]
    Linux,
    Windows,
}

impl OperatingSystem {
    pub const ALL: [OperatingSystem; 2] = [OperatingSystem::Linux, OperatingSystem::Windows];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingSystem::Linux => "Linux",
            OperatingSystem::Windows => "Windows",
        }
    }
}

// ============================================================================
// Interruption dataset
// ============================================================================

/// Hardware specs for an instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstanceSpecs {
    pub cores: u32,
    pub ram_gb: f64,
    /// Whether the type can run EMR workloads
    #[serde(rename = "emr")]
    pub emr_compatible: bool,
}

/// One interruption-frequency bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InterruptionRange {
    /// Rating index, 0 (rare) to 4 (frequent)
    pub index: u32,
    /// Human label, e.g. "<5%"
    pub label: String,
    #[serde(default)]
    pub dots: u32,
    /// Upper bound of the bucket in percent
    #[serde(default)]
    pub max: u32,
}

/// Savings and interruption rating for one (region, OS, instance type)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SpotMetric {
    /// Savings over on-demand in percent (0-100)
    #[serde(rename = "s")]
    pub savings_percent: u32,
    /// Interruption rating (0-4)
    #[serde(rename = "r")]
    pub interruption_rating: u32,
}

/// Spot metrics published for a single region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionSpotData {
    #[serde(rename = "Linux", default)]
    pub linux: HashMap<String, SpotMetric>,
    #[serde(rename = "Windows", default, skip_serializing_if = "Option::is_none")]
    pub windows: Option<HashMap<String, SpotMetric>>,
}

impl RegionSpotData {
    pub fn metric(&self, os: OperatingSystem, instance_type: &str) -> Option<&SpotMetric> {
        match os {
            OperatingSystem::Linux => self.linux.get(instance_type),
            OperatingSystem::Windows => self.windows.as_ref()?.get(instance_type),
        }
    }
}

/// The global interruption/savings dataset
///
/// Field names on the wire follow the bulk advisor feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SpotDataset {
    #[serde(rename = "instance_types", default)]
    pub instance_specs: HashMap<String, InstanceSpecs>,
    #[serde(rename = "ranges", default)]
    pub interruption_labels: Vec<InterruptionRange>,
    #[serde(rename = "spot_advisor", default)]
    pub regions: HashMap<String, RegionSpotData>,
}

impl SpotDataset {
    pub fn metric(
        &self,
        region: &str,
        os: OperatingSystem,
        instance_type: &str,
    ) -> Option<&SpotMetric> {
        self.regions.get(region)?.metric(os, instance_type)
    }

    /// Label for an interruption rating, "Not Available" when unknown
    pub fn interruption_label(&self, rating: u32) -> &str {
        self.interruption_labels
            .iter()
            .find(|range| range.index == rating)
            .map(|range| range.label.as_str())
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn rated(&self, metric: &SpotMetric) -> RatedMetric {
        RatedMetric {
            savings_percent: metric.savings_percent,
            interruption_rating: metric.interruption_rating,
            interruption_frequency: self.interruption_label(metric.interruption_rating).to_string(),
        }
    }

    /// Region codes present in the dataset that the region directory knows, sorted
    pub fn known_regions(&self) -> Vec<String> {
        let mut codes: Vec<String> = self
            .regions
            .keys()
            .filter(|code| regions::is_known(code))
            .cloned()
            .collect();
        codes.sort();
        codes
    }

    pub fn instance_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.instance_specs.keys().cloned().collect();
        types.sort();
        types
    }

    /// Shape check applied on receipt; a failure is treated like a fetch error
    pub fn validate(&self) -> Result<(), String> {
        if self.regions.is_empty() {
            return Err("spot_advisor is missing or empty".to_string());
        }
        if self.interruption_labels.is_empty() {
            return Err("ranges (interruption ratings) are missing".to_string());
        }
        if self.instance_specs.is_empty() {
            return Err("instance_types are missing".to_string());
        }

        for (region, data) in &self.regions {
            let windows = data.windows.iter().flat_map(|m| m.iter());
            for (instance_type, metric) in data.linux.iter().chain(windows) {
                if metric.savings_percent > 100 || metric.interruption_rating > 4 {
                    return Err(format!(
                        "metric out of range for {instance_type} in {region}: s={}, r={}",
                        metric.savings_percent, metric.interruption_rating
                    ));
                }
            }
        }

        Ok(())
    }
}

/// A spot metric with its interruption label resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RatedMetric {
    pub savings_percent: u32,
    pub interruption_rating: u32,
    /// e.g. "5-10%", or "Not Available"
    pub interruption_frequency: String,
}

// ============================================================================
// On-demand pricing
// ============================================================================

/// One rate as published by the pricing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingRate {
    pub price: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

/// Pricing endpoint payload: region key -> instance type -> rate
///
/// The region key is either the region code or its display name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingResponse {
    pub regions: HashMap<String, HashMap<String, PricingRate>>,
}

/// Parsed on-demand rate for one instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingEntry {
    pub on_demand_rate: f64,
    pub currency: String,
    pub unit: String,
}

/// On-demand rates for one (region, OS) key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingTable {
    pub region: String,
    pub os: OperatingSystem,
    pub entries: HashMap<String, PricingEntry>,
}

impl PricingTable {
    /// Build a table from an endpoint response, keyed by region code or display name.
    ///
    /// Rates whose price does not parse as a non-negative number are dropped.
    pub fn from_response(region: &str, os: OperatingSystem, response: &PricingResponse) -> Self {
        let rates = response.regions.get(region).or_else(|| {
            regions::display_name(region).and_then(|name| response.regions.get(name))
        });

        let mut entries = HashMap::new();
        if let Some(rates) = rates {
            for (instance_type, rate) in rates {
                match rate.price.trim().parse::<f64>() {
                    Ok(value) if value.is_finite() && value >= 0.0 => {
                        entries.insert(
                            instance_type.clone(),
                            PricingEntry {
                                on_demand_rate: value,
                                currency: DEFAULT_CURRENCY.to_string(),
                                unit: rate.unit.clone(),
                            },
                        );
                    }
                    _ => {
                        tracing::warn!(
                            region = region,
                            os = %os,
                            instance_type = %instance_type,
                            price = %rate.price,
                            "Dropping unparseable on-demand price"
                        );
                    }
                }
            }
        }

        Self {
            region: region.to_string(),
            os,
            entries,
        }
    }

    pub fn get(&self, instance_type: &str) -> Option<&PricingEntry> {
        self.entries.get(instance_type)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Cost breakdowns and analysis views
// ============================================================================

/// Quantity-scaled cost totals for a cell or an aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CostBreakdown {
    pub on_demand_total: f64,
    pub spot_total: f64,
    pub savings_total: f64,
    pub currency: String,
    pub unit: String,
    pub is_spot_available: bool,
}

impl CostBreakdown {
    /// Empty accumulator for aggregates
    pub fn zero() -> Self {
        Self {
            on_demand_total: 0.0,
            spot_total: 0.0,
            savings_total: 0.0,
            currency: DEFAULT_CURRENCY.to_string(),
            unit: DEFAULT_UNIT.to_string(),
            is_spot_available: false,
        }
    }

    /// Add another breakdown's totals; the aggregate is spot-available if any part is
    pub fn accumulate(&mut self, other: &CostBreakdown) {
        self.on_demand_total += other.on_demand_total;
        self.spot_total += other.spot_total;
        self.savings_total += other.savings_total;
        self.currency.clone_from(&other.currency);
        self.unit.clone_from(&other.unit);
        self.is_spot_available |= other.is_spot_available;
    }
}

impl Default for CostBreakdown {
    fn default() -> Self {
        Self::zero()
    }
}

/// Per-region cell of an instance analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionCell {
    pub region: String,
    pub linux_metric: Option<RatedMetric>,
    pub linux_cost: CostBreakdown,
    pub windows_metric: Option<RatedMetric>,
    pub windows_cost: Option<CostBreakdown>,
    /// No Linux spot metric exists for this cell
    pub spot_unavailable: bool,
    /// Linux interruption label, or "Not Available" without a metric
    pub interruption_frequency: String,
}

impl RegionCell {
    /// Linux plus Windows totals for this cell
    pub fn combined_cost(&self) -> CostBreakdown {
        let mut total = self.linux_cost.clone();
        if let Some(windows) = &self.windows_cost {
            total.accumulate(windows);
        }
        total
    }
}

/// Analysis of one instance type across the available regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InstanceAnalysis {
    pub instance_type: String,
    pub specs: InstanceSpecs,
    pub regions: Vec<RegionCell>,
    /// Mean savings percent over cells with spot data, 0 if none
    pub average_score: f64,
    /// Mean interruption rating over the same cells
    pub average_rating: f64,
    pub available_regions_count: usize,
    pub total_regions_count: usize,
    pub total_cost: CostBreakdown,
}

/// One instance type's entry inside a region view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionInstance {
    pub instance_type: String,
    pub linux_metric: Option<RatedMetric>,
    pub linux_cost: CostBreakdown,
    pub windows_metric: Option<RatedMetric>,
    pub windows_cost: Option<CostBreakdown>,
}

/// The analyzed cells pivoted by region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RegionAnalysis {
    pub region: String,
    pub instances: Vec<RegionInstance>,
    pub total_cost: CostBreakdown,
}

/// Aggregate over a named group of instances and regions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StackAnalysis {
    pub name: String,
    pub instance_types: Vec<String>,
    pub regions: Vec<String>,
    pub total_cost: CostBreakdown,
    pub average_score: f64,
    pub average_rating: f64,
}

/// Why a requested region was left out of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The pricing endpoint has no data for any OS of this region
    PricingUnavailable,
    /// A pricing fetch failed; a later call may succeed
    FetchFailed { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SkippedRegion {
    pub region: String,
    pub reason: SkipReason,
}

/// Knobs for a single analysis run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PricingConfig {
    /// Fetch and cost Windows cells alongside Linux
    #[serde(default = "default_true")]
    pub include_windows: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            include_windows: true,
        }
    }
}

impl PricingConfig {
    pub fn operating_systems(&self) -> Vec<OperatingSystem> {
        if self.include_windows {
            OperatingSystem::ALL.to_vec()
        } else {
            vec![OperatingSystem::Linux]
        }
    }
}

/// A selection submitted for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisRequest {
    pub instance_types: Vec<String>,
    pub regions: Vec<String>,
    #[serde(flatten)]
    pub pricing: PricingConfig,
}

/// Per-instance analyses plus the regions that had to be skipped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisReport {
    pub instances: Vec<InstanceAnalysis>,
    pub skipped_regions: Vec<SkippedRegion>,
}

impl AnalysisReport {
    /// User-facing warning when some regions were skipped
    pub fn warning(&self) -> Option<String> {
        if self.skipped_regions.is_empty() {
            return None;
        }
        let list = self
            .skipped_regions
            .iter()
            .map(|s| s.region.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "Some regions have missing or incomplete pricing data ({list}). Showing available information for other regions."
        ))
    }
}

/// Everything produced for one selection: the three views and the skip list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalysisOutcome {
    pub instances: Vec<InstanceAnalysis>,
    pub regions: Vec<RegionAnalysis>,
    pub stacks: Vec<StackAnalysis>,
    pub skipped_regions: Vec<SkippedRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub generated_at: DateTime<Utc>,
}
