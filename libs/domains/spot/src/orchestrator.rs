use chrono::Utc;
use futures::future::join_all;
use observability::{OperationTimer, SpotAdvisorMetrics};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::calculator::{CellRef, compute_cell};
use crate::dataset::SpotDatasetCache;
use crate::error::{SpotError, SpotResult};
use crate::models::{
    AnalysisOutcome, AnalysisReport, AnalysisRequest, CostBreakdown, InstanceAnalysis,
    OperatingSystem, PricingConfig, RegionAnalysis, RegionCell, RegionInstance, SkipReason,
    SkippedRegion, SpotDataset, StackAnalysis, NOT_AVAILABLE,
};
use crate::pricing::{PricingCache, PricingLookup};
use crate::quantity::QuantityRegistry;

/// Name of the single stack built from the whole selection
pub const DEFAULT_STACK_NAME: &str = "Default Stack";

/// Pricing tables for one region that had at least one OS available
struct RegionPricing {
    region: String,
    tables: HashMap<OperatingSystem, PricingLookup>,
}

impl RegionPricing {
    fn lookup(&self, os: OperatingSystem) -> Option<&PricingLookup> {
        self.tables.get(&os)
    }
}

/// Entry point for cost analysis of a selection.
///
/// Holds the two caches and the quantity registry; each is shared with the
/// rest of the process through `Arc`/cheap clones.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    dataset: SpotDatasetCache,
    pricing: PricingCache,
    quantities: Arc<QuantityRegistry>,
}

impl AnalysisOrchestrator {
    pub fn new(
        dataset: SpotDatasetCache,
        pricing: PricingCache,
        quantities: Arc<QuantityRegistry>,
    ) -> Self {
        Self {
            dataset,
            pricing,
            quantities,
        }
    }

    pub fn dataset(&self) -> &SpotDatasetCache {
        &self.dataset
    }

    pub fn pricing(&self) -> &PricingCache {
        &self.pricing
    }

    pub fn quantities(&self) -> &Arc<QuantityRegistry> {
        &self.quantities
    }

    /// Analyze every selected instance type across the selected regions.
    ///
    /// Regions without any usable pricing are skipped and listed in the report.
    /// Fails only when the dataset cannot be loaded, when no region has
    /// pricing, or when an instance type is unknown.
    #[instrument(skip_all, fields(instance_types = instance_types.len(), regions = regions.len()))]
    pub async fn analyze(
        &self,
        instance_types: &[String],
        regions: &[String],
        config: &PricingConfig,
    ) -> SpotResult<AnalysisReport> {
        let timer = OperationTimer::start();
        let result = self.analyze_inner(instance_types, regions, config).await;

        match &result {
            Ok(report) => SpotAdvisorMetrics::record_analysis(
                report.instances.len(),
                regions.len(),
                report.skipped_regions.len(),
                timer.elapsed(),
            ),
            Err(e) => SpotAdvisorMetrics::record_analysis_failure(failure_kind(e)),
        }

        result
    }

    async fn analyze_inner(
        &self,
        instance_types: &[String],
        regions: &[String],
        config: &PricingConfig,
    ) -> SpotResult<AnalysisReport> {
        let instance_types = dedupe(instance_types);
        let regions = dedupe(regions);

        if instance_types.is_empty() {
            return Err(SpotError::InvalidInput(
                "select at least one instance type".to_string(),
            ));
        }
        if regions.is_empty() {
            return Err(SpotError::InvalidInput(
                "select at least one region".to_string(),
            ));
        }

        let (dataset, (available, skipped_regions)) = futures::join!(
            self.dataset.load(),
            self.fetch_region_pricing(&regions, config)
        );
        let dataset = dataset?;

        if available.is_empty() {
            return Err(SpotError::NoPricingDataForAnySelectedRegion { regions });
        }

        for skipped in &skipped_regions {
            warn!(region = %skipped.region, reason = ?skipped.reason, "Skipping region without pricing");
        }

        let mut instances = Vec::with_capacity(instance_types.len());
        for instance_type in &instance_types {
            instances.push(self.analyze_instance(
                &dataset,
                instance_type,
                &available,
                regions.len(),
                config,
            )?);
        }

        info!(
            instances = instances.len(),
            available_regions = available.len(),
            skipped_regions = skipped_regions.len(),
            "Analysis complete"
        );

        Ok(AnalysisReport {
            instances,
            skipped_regions,
        })
    }

    /// Analyze a request and build all three views.
    pub async fn run(&self, request: &AnalysisRequest) -> SpotResult<AnalysisOutcome> {
        let report = self
            .analyze(&request.instance_types, &request.regions, &request.pricing)
            .await?;
        let warning = report.warning();

        Ok(AnalysisOutcome {
            regions: analyze_regions(&report.instances),
            stacks: analyze_stacks(&report.instances),
            instances: report.instances,
            skipped_regions: report.skipped_regions,
            warning,
            generated_at: Utc::now(),
        })
    }

    /// Fetch every (region, OS) pair concurrently and split regions by outcome.
    async fn fetch_region_pricing(
        &self,
        regions: &[String],
        config: &PricingConfig,
    ) -> (Vec<RegionPricing>, Vec<SkippedRegion>) {
        let systems = config.operating_systems();

        let fetches = regions.iter().flat_map(|region| {
            systems.iter().map(move |os| async move {
                let outcome = self.pricing.get_or_fetch(region, *os).await;
                (region.as_str(), *os, outcome)
            })
        });
        let outcomes = join_all(fetches).await;

        let mut by_region: HashMap<&str, Vec<(OperatingSystem, SpotResult<PricingLookup>)>> =
            HashMap::new();
        for (region, os, outcome) in outcomes {
            by_region.entry(region).or_default().push((os, outcome));
        }

        let mut available = Vec::new();
        let mut skipped = Vec::new();

        for region in regions {
            let results = by_region.remove(region.as_str()).unwrap_or_default();

            let any_available = results
                .iter()
                .any(|(_, outcome)| matches!(outcome, Ok(PricingLookup::Available(_))));

            if any_available {
                let tables = results
                    .into_iter()
                    .filter_map(|(os, outcome)| outcome.ok().map(|lookup| (os, lookup)))
                    .collect();
                available.push(RegionPricing {
                    region: region.clone(),
                    tables,
                });
                continue;
            }

            let first_error = results.into_iter().find_map(|(_, outcome)| outcome.err());
            let reason = match first_error {
                Some(e) => SkipReason::FetchFailed {
                    message: e.to_string(),
                },
                None => SkipReason::PricingUnavailable,
            };
            skipped.push(SkippedRegion {
                region: region.clone(),
                reason,
            });
        }

        (available, skipped)
    }

    fn analyze_instance(
        &self,
        dataset: &SpotDataset,
        instance_type: &str,
        available: &[RegionPricing],
        total_regions_count: usize,
        config: &PricingConfig,
    ) -> SpotResult<InstanceAnalysis> {
        let specs = dataset
            .instance_specs
            .get(instance_type)
            .cloned()
            .ok_or_else(|| SpotError::InstanceTypeNotFound(instance_type.to_string()))?;

        let cells: Vec<RegionCell> = available
            .iter()
            .map(|pricing| self.build_cell(dataset, instance_type, pricing, config))
            .collect();

        let rated: Vec<&RegionCell> = cells.iter().filter(|c| !c.spot_unavailable).collect();
        let (average_score, average_rating) = if rated.is_empty() {
            (0.0, 0.0)
        } else {
            let n = rated.len() as f64;
            let score: f64 = rated
                .iter()
                .filter_map(|c| c.linux_metric.as_ref())
                .map(|m| f64::from(m.savings_percent))
                .sum();
            let rating: f64 = rated
                .iter()
                .filter_map(|c| c.linux_metric.as_ref())
                .map(|m| f64::from(m.interruption_rating))
                .sum();
            (score / n, rating / n)
        };

        let mut total_cost = CostBreakdown::zero();
        for cell in &cells {
            total_cost.accumulate(&cell.combined_cost());
        }

        Ok(InstanceAnalysis {
            instance_type: instance_type.to_string(),
            specs,
            available_regions_count: rated.len(),
            total_regions_count,
            average_score,
            average_rating,
            regions: cells,
            total_cost,
        })
    }

    fn build_cell(
        &self,
        dataset: &SpotDataset,
        instance_type: &str,
        pricing: &RegionPricing,
        config: &PricingConfig,
    ) -> RegionCell {
        let region = pricing.region.as_str();

        let linux = CellRef::new(instance_type, region, OperatingSystem::Linux);
        let linux_metric = dataset.metric(region, OperatingSystem::Linux, instance_type);
        let linux_rate = pricing
            .lookup(OperatingSystem::Linux)
            .and_then(PricingLookup::table)
            .and_then(|table| table.get(instance_type));
        let linux_cost = compute_cell(
            &linux,
            linux_metric,
            linux_rate,
            self.quantities.get(instance_type, region, OperatingSystem::Linux),
        );

        let (windows_metric, windows_cost) = if config.include_windows {
            let windows = CellRef::new(instance_type, region, OperatingSystem::Windows);
            let metric = dataset.metric(region, OperatingSystem::Windows, instance_type);
            let cost = pricing
                .lookup(OperatingSystem::Windows)
                .and_then(PricingLookup::table)
                .and_then(|table| table.get(instance_type))
                .map(|rate| {
                    compute_cell(
                        &windows,
                        metric,
                        Some(rate),
                        self.quantities
                            .get(instance_type, region, OperatingSystem::Windows),
                    )
                });
            (metric.map(|m| dataset.rated(m)), cost)
        } else {
            (None, None)
        };

        let linux_metric = linux_metric.map(|m| dataset.rated(m));
        RegionCell {
            region: region.to_string(),
            spot_unavailable: linux_metric.is_none(),
            interruption_frequency: linux_metric
                .as_ref()
                .map_or(NOT_AVAILABLE, |m| m.interruption_frequency.as_str())
                .to_string(),
            linux_metric,
            linux_cost,
            windows_metric,
            windows_cost,
        }
    }
}

/// Pivot instance analyses by region, keeping first-seen region order.
pub fn analyze_regions(instances: &[InstanceAnalysis]) -> Vec<RegionAnalysis> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, RegionAnalysis> = HashMap::new();

    for instance in instances {
        for cell in &instance.regions {
            let entry = grouped.entry(cell.region.as_str()).or_insert_with(|| {
                order.push(cell.region.as_str());
                RegionAnalysis {
                    region: cell.region.clone(),
                    instances: Vec::new(),
                    total_cost: CostBreakdown::zero(),
                }
            });
            entry.total_cost.accumulate(&cell.combined_cost());
            entry.instances.push(RegionInstance {
                instance_type: instance.instance_type.clone(),
                linux_metric: cell.linux_metric.clone(),
                linux_cost: cell.linux_cost.clone(),
                windows_metric: cell.windows_metric.clone(),
                windows_cost: cell.windows_cost.clone(),
            });
        }
    }

    order
        .into_iter()
        .filter_map(|region| grouped.remove(region))
        .collect()
}

/// Aggregate the whole selection into the default stack.
///
/// Score and rating are the mean of the per-instance averages.
pub fn analyze_stacks(instances: &[InstanceAnalysis]) -> Vec<StackAnalysis> {
    let mut total_cost = CostBreakdown::zero();
    let mut regions: Vec<String> = Vec::new();
    let mut seen = HashSet::new();

    for instance in instances {
        total_cost.accumulate(&instance.total_cost);
        for cell in &instance.regions {
            if seen.insert(cell.region.as_str()) {
                regions.push(cell.region.clone());
            }
        }
    }

    let (average_score, average_rating) = if instances.is_empty() {
        (0.0, 0.0)
    } else {
        let n = instances.len() as f64;
        (
            instances.iter().map(|i| i.average_score).sum::<f64>() / n,
            instances.iter().map(|i| i.average_rating).sum::<f64>() / n,
        )
    };

    vec![StackAnalysis {
        name: DEFAULT_STACK_NAME.to_string(),
        instance_types: instances.iter().map(|i| i.instance_type.clone()).collect(),
        regions,
        total_cost,
        average_score,
        average_rating,
    }]
}

fn dedupe(items: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(item.as_str()))
        .cloned()
        .collect()
}

fn failure_kind(err: &SpotError) -> &'static str {
    match err {
        SpotError::DatasetFetch { .. } => "dataset_fetch",
        SpotError::NoPricingDataForAnySelectedRegion { .. } => "no_pricing",
        SpotError::InstanceTypeNotFound(_) => "instance_type_not_found",
        SpotError::InvalidInput(_) => "invalid_input",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InstanceSpecs, RatedMetric};

    fn cost(on_demand: f64, spot: f64, available: bool) -> CostBreakdown {
        CostBreakdown {
            on_demand_total: on_demand,
            spot_total: spot,
            savings_total: on_demand - spot,
            currency: "USD".to_string(),
            unit: "Hrs".to_string(),
            is_spot_available: available,
        }
    }

    fn cell(region: &str, on_demand: f64, spot: f64, windows: Option<CostBreakdown>) -> RegionCell {
        RegionCell {
            region: region.to_string(),
            linux_metric: Some(RatedMetric {
                savings_percent: 60,
                interruption_rating: 1,
                interruption_frequency: "5-10%".to_string(),
            }),
            linux_cost: cost(on_demand, spot, true),
            windows_metric: None,
            windows_cost: windows,
            spot_unavailable: false,
            interruption_frequency: "5-10%".to_string(),
        }
    }

    fn instance(name: &str, cells: Vec<RegionCell>, score: f64) -> InstanceAnalysis {
        let mut total_cost = CostBreakdown::zero();
        for c in &cells {
            total_cost.accumulate(&c.combined_cost());
        }
        InstanceAnalysis {
            instance_type: name.to_string(),
            specs: InstanceSpecs {
                cores: 2,
                ram_gb: 8.0,
                emr_compatible: true,
            },
            available_regions_count: cells.len(),
            total_regions_count: cells.len(),
            regions: cells,
            average_score: score,
            average_rating: 1.0,
            total_cost,
        }
    }

    #[test]
    fn test_regions_grouped_in_first_seen_order() {
        let instances = vec![
            instance(
                "m5.large",
                vec![cell("us-west-2", 1.0, 0.4, None), cell("us-east-1", 2.0, 0.8, None)],
                60.0,
            ),
            instance(
                "c5.large",
                vec![cell("us-east-1", 3.0, 1.2, Some(cost(5.0, 5.0, false)))],
                60.0,
            ),
        ];

        let regions = analyze_regions(&instances);

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].region, "us-west-2");
        assert_eq!(regions[1].region, "us-east-1");
        assert_eq!(regions[1].instances.len(), 2);
        assert!((regions[1].total_cost.on_demand_total - 10.0).abs() < 1e-9);
        assert!(regions[1].total_cost.is_spot_available);
    }

    #[test]
    fn test_default_stack_averages_instance_averages() {
        let instances = vec![
            instance("m5.large", vec![cell("us-east-1", 1.0, 0.4, None)], 60.0),
            instance("c5.large", vec![cell("eu-west-1", 2.0, 1.0, None)], 50.0),
        ];

        let stacks = analyze_stacks(&instances);

        assert_eq!(stacks.len(), 1);
        let stack = &stacks[0];
        assert_eq!(stack.name, DEFAULT_STACK_NAME);
        assert_eq!(stack.instance_types, vec!["m5.large", "c5.large"]);
        assert_eq!(stack.regions, vec!["us-east-1", "eu-west-1"]);
        assert!((stack.average_score - 55.0).abs() < 1e-9);
        assert!((stack.total_cost.spot_total - 1.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stack_has_zero_averages() {
        let stacks = analyze_stacks(&[]);
        assert_eq!(stacks[0].average_score, 0.0);
        assert_eq!(stacks[0].average_rating, 0.0);
        assert!(stacks[0].instance_types.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let input = vec![
            "us-east-1".to_string(),
            "eu-west-1".to_string(),
            "us-east-1".to_string(),
        ];
        assert_eq!(dedupe(&input), vec!["us-east-1", "eu-west-1"]);
    }
}
