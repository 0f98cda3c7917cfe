//! Per-cell cost arithmetic.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{CostBreakdown, DEFAULT_CURRENCY, DEFAULT_UNIT, OperatingSystem, PricingEntry, SpotMetric};

/// One (instance type, region, OS) combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct CellRef {
    pub instance_type: String,
    pub region: String,
    pub os: OperatingSystem,
}

impl CellRef {
    pub fn new(instance_type: impl Into<String>, region: impl Into<String>, os: OperatingSystem) -> Self {
        Self {
            instance_type: instance_type.into(),
            region: region.into(),
            os,
        }
    }
}

/// Quantity-scaled costs for a single cell.
///
/// A missing rate counts as 0. Without a spot metric the spot price equals the
/// on-demand price and nothing is saved.
pub fn compute_cell(
    cell: &CellRef,
    metric: Option<&SpotMetric>,
    pricing: Option<&PricingEntry>,
    quantity: u32,
) -> CostBreakdown {
    let rate = pricing.map(|p| p.on_demand_rate).unwrap_or(0.0);
    let on_demand_total = rate * f64::from(quantity);

    let spot_total = match metric {
        Some(m) => on_demand_total * (1.0 - f64::from(m.savings_percent) / 100.0),
        None => on_demand_total,
    };

    tracing::trace!(
        instance_type = %cell.instance_type,
        region = %cell.region,
        os = %cell.os,
        rate,
        quantity,
        "Computed cell cost"
    );

    CostBreakdown {
        on_demand_total,
        spot_total,
        savings_total: on_demand_total - spot_total,
        currency: pricing
            .map(|p| p.currency.clone())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        unit: pricing
            .map(|p| p.unit.clone())
            .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        is_spot_available: metric.is_some(),
    }
}
