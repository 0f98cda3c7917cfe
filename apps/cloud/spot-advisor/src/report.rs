//! Plain-text rendering of an analysis for the terminal

use domain_spot::{
    AnalysisOutcome, CostBreakdown, InstanceAnalysis, NOT_AVAILABLE, RatedMetric, RegionCell,
};
use std::fmt::{self, Display, Formatter};

fn money(cost: &CostBreakdown, value: f64) -> String {
    format!("{value:.4} {}", cost.currency)
}

fn savings(metric: Option<&RatedMetric>) -> String {
    metric
        .map(|m| format!("{}%", m.savings_percent))
        .unwrap_or_else(|| "-".to_string())
}

fn cell_row(f: &mut Formatter<'_>, cell: &RegionCell) -> fmt::Result {
    writeln!(
        f,
        "  {:<16} {:>8} {:<14} {:>16} {:>16} {:>16}",
        cell.region,
        savings(cell.linux_metric.as_ref()),
        cell.interruption_frequency,
        money(&cell.linux_cost, cell.linux_cost.on_demand_total),
        money(&cell.linux_cost, cell.linux_cost.spot_total),
        money(&cell.linux_cost, cell.linux_cost.savings_total),
    )?;
    if let Some(windows) = &cell.windows_cost {
        writeln!(
            f,
            "  {:<16} {:>8} {:<14} {:>16} {:>16} {:>16}",
            "  (Windows)",
            savings(cell.windows_metric.as_ref()),
            cell.windows_metric
                .as_ref()
                .map_or(NOT_AVAILABLE, |m| m.interruption_frequency.as_str()),
            money(windows, windows.on_demand_total),
            money(windows, windows.spot_total),
            money(windows, windows.savings_total),
        )?;
    }
    Ok(())
}

fn instance_section(f: &mut Formatter<'_>, instance: &InstanceAnalysis) -> fmt::Result {
    writeln!(
        f,
        "{} ({} vCPU, {} GiB{})",
        instance.instance_type,
        instance.specs.cores,
        instance.specs.ram_gb,
        if instance.specs.emr_compatible { ", EMR" } else { "" }
    )?;
    writeln!(
        f,
        "  spot data in {}/{} regions, avg savings {:.1}%, avg interruption rating {:.2}",
        instance.available_regions_count,
        instance.total_regions_count,
        instance.average_score,
        instance.average_rating
    )?;
    writeln!(
        f,
        "  {:<16} {:>8} {:<14} {:>16} {:>16} {:>16}",
        "Region", "Savings", "Interruption", "On-demand/h", "Spot/h", "Saved/h"
    )?;
    for cell in &instance.regions {
        cell_row(f, cell)?;
    }
    let total = &instance.total_cost;
    writeln!(
        f,
        "  {:<16} {:>8} {:<14} {:>16} {:>16} {:>16}",
        "Total",
        "",
        "",
        money(total, total.on_demand_total),
        money(total, total.spot_total),
        money(total, total.savings_total),
    )
}

/// All three views plus any skipped-region warning
pub struct Report<'a>(pub &'a AnalysisOutcome);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let outcome = self.0;

        if let Some(warning) = &outcome.warning {
            writeln!(f, "warning: {warning}\n")?;
        }

        for instance in &outcome.instances {
            instance_section(f, instance)?;
            writeln!(f)?;
        }

        if !outcome.regions.is_empty() {
            writeln!(f, "By region")?;
            for region in &outcome.regions {
                let total = &region.total_cost;
                writeln!(
                    f,
                    "  {:<16} {:>3} types {:>16} on-demand {:>16} spot",
                    region.region,
                    region.instances.len(),
                    money(total, total.on_demand_total),
                    money(total, total.spot_total),
                )?;
            }
            writeln!(f)?;
        }

        for stack in &outcome.stacks {
            let total = &stack.total_cost;
            writeln!(
                f,
                "{}: {} on-demand, {} spot, {} saved per hour (avg savings {:.1}%)",
                stack.name,
                money(total, total.on_demand_total),
                money(total, total.spot_total),
                money(total, total.savings_total),
                stack.average_score,
            )?;
        }
        Ok(())
    }
}
