//! Metrics for the spot advisor: dataset loads, pricing fetches and analysis runs.

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Spot advisor metrics recorder
pub struct SpotAdvisorMetrics;

impl SpotAdvisorMetrics {
    // =========================================================================
    // Dataset
    // =========================================================================

    /// Record a completed dataset load (all retries included)
    pub fn record_dataset_load(attempts: u32, regions: usize, duration: Duration) {
        counter!("spot_dataset_loads_total", "status" => "success").increment(1);
        histogram!("spot_dataset_load_duration_seconds").record(duration.as_secs_f64());
        gauge!("spot_dataset_regions").set(regions as f64);

        tracing::debug!(
            attempts = attempts,
            regions = regions,
            duration_ms = duration.as_millis() as u64,
            "Recorded dataset load"
        );
    }

    /// Record a dataset load that exhausted its retries
    pub fn record_dataset_failure(attempts: u32) {
        counter!("spot_dataset_loads_total", "status" => "failed").increment(1);
        counter!("spot_dataset_fetch_attempts_total").increment(attempts as u64);
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Record how a pricing fetch settled: `available`, `unavailable` or `failed`
    pub fn record_pricing_fetch(os: &str, outcome: &'static str, duration: Duration) {
        counter!(
            "spot_pricing_fetches_total",
            "os" => os.to_string(),
            "outcome" => outcome
        )
        .increment(1);
        histogram!("spot_pricing_fetch_duration_seconds", "os" => os.to_string())
            .record(duration.as_secs_f64());
    }

    /// Record a pricing lookup answered from the settled cache
    pub fn record_pricing_cache_hit(os: &str) {
        counter!("spot_pricing_cache_hits_total", "os" => os.to_string()).increment(1);
    }

    /// Record a caller that joined a fetch already in flight
    pub fn record_pricing_fetch_joined(os: &str) {
        counter!("spot_pricing_fetches_joined_total", "os" => os.to_string()).increment(1);
    }

    // =========================================================================
    // Analysis
    // =========================================================================

    /// Record a finished analysis run
    pub fn record_analysis(
        instance_types: usize,
        regions_requested: usize,
        regions_skipped: usize,
        duration: Duration,
    ) {
        counter!("spot_analysis_runs_total", "status" => "success").increment(1);
        histogram!("spot_analysis_duration_seconds").record(duration.as_secs_f64());
        gauge!("spot_analysis_last_regions_skipped").set(regions_skipped as f64);

        tracing::debug!(
            instance_types = instance_types,
            regions_requested = regions_requested,
            regions_skipped = regions_skipped,
            duration_ms = duration.as_millis() as u64,
            "Recorded analysis run"
        );
    }

    /// Record an analysis run that ended in an error
    pub fn record_analysis_failure(kind: &'static str) {
        counter!("spot_analysis_runs_total", "status" => "failed", "kind" => kind).increment(1);
    }

    /// Record a completed run whose result was dropped because a newer run published first
    pub fn record_stale_analysis() {
        counter!("spot_analysis_stale_total").increment(1);
    }

    // =========================================================================
    // Snapshot collection
    // =========================================================================

    /// Record a pricing snapshot download run
    pub fn record_snapshot_collection(fetched: usize, failed: usize, duration: Duration) {
        counter!("spot_snapshot_documents_total", "status" => "success")
            .increment(fetched as u64);
        counter!("spot_snapshot_documents_total", "status" => "failed").increment(failed as u64);
        histogram!("spot_snapshot_collection_duration_seconds").record(duration.as_secs_f64());
    }
}

/// Measures elapsed time from construction.
pub struct OperationTimer {
    start: Instant,
}

impl OperationTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
