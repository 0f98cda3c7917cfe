//! Observability for the spot advisor.
//!
//! - Prometheus recorder installation and the `/metrics` handler
//! - Domain metrics for dataset loads, pricing fetches and analysis runs
//! - Axum middleware for per-request HTTP metrics
//!
//! ```rust,ignore
//! use observability::{init_metrics, metrics_handler, SpotAdvisorMetrics};
//!
//! init_metrics()?;
//! SpotAdvisorMetrics::record_pricing_cache_hit("Linux");
//!
//! let app = Router::new().route("/metrics", get(metrics_handler));
//! ```

pub mod middleware;
pub mod spot;

pub use middleware::metrics_middleware;
pub use spot::{OperationTimer, SpotAdvisorMetrics};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing::info;

static METRICS_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Install the Prometheus recorder once per process and return its handle.
///
/// Later calls return the handle installed by the first one.
pub fn init_metrics() -> Result<&'static PrometheusHandle, BuildError> {
    METRICS_HANDLE.get_or_try_init(|| {
        let handle = PrometheusBuilder::new().install_recorder()?;
        info!("Prometheus metrics recorder initialized");
        register_metric_descriptions();
        Ok(handle)
    })
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

/// Axum handler for /metrics
pub async fn metrics_handler() -> String {
    match get_metrics_handle() {
        Some(handle) => handle.render(),
        None => "# Metrics not initialized\n".to_string(),
    }
}

fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // HTTP
    describe_counter!("http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP requests answered with 4xx or 5xx"
    );

    // Dataset
    describe_counter!(
        "spot_dataset_loads_total",
        "Spot dataset loads by status"
    );
    describe_counter!(
        "spot_dataset_fetch_attempts_total",
        "Fetch attempts spent on failed dataset loads"
    );
    describe_histogram!(
        "spot_dataset_load_duration_seconds",
        "Dataset load duration including retries"
    );
    describe_gauge!("spot_dataset_regions", "Regions in the loaded dataset");

    // Pricing
    describe_counter!(
        "spot_pricing_fetches_total",
        "Pricing fetches by OS and outcome"
    );
    describe_histogram!(
        "spot_pricing_fetch_duration_seconds",
        "Pricing fetch duration in seconds"
    );
    describe_counter!(
        "spot_pricing_cache_hits_total",
        "Pricing lookups served from the cache"
    );
    describe_counter!(
        "spot_pricing_fetches_joined_total",
        "Pricing lookups that joined an in-flight fetch"
    );

    // Analysis
    describe_counter!("spot_analysis_runs_total", "Analysis runs by status");
    describe_histogram!(
        "spot_analysis_duration_seconds",
        "Analysis duration in seconds"
    );
    describe_gauge!(
        "spot_analysis_last_regions_skipped",
        "Regions skipped by the most recent analysis"
    );
    describe_counter!(
        "spot_analysis_stale_total",
        "Analysis results dropped because a newer run had already published"
    );

    // Snapshot collection
    describe_counter!(
        "spot_snapshot_documents_total",
        "Pricing documents downloaded into the snapshot, by status"
    );
    describe_histogram!(
        "spot_snapshot_collection_duration_seconds",
        "Time to download a full pricing snapshot"
    );
}
