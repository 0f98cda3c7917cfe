//! Spot Domain
//!
//! Merges the global spot interruption/savings dataset with per-region
//! on-demand pricing into quantity-weighted cost breakdowns, then re-projects
//! them per instance type, per region and per stack.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │   AnalysisSession    │  ← Latest published outcome, superseded runs dropped
//! └──────────┬───────────┘
//!            │
//! ┌──────────▼───────────┐
//! │ AnalysisOrchestrator │  ← Fan-out pricing, per-cell costs, three views
//! └───┬──────┬───────┬───┘
//!     │      │       │
//! ┌───▼──┐┌──▼────┐┌─▼──────────┐
//! │Dataset││Pricing││ Quantity   │  ← Caches with in-flight de-duplication
//! │ Cache ││ Cache ││ Registry   │
//! └───┬──┘└──┬────┘└────────────┘
//!     │      │
//! ┌───▼──────▼───┐
//! │   Sources    │  ← HTTP clients (traits, swappable in tests)
//! └──────────────┘
//! ```

pub mod calculator;
pub mod catalog;
pub mod config;
pub mod dataset;
pub mod error;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod pricing;
pub mod quantity;
pub mod regions;
pub mod retry;
pub mod session;
pub mod source;

pub use calculator::{compute_cell, CellRef};
pub use catalog::{MeteredUnitMap, PricingCatalog, PricingSnapshot};
pub use config::SourceConfig;
pub use dataset::SpotDatasetCache;
pub use error::{SpotError, SpotResult};
pub use models::{
    AnalysisOutcome, AnalysisReport, AnalysisRequest, CostBreakdown, InstanceAnalysis,
    InstanceSpecs, InterruptionRange, OperatingSystem, PricingConfig, PricingEntry, PricingRate,
    PricingResponse, PricingTable, RatedMetric, RegionAnalysis, RegionCell, RegionInstance,
    RegionSpotData, SkipReason, SkippedRegion, SpotDataset, SpotMetric, StackAnalysis,
    NOT_AVAILABLE,
};
pub use orchestrator::{analyze_regions, analyze_stacks, AnalysisOrchestrator};
pub use pricing::{PricingCache, PricingLookup};
pub use quantity::{Quantity, QuantityCell, QuantityRegistry};
pub use retry::RetryConfig;
pub use session::AnalysisSession;
pub use source::{
    CachedSpotDataSource, HttpPricingSource, HttpSpotDataSource, PricingSource, SourceError,
    SpotDataSource,
};

/// Lock a cache's state, recovering the guard if a previous holder panicked.
///
/// State is only swapped whole under the lock, so a poisoned value is still
/// consistent.
pub(crate) fn lock_state<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
