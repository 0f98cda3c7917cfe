//! HTTP handlers for the spot domain

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::catalog::PricingCatalog;
use crate::error::{SpotError, SpotResult};
use crate::models::{
    AnalysisOutcome, AnalysisRequest, CostBreakdown, InstanceAnalysis, InstanceSpecs,
    OperatingSystem, PricingRate, PricingResponse, RatedMetric, RegionAnalysis, RegionCell,
    RegionInstance, SkipReason, SkippedRegion, StackAnalysis,
};
use crate::quantity::QuantityCell;
use crate::regions;
use crate::session::AnalysisSession;

pub const TAG: &str = "spot";

/// OpenAPI documentation for the spot API
#[derive(OpenApi)]
#[openapi(
    paths(
        get_spot_data,
        get_pricing,
        run_analysis,
        latest_analysis,
        list_quantities,
        set_quantity,
        clear_quantities,
        list_regions,
        list_instance_types,
    ),
    components(
        schemas(
            AnalysisRequest,
            AnalysisOutcome,
            InstanceAnalysis,
            RegionAnalysis,
            RegionCell,
            RegionInstance,
            StackAnalysis,
            CostBreakdown,
            RatedMetric,
            InstanceSpecs,
            SkippedRegion,
            SkipReason,
            OperatingSystem,
            PricingResponse,
            PricingRate,
            QuantityCell,
            SetQuantityRequest,
            RegionSummary,
            InstanceTypeSummary,
        )
    ),
    tags(
        (name = TAG, description = "Spot vs on-demand cost analysis")
    )
)]
pub struct ApiDoc;

/// Shared state for the spot routes
#[derive(Clone)]
pub struct SpotState {
    pub session: Arc<AnalysisSession>,
    /// Snapshot backing `/pricing`; absent until one has been downloaded
    pub catalog: Option<Arc<PricingCatalog>>,
}

impl SpotState {
    pub fn new(session: Arc<AnalysisSession>, catalog: Option<Arc<PricingCatalog>>) -> Self {
        Self { session, catalog }
    }
}

/// Create the spot router; mount it under `/api`
pub fn router(state: SpotState) -> Router {
    Router::new()
        .route("/spot-data", get(get_spot_data))
        .route("/pricing", get(get_pricing))
        .route("/analysis", get(latest_analysis).post(run_analysis))
        .route(
            "/quantities",
            get(list_quantities)
                .put(set_quantity)
                .delete(clear_quantities),
        )
        .route("/regions", get(list_regions))
        .route("/instance-types", get(list_instance_types))
        .with_state(state)
}

/// Fetch the validated interruption/savings dataset
#[utoipa::path(
    get,
    path = "/spot-data",
    tag = TAG,
    responses(
        (status = 200, description = "Spot advisor dataset"),
        (status = 502, description = "Dataset could not be fetched")
    )
)]
async fn get_spot_data(State(state): State<SpotState>) -> SpotResult<Response> {
    let dataset = state.session.orchestrator().dataset().load().await?;
    Ok(Json(dataset.as_ref()).into_response())
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PricingQuery {
    /// Region code, e.g. `us-east-1`
    pub region: String,
    pub os: OperatingSystem,
}

/// On-demand rates for one region and OS from the local snapshot
#[utoipa::path(
    get,
    path = "/pricing",
    tag = TAG,
    params(PricingQuery),
    responses(
        (status = 200, description = "On-demand rates", body = PricingResponse),
        (status = 404, description = "No pricing data found for the region and OS")
    )
)]
async fn get_pricing(
    State(state): State<SpotState>,
    Query(query): Query<PricingQuery>,
) -> SpotResult<Json<PricingResponse>> {
    let catalog = state.catalog.as_ref().ok_or_else(|| {
        SpotError::NotFound(
            "pricing snapshot not loaded, run `spot-advisor download-pricing` first".to_string(),
        )
    })?;

    debug!(region = %query.region, os = %query.os, "Pricing lookup");
    catalog
        .lookup(&query.region, query.os)
        .map(Json)
        .ok_or(SpotError::PricingUnavailable {
            region: query.region,
            os: query.os,
        })
}

/// Analyze a selection and make it the current one
#[utoipa::path(
    post,
    path = "/analysis",
    tag = TAG,
    request_body = AnalysisRequest,
    responses(
        (status = 200, description = "Per-instance, per-region and stack views", body = AnalysisOutcome),
        (status = 400, description = "Unknown instance type or empty selection"),
        (status = 422, description = "No selected region has pricing"),
        (status = 502, description = "Dataset could not be fetched")
    )
)]
async fn run_analysis(
    State(state): State<SpotState>,
    Json(request): Json<AnalysisRequest>,
) -> SpotResult<Response> {
    let outcome = state.session.run(request).await?;
    Ok(Json(outcome.as_ref()).into_response())
}

/// Latest published analysis
#[utoipa::path(
    get,
    path = "/analysis",
    tag = TAG,
    responses(
        (status = 200, description = "Latest analysis", body = AnalysisOutcome),
        (status = 404, description = "Nothing analyzed yet")
    )
)]
async fn latest_analysis(State(state): State<SpotState>) -> SpotResult<Response> {
    let outcome = state
        .session
        .latest()
        .ok_or_else(|| SpotError::NotFound("no analysis has been run yet".to_string()))?;
    Ok(Json(outcome.as_ref()).into_response())
}

/// Explicitly set quantities
#[utoipa::path(
    get,
    path = "/quantities",
    tag = TAG,
    responses(
        (status = 200, description = "Quantities by cell", body = Vec<QuantityCell>)
    )
)]
async fn list_quantities(State(state): State<SpotState>) -> Json<Vec<QuantityCell>> {
    Json(state.session.orchestrator().quantities().entries())
}

/// Body of `PUT /quantities`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetQuantityRequest {
    pub instance_type: String,
    pub region: String,
    pub os: OperatingSystem,
    /// Whole number of at least 1
    pub quantity: f64,
}

/// Set the quantity of one cell and refresh the current analysis
#[utoipa::path(
    put,
    path = "/quantities",
    tag = TAG,
    request_body = SetQuantityRequest,
    responses(
        (status = 200, description = "Quantity stored", body = QuantityCell),
        (status = 400, description = "Quantity is not a whole number of at least 1")
    )
)]
async fn set_quantity(
    State(state): State<SpotState>,
    Json(input): Json<SetQuantityRequest>,
) -> SpotResult<Json<QuantityCell>> {
    let quantity = state.session.orchestrator().quantities().try_set(
        &input.instance_type,
        &input.region,
        input.os,
        input.quantity,
    )?;

    refresh_analysis(&state.session).await;

    Ok(Json(QuantityCell {
        instance_type: input.instance_type,
        region: input.region,
        os: input.os,
        quantity,
    }))
}

/// Reset every quantity to 1 and refresh the current analysis
#[utoipa::path(
    delete,
    path = "/quantities",
    tag = TAG,
    responses(
        (status = 204, description = "Quantities cleared")
    )
)]
async fn clear_quantities(State(state): State<SpotState>) -> impl IntoResponse {
    state.session.orchestrator().quantities().clear();
    refresh_analysis(&state.session).await;
    StatusCode::NO_CONTENT
}

/// Re-run the current selection after a quantity change, if there is one.
///
/// A failed refresh keeps the previous analysis; the quantity edit stands.
async fn refresh_analysis(session: &AnalysisSession) {
    if session.selection().is_none() {
        return;
    }
    if let Err(e) = session.rerun().await {
        warn!(error = %e, "Failed to refresh analysis after quantity change");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegionSummary {
    pub code: String,
    /// Display name used by the pricing feed
    pub name: String,
}

/// Regions present in the dataset
#[utoipa::path(
    get,
    path = "/regions",
    tag = TAG,
    responses(
        (status = 200, description = "Known regions", body = Vec<RegionSummary>),
        (status = 502, description = "Dataset could not be fetched")
    )
)]
async fn list_regions(State(state): State<SpotState>) -> SpotResult<Json<Vec<RegionSummary>>> {
    let dataset = state.session.orchestrator().dataset().load().await?;
    let summaries = dataset
        .known_regions()
        .into_iter()
        .filter_map(|code| {
            regions::display_name(&code).map(|name| RegionSummary {
                name: name.to_string(),
                code,
            })
        })
        .collect();
    Ok(Json(summaries))
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstanceTypeSummary {
    pub instance_type: String,
    pub specs: InstanceSpecs,
}

/// Instance types present in the dataset
#[utoipa::path(
    get,
    path = "/instance-types",
    tag = TAG,
    responses(
        (status = 200, description = "Instance types with specs", body = Vec<InstanceTypeSummary>),
        (status = 502, description = "Dataset could not be fetched")
    )
)]
async fn list_instance_types(
    State(state): State<SpotState>,
) -> SpotResult<Json<Vec<InstanceTypeSummary>>> {
    let dataset = state.session.orchestrator().dataset().load().await?;
    let summaries = dataset
        .instance_types()
        .into_iter()
        .filter_map(|instance_type| {
            let specs = dataset.instance_specs.get(&instance_type)?.clone();
            Some(InstanceTypeSummary {
                instance_type,
                specs,
            })
        })
        .collect();
    Ok(Json(summaries))
}
