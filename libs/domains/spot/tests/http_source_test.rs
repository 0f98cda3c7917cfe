//! HTTP sources against a real listener
//!
//! The spot router is served on an ephemeral port so the pricing client sees
//! the same status codes and bodies a deployed server would produce.

mod common;

use axum::{http::StatusCode, routing::get, Json, Router};
use common::*;
use domain_spot::handlers::{self, SpotState};
use domain_spot::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn catalog() -> PricingCatalog {
    let snapshot: PricingSnapshot = serde_json::from_value(json!({
        "us-east-1": {
            "Linux": {"regions": {"US East (N. Virginia)": {
                "m5.large Linux": {"Instance Type": "m5.large", "price": "0.0960000000"}
            }}}
        }
    }))
    .unwrap();
    PricingCatalog::from_snapshot(snapshot)
}

async fn spot_server() -> String {
    let h = harness();
    let state = SpotState::new(
        Arc::new(AnalysisSession::new(h.orchestrator)),
        Some(Arc::new(catalog())),
    );
    let app = Router::new()
        .nest("/api", handlers::router(state))
        .route("/spot-advisor-data.json", get(|| async { Json(dataset()) }))
        .route(
            "/broken.json",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );
    serve(app).await
}

#[tokio::test]
async fn test_pricing_client_reads_rates() {
    let base = spot_server().await;
    let source = HttpPricingSource::new(&base, Duration::from_secs(5)).unwrap();

    let response = source
        .fetch_pricing("us-east-1", OperatingSystem::Linux)
        .await
        .unwrap();

    let table = PricingTable::from_response("us-east-1", OperatingSystem::Linux, &response);
    assert!(approx(table.entries["m5.large"].on_demand_rate, 0.096));
}

#[tokio::test]
async fn test_pricing_client_maps_missing_data_to_no_data() {
    let base = spot_server().await;
    let source = HttpPricingSource::new(format!("{base}/"), Duration::from_secs(5)).unwrap();

    let err = source
        .fetch_pricing("us-east-1", OperatingSystem::Windows)
        .await
        .unwrap_err();

    assert_eq!(err, SourceError::NoData);
}

#[tokio::test]
async fn test_pricing_client_keeps_other_failures_distinct() {
    // Server without a catalog answers 404 without the "no data" wording
    let h = harness();
    let state = SpotState::new(Arc::new(AnalysisSession::new(h.orchestrator)), None);
    let base = serve(Router::new().nest("/api", handlers::router(state))).await;
    let source = HttpPricingSource::new(&base, Duration::from_secs(5)).unwrap();

    let err = source
        .fetch_pricing("us-east-1", OperatingSystem::Linux)
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_dataset_client_fetches_and_reports_status() {
    let base = spot_server().await;

    let source = HttpSpotDataSource::new(
        format!("{base}/spot-advisor-data.json"),
        Duration::from_secs(5),
    )
    .unwrap();
    let fetched = source.fetch_dataset().await.unwrap();
    assert_eq!(fetched, dataset());

    let broken =
        HttpSpotDataSource::new(format!("{base}/broken.json"), Duration::from_secs(5)).unwrap();
    let err = broken.fetch_dataset().await.unwrap_err();
    assert_eq!(
        err,
        SourceError::Status {
            status: 503,
            body: "maintenance".to_string()
        }
    );
}

#[tokio::test]
async fn test_pricing_client_connection_failure_is_http_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source =
        HttpPricingSource::new(format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let err = source
        .fetch_pricing("us-east-1", OperatingSystem::Linux)
        .await
        .unwrap_err();

    assert!(matches!(err, SourceError::Http(_)));
}
