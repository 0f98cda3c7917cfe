//! End-to-end analysis behaviour against fake data sources

mod common;

use common::*;
use domain_spot::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_single_cell_costs_and_quantity() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(&strings(&["m5.large"]), &strings(&["us-east-1"]), &linux_only())
        .await
        .unwrap();

    let cell = &report.instances[0].regions[0];
    assert!(approx(cell.linux_cost.on_demand_total, 0.096));
    assert!(approx(cell.linux_cost.spot_total, 0.0384));
    assert!(approx(cell.linux_cost.savings_total, 0.0576));
    assert_eq!(cell.interruption_frequency, "<5%");

    h.orchestrator
        .quantities()
        .try_set("m5.large", "us-east-1", OperatingSystem::Linux, 3.0)
        .unwrap();

    let report = h
        .orchestrator
        .analyze(&strings(&["m5.large"]), &strings(&["us-east-1"]), &linux_only())
        .await
        .unwrap();

    let cell = &report.instances[0].regions[0];
    assert!(approx(cell.linux_cost.on_demand_total, 0.288));
    assert!(approx(cell.linux_cost.spot_total, 0.1152));
    assert!(approx(cell.linux_cost.savings_total, 0.1728));
}

#[tokio::test]
async fn test_region_without_published_pricing_is_skipped() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(
            &strings(&["m5.large"]),
            &strings(&["us-east-1", "ap-east-1"]),
            &PricingConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(
        report.skipped_regions,
        vec![SkippedRegion {
            region: "ap-east-1".to_string(),
            reason: SkipReason::PricingUnavailable,
        }]
    );

    let analysis = &report.instances[0];
    assert_eq!(analysis.regions.len(), 1);
    assert_eq!(analysis.regions[0].region, "us-east-1");
    assert_eq!(analysis.available_regions_count, 1);
    assert_eq!(analysis.total_regions_count, 2);
    assert!(report.warning().unwrap().contains("ap-east-1"));
}

#[tokio::test]
async fn test_priced_cell_without_spot_data() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(&strings(&["c5.large"]), &strings(&["us-west-2"]), &linux_only())
        .await
        .unwrap();

    let analysis = &report.instances[0];
    let cell = &analysis.regions[0];
    assert!(cell.spot_unavailable);
    assert!(cell.linux_metric.is_none());
    assert_eq!(cell.interruption_frequency, "Not Available");
    assert!(approx(cell.linux_cost.on_demand_total, 0.085));
    assert_eq!(cell.linux_cost.spot_total, cell.linux_cost.on_demand_total);
    assert_eq!(cell.linux_cost.savings_total, 0.0);
    assert!(!cell.linux_cost.is_spot_available);

    assert_eq!(analysis.available_regions_count, 0);
    assert_eq!(analysis.average_score, 0.0);
    assert_eq!(analysis.average_rating, 0.0);
}

#[tokio::test]
async fn test_all_regions_unavailable_is_fatal() {
    let h = harness();

    let err = h
        .orchestrator
        .analyze(
            &strings(&["m5.large"]),
            &strings(&["ap-east-1", "eu-west-1"]),
            &PricingConfig::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        SpotError::NoPricingDataForAnySelectedRegion {
            regions: strings(&["ap-east-1", "eu-west-1"]),
        }
    );
}

#[tokio::test]
async fn test_fetch_failure_is_reported_and_retried_next_call() {
    let h = harness();
    let instances = strings(&["m5.large"]);
    let regions = strings(&["us-east-1", "eu-west-1"]);

    for _ in 0..2 {
        let report = h
            .orchestrator
            .analyze(&instances, &regions, &linux_only())
            .await
            .unwrap();
        assert_eq!(report.skipped_regions.len(), 1);
        assert!(matches!(
            report.skipped_regions[0].reason,
            SkipReason::FetchFailed { .. }
        ));
    }

    // Failures are not cached; successes and "no data" are
    assert_eq!(h.pricing.calls("eu-west-1", OperatingSystem::Linux), 2);
    assert_eq!(h.pricing.calls("us-east-1", OperatingSystem::Linux), 1);
}

#[tokio::test]
async fn test_unknown_instance_type_is_fatal() {
    let h = harness();

    let err = h
        .orchestrator
        .analyze(
            &strings(&["m5.large", "z9.mega"]),
            &strings(&["us-east-1"]),
            &linux_only(),
        )
        .await
        .unwrap_err();

    assert_eq!(err, SpotError::InstanceTypeNotFound("z9.mega".to_string()));
}

#[tokio::test]
async fn test_empty_selection_is_rejected() {
    let h = harness();

    let err = h
        .orchestrator
        .analyze(&[], &strings(&["us-east-1"]), &linux_only())
        .await
        .unwrap_err();

    assert!(matches!(err, SpotError::InvalidInput(_)));
}

#[tokio::test]
async fn test_windows_cost_only_where_windows_is_priced() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(
            &strings(&["m5.large"]),
            &strings(&["us-east-1", "us-west-2"]),
            &PricingConfig::default(),
        )
        .await
        .unwrap();

    let cells = &report.instances[0].regions;
    let east = cells.iter().find(|c| c.region == "us-east-1").unwrap();
    let west = cells.iter().find(|c| c.region == "us-west-2").unwrap();

    let windows = east.windows_cost.as_ref().unwrap();
    assert!(approx(windows.on_demand_total, 0.188));
    assert!(approx(windows.spot_total, 0.094));
    assert_eq!(east.windows_metric.as_ref().unwrap().interruption_frequency, "10-15%");

    assert!(west.windows_cost.is_none());
    assert!(report.skipped_regions.is_empty());
}

#[tokio::test]
async fn test_available_regions_never_exceed_total() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(
            &strings(&["m5.large", "c5.large"]),
            &strings(&["us-east-1", "us-west-2", "ap-east-1", "eu-west-1"]),
            &PricingConfig::default(),
        )
        .await
        .unwrap();

    for analysis in &report.instances {
        assert!(analysis.available_regions_count <= analysis.total_regions_count);
        assert_eq!(analysis.total_regions_count, 4);
    }

    let m5 = &report.instances[0];
    assert_eq!(m5.available_regions_count, 2);
    assert!(approx(m5.average_score, 57.5));
    assert!(approx(m5.average_rating, 0.5));

    let c5 = &report.instances[1];
    assert_eq!(c5.available_regions_count, 1);
}

#[tokio::test]
async fn test_region_and_instance_views_sum_to_the_same_total() {
    let h = harness();
    h.orchestrator
        .quantities()
        .try_set("c5.large", "us-west-2", OperatingSystem::Linux, 4.0)
        .unwrap();
    h.orchestrator
        .quantities()
        .try_set("m5.large", "us-east-1", OperatingSystem::Windows, 2.0)
        .unwrap();

    let outcome = h
        .orchestrator
        .run(&AnalysisRequest {
            instance_types: strings(&["m5.large", "c5.large"]),
            regions: strings(&["us-east-1", "us-west-2"]),
            pricing: PricingConfig::default(),
        })
        .await
        .unwrap();

    let by_instance: f64 = outcome
        .instances
        .iter()
        .map(|i| i.total_cost.on_demand_total)
        .sum();
    let by_region: f64 = outcome
        .regions
        .iter()
        .map(|r| r.total_cost.on_demand_total)
        .sum();
    let spot_by_instance: f64 = outcome.instances.iter().map(|i| i.total_cost.spot_total).sum();
    let spot_by_region: f64 = outcome.regions.iter().map(|r| r.total_cost.spot_total).sum();

    assert!(approx(by_instance, by_region));
    assert!(approx(spot_by_instance, spot_by_region));
    assert!(approx(outcome.stacks[0].total_cost.on_demand_total, by_instance));

    assert_eq!(outcome.regions[0].region, "us-east-1");
    assert_eq!(outcome.regions[0].instances.len(), 2);
    assert!(outcome.warning.is_none());
}

#[tokio::test]
async fn test_repeated_analysis_is_idempotent() {
    let h = harness();
    let instances = strings(&["m5.large", "c5.large"]);
    let regions = strings(&["us-east-1", "us-west-2", "ap-east-1"]);
    let config = PricingConfig::default();

    let first = h.orchestrator.analyze(&instances, &regions, &config).await.unwrap();
    let second = h.orchestrator.analyze(&instances, &regions, &config).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.spot_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_duplicate_selection_entries_are_ignored() {
    let h = harness();

    let report = h
        .orchestrator
        .analyze(
            &strings(&["m5.large", "m5.large"]),
            &strings(&["us-east-1", "us-east-1"]),
            &linux_only(),
        )
        .await
        .unwrap();

    assert_eq!(report.instances.len(), 1);
    assert_eq!(report.instances[0].regions.len(), 1);
    assert_eq!(report.instances[0].total_regions_count, 1);
}

#[tokio::test]
async fn test_dataset_failure_is_fatal_after_retries() {
    let h = harness_with(FakeSpotSource::failing(), FakePricingSource::standard());

    let err = h
        .orchestrator
        .analyze(&strings(&["m5.large"]), &strings(&["us-east-1"]), &linux_only())
        .await
        .unwrap_err();

    assert!(matches!(err, SpotError::DatasetFetch { attempts: 4, .. }));
    assert_eq!(h.spot_calls.load(Ordering::SeqCst), 4);
    assert!(h.orchestrator.dataset().get().is_none());
}

#[tokio::test]
async fn test_concurrent_analyses_share_pricing_fetches() {
    let h = harness_with(
        FakeSpotSource::serving(dataset()),
        FakePricingSource::standard().with_delay(Duration::from_millis(30)),
    );
    let instances = strings(&["m5.large"]);
    let regions = strings(&["us-east-1", "us-west-2"]);
    let config = PricingConfig::default();

    let (a, b) = tokio::join!(
        h.orchestrator.analyze(&instances, &regions, &config),
        h.orchestrator.analyze(&instances, &regions, &config),
    );

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(h.pricing.calls("us-east-1", OperatingSystem::Linux), 1);
    assert_eq!(h.pricing.calls("us-west-2", OperatingSystem::Windows), 1);
    assert_eq!(h.spot_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_session_rerun_picks_up_quantity_changes() {
    let h = harness();
    let session = AnalysisSession::new(h.orchestrator.clone());

    let first = session
        .run(AnalysisRequest {
            instance_types: strings(&["m5.large"]),
            regions: strings(&["us-east-1"]),
            pricing: linux_only(),
        })
        .await
        .unwrap();
    assert!(approx(first.instances[0].total_cost.on_demand_total, 0.096));

    h.orchestrator
        .quantities()
        .try_set("m5.large", "us-east-1", OperatingSystem::Linux, 10.0)
        .unwrap();
    session.rerun().await.unwrap();

    let latest = session.latest().unwrap();
    assert!(approx(latest.instances[0].total_cost.on_demand_total, 0.96));
    assert!(!Arc::ptr_eq(&first, &latest));
}

#[tokio::test]
async fn test_failed_newer_run_keeps_older_result_from_publishing() {
    let pricing =
        FakePricingSource::standard().with_region_delay("us-east-1", Duration::from_millis(100));
    let h = harness_with(FakeSpotSource::serving(dataset()), pricing);
    let session = AnalysisSession::new(h.orchestrator.clone());

    let older = session.run(AnalysisRequest {
        instance_types: strings(&["m5.large"]),
        regions: strings(&["us-east-1"]),
        pricing: linux_only(),
    });
    let newer = async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        session
            .run(AnalysisRequest {
                instance_types: strings(&["m5.large"]),
                regions: strings(&["ap-east-1"]),
                pricing: linux_only(),
            })
            .await
    };
    let (older, newer) = tokio::join!(older, newer);

    assert!(older.is_ok());
    assert!(matches!(
        newer,
        Err(SpotError::NoPricingDataForAnySelectedRegion { .. })
    ));
    assert_eq!(session.selection().unwrap().regions, strings(&["ap-east-1"]));
    assert!(session.latest().is_none());
}
