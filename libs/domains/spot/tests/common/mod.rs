//! Shared fixtures for spot domain integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use domain_spot::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const EPSILON: f64 = 1e-9;

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

/// us-east-1: full Linux + Windows metrics
/// us-west-2: m5.large only (c5.large has no spot data)
/// eu-west-1 / ap-east-1: metrics present, pricing is the problem
pub fn dataset() -> SpotDataset {
    serde_json::from_value(serde_json::json!({
        "instance_types": {
            "m5.large": {"emr": true, "cores": 2, "ram_gb": 8.0},
            "c5.large": {"emr": false, "cores": 2, "ram_gb": 4.0}
        },
        "ranges": [
            {"index": 0, "label": "<5%", "dots": 0, "max": 5},
            {"index": 1, "label": "5-10%", "dots": 1, "max": 11},
            {"index": 2, "label": "10-15%", "dots": 2, "max": 16},
            {"index": 3, "label": "15-20%", "dots": 3, "max": 22},
            {"index": 4, "label": ">20%", "dots": 4, "max": 100}
        ],
        "spot_advisor": {
            "us-east-1": {
                "Linux": {
                    "m5.large": {"s": 60, "r": 0},
                    "c5.large": {"s": 70, "r": 1}
                },
                "Windows": {"m5.large": {"s": 50, "r": 2}}
            },
            "us-west-2": {"Linux": {"m5.large": {"s": 55, "r": 1}}},
            "eu-west-1": {"Linux": {"m5.large": {"s": 40, "r": 3}}},
            "ap-east-1": {"Linux": {"m5.large": {"s": 45, "r": 2}}}
        }
    }))
    .unwrap()
}

/// Dataset source that counts calls and can be told to fail
pub struct FakeSpotSource {
    pub calls: Arc<AtomicU32>,
    dataset: Option<SpotDataset>,
}

impl FakeSpotSource {
    pub fn serving(dataset: SpotDataset) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            dataset: Some(dataset),
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            dataset: None,
        }
    }
}

#[async_trait]
impl SpotDataSource for FakeSpotSource {
    async fn fetch_dataset(&self) -> Result<SpotDataset, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dataset
            .clone()
            .ok_or_else(|| SourceError::Http("connection refused".to_string()))
    }
}

#[derive(Clone)]
pub enum PricingAnswer {
    Rates(Vec<(&'static str, &'static str)>),
    NoData,
    Fail,
}

/// Pricing source answering from a fixed table, keyed like the endpoint
pub struct FakePricingSource {
    answers: HashMap<(String, OperatingSystem), PricingAnswer>,
    calls: Mutex<HashMap<(String, OperatingSystem), u32>>,
    delay: Duration,
    region_delays: HashMap<String, Duration>,
}

impl FakePricingSource {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
            region_delays: HashMap::new(),
        }
    }

    /// us-east-1: Linux + Windows; us-west-2: Linux only;
    /// ap-east-1: explicit no data; eu-west-1: endpoint errors
    pub fn standard() -> Self {
        Self::new()
            .with(
                "us-east-1",
                OperatingSystem::Linux,
                PricingAnswer::Rates(vec![("m5.large", "0.096"), ("c5.large", "0.085")]),
            )
            .with(
                "us-east-1",
                OperatingSystem::Windows,
                PricingAnswer::Rates(vec![("m5.large", "0.188")]),
            )
            .with(
                "us-west-2",
                OperatingSystem::Linux,
                PricingAnswer::Rates(vec![("m5.large", "0.096"), ("c5.large", "0.085")]),
            )
            .with("us-west-2", OperatingSystem::Windows, PricingAnswer::NoData)
            .with("ap-east-1", OperatingSystem::Linux, PricingAnswer::NoData)
            .with("ap-east-1", OperatingSystem::Windows, PricingAnswer::NoData)
            .with("eu-west-1", OperatingSystem::Linux, PricingAnswer::Fail)
            .with("eu-west-1", OperatingSystem::Windows, PricingAnswer::Fail)
    }

    pub fn with(mut self, region: &str, os: OperatingSystem, answer: PricingAnswer) -> Self {
        self.answers.insert((region.to_string(), os), answer);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Slow down one region only
    pub fn with_region_delay(mut self, region: &str, delay: Duration) -> Self {
        self.region_delays.insert(region.to_string(), delay);
        self
    }

    pub fn calls(&self, region: &str, os: OperatingSystem) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&(region.to_string(), os))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl PricingSource for FakePricingSource {
    async fn fetch_pricing(
        &self,
        region: &str,
        os: OperatingSystem,
    ) -> Result<PricingResponse, SourceError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry((region.to_string(), os))
            .or_default() += 1;

        let delay = self.region_delays.get(region).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.answers.get(&(region.to_string(), os)) {
            Some(PricingAnswer::Rates(rates)) => Ok(PricingResponse {
                regions: HashMap::from([(
                    region.to_string(),
                    rates
                        .iter()
                        .map(|(instance_type, price)| {
                            (
                                instance_type.to_string(),
                                PricingRate {
                                    price: price.to_string(),
                                    unit: "Hrs".to_string(),
                                    description: None,
                                },
                            )
                        })
                        .collect(),
                )]),
            }),
            Some(PricingAnswer::Fail) => Err(SourceError::Status {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
            Some(PricingAnswer::NoData) | None => Err(SourceError::NoData),
        }
    }
}

pub struct Harness {
    pub orchestrator: AnalysisOrchestrator,
    pub pricing: Arc<FakePricingSource>,
    pub spot_calls: Arc<AtomicU32>,
}

pub fn harness_with(spot: FakeSpotSource, pricing: FakePricingSource) -> Harness {
    let spot_calls = spot.calls.clone();
    let pricing = Arc::new(pricing);
    let orchestrator = AnalysisOrchestrator::new(
        SpotDatasetCache::new(
            Arc::new(spot),
            RetryConfig::new().with_delay(Duration::ZERO),
        ),
        PricingCache::new(pricing.clone()),
        Arc::new(QuantityRegistry::new()),
    );
    Harness {
        orchestrator,
        pricing,
        spot_calls,
    }
}

pub fn harness() -> Harness {
    harness_with(
        FakeSpotSource::serving(dataset()),
        FakePricingSource::standard(),
    )
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn linux_only() -> PricingConfig {
    PricingConfig {
        include_windows: false,
    }
}
