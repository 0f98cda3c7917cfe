use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use observability::{OperationTimer, SpotAdvisorMetrics};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::error::{SpotError, SpotResult};
use crate::lock_state;
use crate::models::SpotDataset;
use crate::retry::{RetryConfig, retry_with_fixed_delay};
use crate::source::{SourceError, SpotDataSource};

type SharedLoad = Shared<BoxFuture<'static, SpotResult<Arc<SpotDataset>>>>;

enum LoadState {
    Empty,
    Loading { generation: u64, load: SharedLoad },
    Ready(Arc<SpotDataset>),
}

struct Inner {
    state: LoadState,
    /// Bumped by `reset` so a load started earlier cannot repopulate the cache
    generation: u64,
}

/// Process-wide holder of the interruption/savings dataset.
///
/// The first `load` fetches (with fixed-delay retries); concurrent callers join
/// the same in-flight load; after success the dataset is served without I/O
/// until `reset`.
#[derive(Clone)]
pub struct SpotDatasetCache {
    source: Arc<dyn SpotDataSource>,
    retry: RetryConfig,
    inner: Arc<Mutex<Inner>>,
}

impl SpotDatasetCache {
    pub fn new(source: Arc<dyn SpotDataSource>, retry: RetryConfig) -> Self {
        Self {
            source,
            retry,
            inner: Arc::new(Mutex::new(Inner {
                state: LoadState::Empty,
                generation: 0,
            })),
        }
    }

    /// Return the dataset, fetching it if nothing is cached yet.
    pub async fn load(&self) -> SpotResult<Arc<SpotDataset>> {
        let load = {
            let mut inner = lock_state(&self.inner);
            match &inner.state {
                LoadState::Ready(dataset) => return Ok(dataset.clone()),
                LoadState::Loading { load, .. } => load.clone(),
                LoadState::Empty => {
                    let generation = inner.generation;
                    let load = self.start_load(generation);
                    inner.state = LoadState::Loading {
                        generation,
                        load: load.clone(),
                    };
                    load
                }
            }
        };

        load.await
    }

    /// The cached dataset, without I/O
    pub fn get(&self) -> Option<Arc<SpotDataset>> {
        match &lock_state(&self.inner).state {
            LoadState::Ready(dataset) => Some(dataset.clone()),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.get().is_some()
    }

    /// Drop the cached dataset; the next `load` fetches again
    pub fn reset(&self) {
        let mut inner = lock_state(&self.inner);
        inner.generation += 1;
        inner.state = LoadState::Empty;
        info!(generation = inner.generation, "Spot dataset cache reset");
    }

    fn start_load(&self, generation: u64) -> SharedLoad {
        let source = self.source.clone();
        let retry = self.retry.clone();
        let inner = self.inner.clone();

        async move {
            let timer = OperationTimer::start();
            let attempts = AtomicU32::new(0);

            let fetched = retry_with_fixed_delay(
                |attempt| {
                    attempts.store(attempt, Ordering::Relaxed);
                    let source = source.clone();
                    async move { fetch_validated(source.as_ref()).await }
                },
                &retry,
            )
            .await;

            let attempts = attempts.load(Ordering::Relaxed);
            let outcome = match fetched {
                Ok(dataset) => {
                    SpotAdvisorMetrics::record_dataset_load(
                        attempts,
                        dataset.regions.len(),
                        timer.elapsed(),
                    );
                    info!(
                        attempts,
                        regions = dataset.regions.len(),
                        instance_types = dataset.instance_specs.len(),
                        "Spot dataset loaded"
                    );
                    Ok(Arc::new(dataset))
                }
                Err(e) => {
                    SpotAdvisorMetrics::record_dataset_failure(attempts);
                    Err(SpotError::DatasetFetch {
                        attempts,
                        message: e.to_string(),
                    })
                }
            };

            let mut inner = lock_state(&inner);
            let current = matches!(
                inner.state,
                LoadState::Loading { generation: g, .. } if g == generation
            );
            if current {
                inner.state = match &outcome {
                    Ok(dataset) => LoadState::Ready(dataset.clone()),
                    Err(_) => LoadState::Empty,
                };
            } else {
                warn!(generation, "Discarding dataset load superseded by a reset");
            }

            outcome
        }
        .boxed()
        .shared()
    }
}

async fn fetch_validated(source: &dyn SpotDataSource) -> Result<SpotDataset, SourceError> {
    let dataset = source.fetch_dataset().await?;
    dataset.validate().map_err(SourceError::Invalid)?;
    Ok(dataset)
}
