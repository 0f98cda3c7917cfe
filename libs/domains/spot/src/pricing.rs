use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use observability::{OperationTimer, SpotAdvisorMetrics};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{SpotError, SpotResult};
use crate::lock_state;
use crate::models::{OperatingSystem, PricingTable};
use crate::source::{PricingSource, SourceError};

/// Cache key for one pricing fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PricingKey {
    pub region: String,
    pub os: OperatingSystem,
}

impl PricingKey {
    pub fn new(region: impl Into<String>, os: OperatingSystem) -> Self {
        Self {
            region: region.into(),
            os,
        }
    }
}

/// Settled answer for a (region, OS) key
#[derive(Debug, Clone, PartialEq)]
pub enum PricingLookup {
    Available(Arc<PricingTable>),
    /// The endpoint explicitly has nothing published for the key
    Unavailable,
}

impl PricingLookup {
    pub fn table(&self) -> Option<&PricingTable> {
        match self {
            PricingLookup::Available(table) => Some(table),
            PricingLookup::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, PricingLookup::Available(_))
    }
}

type SharedFetch = Shared<BoxFuture<'static, SpotResult<PricingLookup>>>;

enum Slot {
    InFlight { id: u64, fetch: SharedFetch },
    Settled(PricingLookup),
}

struct Inner {
    slots: HashMap<PricingKey, Slot>,
    next_id: u64,
}

/// On-demand pricing tables memoized per (region, OS).
///
/// Both positive tables and explicit "no data" answers are kept for the
/// process lifetime. Failed fetches are not cached, so the next call retries.
#[derive(Clone)]
pub struct PricingCache {
    source: Arc<dyn PricingSource>,
    inner: Arc<Mutex<Inner>>,
}

impl PricingCache {
    pub fn new(source: Arc<dyn PricingSource>) -> Self {
        Self {
            source,
            inner: Arc::new(Mutex::new(Inner {
                slots: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Return the settled result for the key, fetching it if needed.
    ///
    /// Callers asking for a key that is already being fetched await the same
    /// fetch.
    pub async fn get_or_fetch(&self, region: &str, os: OperatingSystem) -> SpotResult<PricingLookup> {
        let key = PricingKey::new(region, os);

        let fetch = {
            let mut inner = lock_state(&self.inner);
            match inner.slots.get(&key) {
                Some(Slot::Settled(lookup)) => {
                    SpotAdvisorMetrics::record_pricing_cache_hit(os.as_str());
                    return Ok(lookup.clone());
                }
                Some(Slot::InFlight { fetch, .. }) => {
                    SpotAdvisorMetrics::record_pricing_fetch_joined(os.as_str());
                    fetch.clone()
                }
                None => {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    let fetch = self.start_fetch(key.clone(), id);
                    inner.slots.insert(
                        key,
                        Slot::InFlight {
                            id,
                            fetch: fetch.clone(),
                        },
                    );
                    fetch
                }
            }
        };

        fetch.await
    }

    /// Settled result for the key, without I/O
    pub fn peek(&self, region: &str, os: OperatingSystem) -> Option<PricingLookup> {
        let inner = lock_state(&self.inner);
        match inner.slots.get(&PricingKey::new(region, os)) {
            Some(Slot::Settled(lookup)) => Some(lookup.clone()),
            _ => None,
        }
    }

    /// Number of keys with a settled result
    pub fn settled_count(&self) -> usize {
        lock_state(&self.inner)
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Settled(_)))
            .count()
    }

    /// Drop every cached and in-flight result
    ///
    /// Fetches already running still answer their callers but are not stored.
    pub fn reset(&self) {
        let mut inner = lock_state(&self.inner);
        let dropped = inner.slots.len();
        inner.slots.clear();
        info!(dropped, "Pricing cache reset");
    }

    fn start_fetch(&self, key: PricingKey, id: u64) -> SharedFetch {
        let source = self.source.clone();
        let inner = self.inner.clone();

        async move {
            let timer = OperationTimer::start();
            let outcome = match source.fetch_pricing(&key.region, key.os).await {
                Ok(response) => {
                    let table = PricingTable::from_response(&key.region, key.os, &response);
                    debug!(
                        region = %key.region,
                        os = %key.os,
                        entries = table.entries.len(),
                        "Pricing table cached"
                    );
                    Ok(PricingLookup::Available(Arc::new(table)))
                }
                Err(SourceError::NoData) => {
                    info!(region = %key.region, os = %key.os, "No pricing published for region");
                    Ok(PricingLookup::Unavailable)
                }
                Err(e) => {
                    warn!(region = %key.region, os = %key.os, error = %e, "Pricing fetch failed");
                    Err(SpotError::PricingFetch {
                        region: key.region.clone(),
                        os: key.os,
                        message: e.to_string(),
                    })
                }
            };

            let label = match &outcome {
                Ok(PricingLookup::Available(_)) => "available",
                Ok(PricingLookup::Unavailable) => "unavailable",
                Err(_) => "failed",
            };
            SpotAdvisorMetrics::record_pricing_fetch(key.os.as_str(), label, timer.elapsed());

            let mut inner = lock_state(&inner);
            let current = matches!(
                inner.slots.get(&key),
                Some(Slot::InFlight { id: slot_id, .. }) if *slot_id == id
            );
            if current {
                match &outcome {
                    Ok(lookup) => {
                        inner.slots.insert(key, Slot::Settled(lookup.clone()));
                    }
                    Err(_) => {
                        inner.slots.remove(&key);
                    }
                }
            }

            outcome
        }
        .boxed()
        .shared()
    }
}
