use observability::SpotAdvisorMetrics;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{SpotError, SpotResult};
use crate::lock_state;
use crate::models::{AnalysisOutcome, AnalysisRequest};
use crate::orchestrator::AnalysisOrchestrator;

#[derive(Default)]
struct SessionState {
    last_ticket: u64,
    selection: Option<AnalysisRequest>,
    latest: Option<Arc<AnalysisOutcome>>,
}

/// Current selection and latest published analysis.
///
/// Every run takes a ticket when it starts. A finished run is published only
/// if it still holds the newest ticket, so a slow superseded analysis can
/// never replace the result of a later one, even when the later one failed.
pub struct AnalysisSession {
    orchestrator: AnalysisOrchestrator,
    state: Mutex<SessionState>,
}

impl AnalysisSession {
    pub fn new(orchestrator: AnalysisOrchestrator) -> Self {
        Self {
            orchestrator,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    /// Make `request` the current selection and analyze it.
    ///
    /// Returns this run's outcome even when a newer run has already published.
    pub async fn run(&self, request: AnalysisRequest) -> SpotResult<Arc<AnalysisOutcome>> {
        let ticket = self.begin(&request);
        debug!(ticket, "Analysis started");

        match self.orchestrator.run(&request).await {
            Ok(outcome) => {
                let outcome = Arc::new(outcome);
                self.publish(ticket, outcome.clone());
                Ok(outcome)
            }
            Err(err) => {
                self.retract(ticket);
                Err(err)
            }
        }
    }

    /// Re-analyze the current selection, e.g. after quantities changed
    pub async fn rerun(&self) -> SpotResult<Arc<AnalysisOutcome>> {
        let selection = lock_state(&self.state).selection.clone();
        match selection {
            Some(request) => self.run(request).await,
            None => Err(SpotError::NotFound(
                "no analysis has been requested yet".to_string(),
            )),
        }
    }

    pub fn latest(&self) -> Option<Arc<AnalysisOutcome>> {
        lock_state(&self.state).latest.clone()
    }

    pub fn selection(&self) -> Option<AnalysisRequest> {
        lock_state(&self.state).selection.clone()
    }

    /// Make `request` the current selection and hand out its ticket
    fn begin(&self, request: &AnalysisRequest) -> u64 {
        let mut state = lock_state(&self.state);
        state.last_ticket += 1;
        state.selection = Some(request.clone());
        state.last_ticket
    }

    /// Store the outcome only if no run has started since this one.
    ///
    /// A newer run that fails still supersedes older ones, so `latest` never
    /// describes a selection other than the current one.
    fn publish(&self, ticket: u64, outcome: Arc<AnalysisOutcome>) -> bool {
        let mut state = lock_state(&self.state);
        let newer = ticket == state.last_ticket;

        if newer {
            state.latest = Some(outcome);
            debug!(ticket, "Analysis published");
        } else {
            SpotAdvisorMetrics::record_stale_analysis();
            warn!(ticket, "Dropping result of superseded analysis");
        }
        newer
    }

    /// A failed run that is still the newest leaves no result behind
    fn retract(&self, ticket: u64) {
        let mut state = lock_state(&self.state);
        if ticket == state.last_ticket && state.latest.take().is_some() {
            debug!(ticket, "Cleared result of previous selection");
        }
    }
}
