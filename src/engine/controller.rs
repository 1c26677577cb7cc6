use chrono::NaiveDate;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::state::{ControllerEvent, StateSummary, WorkflowState};
use crate::api::RegimeService;
use crate::error::{DashboardError, DashboardResult};
use crate::views::RegimeSnapshot;

pub const FETCH_FALLBACK_MESSAGE: &str = "Error fetching data";
pub const ANALYZE_FALLBACK_MESSAGE: &str = "Analysis failed";

#[derive(Debug, Default)]
struct ControllerData {
    state: WorkflowState,
    datasets: Vec<String>,
    selected: Option<String>,
}

const NO_WORKFLOW: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum Workflow {
    Fetch = 1,
    Analyze = 2,
}

impl Workflow {
    fn as_str(self) -> &'static str {
        match self {
            Workflow::Fetch => "fetch",
            Workflow::Analyze => "analyze",
        }
    }

    fn from_slot(slot: u8) -> Option<Self> {
        match slot {
            1 => Some(Workflow::Fetch),
            2 => Some(Workflow::Analyze),
            _ => None,
        }
    }
}

/// Drives the fetch → select → analyze workflow against the analysis service.
///
/// At most one of `run_fetch`/`run_analyze` is in flight; an overlapping call
/// is rejected with `DashboardError::Busy` naming the workflow that holds the
/// token. After `shutdown` any completion still arriving is dropped.
pub struct AnalysisController {
    service: Arc<dyn RegimeService>,
    data: RwLock<ControllerData>,
    in_flight: Arc<AtomicU8>,
    torn_down: AtomicBool,
    last_version: AtomicU64,
    event_tx: broadcast::Sender<ControllerEvent>,
}

/// The single-flight token, taken before a workflow call is dispatched.
/// Dropping it releases the token, however the call ends.
pub struct WorkflowClaim {
    slot: Arc<AtomicU8>,
    workflow: Workflow,
}

impl Drop for WorkflowClaim {
    fn drop(&mut self) {
        self.slot.store(NO_WORKFLOW, Ordering::Release);
    }
}

impl AnalysisController {
    pub fn new(service: Arc<dyn RegimeService>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            service,
            data: RwLock::new(ControllerData::default()),
            in_flight: Arc::new(AtomicU8::new(NO_WORKFLOW)),
            torn_down: AtomicBool::new(false),
            last_version: AtomicU64::new(0),
            event_tx,
        }
    }

    /// Replaces the dataset list. Failures are logged and leave the previous
    /// list and the workflow state untouched.
    pub async fn refresh_dataset_list(&self) {
        if self.is_torn_down() {
            return;
        }

        let files = match self.service.list_datasets().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not refresh dataset list: {}", e);
                return;
            }
        };

        if self.is_torn_down() {
            debug!("Dropping dataset list received after shutdown");
            return;
        }

        let mut data = self.data.write().await;
        info!("Dataset list refreshed: {} files", files.len());
        data.datasets = files.clone();
        let _ = self.event_tx.send(ControllerEvent::DatasetsUpdated { datasets: files });

        if data.selected.is_none() {
            if let Some(first) = data.datasets.first().cloned() {
                data.selected = Some(first.clone());
                let _ = self.event_tx.send(ControllerEvent::SelectionChanged { selected: Some(first) });
            }
        }
    }

    /// Downloads market data into a new dataset and selects it.
    pub async fn run_fetch(&self, ticker: &str, start_date: NaiveDate, end_date: NaiveDate) -> DashboardResult<()> {
        let claim = self.claim_fetch()?;
        self.fetch_claimed(claim, ticker, start_date, end_date).await;
        Ok(())
    }

    /// Takes the token for a fetch without starting it, so a dispatcher can
    /// answer Busy before handing the call to a background task.
    pub fn claim_fetch(&self) -> DashboardResult<WorkflowClaim> {
        self.claim(Workflow::Fetch)
    }

    pub async fn fetch_claimed(
        &self,
        claim: WorkflowClaim,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) {
        debug_assert_eq!(claim.workflow, Workflow::Fetch);
        let ticker = ticker.trim().to_uppercase();

        self.transition(WorkflowState::LoadingFetch).await;
        let outcome = self.service.fetch_market_data(&ticker, start_date, end_date).await;

        if self.is_torn_down() {
            debug!("Dropping fetch completion for {} after shutdown", ticker);
            return;
        }

        match outcome {
            Ok(resp) => {
                self.refresh_dataset_list().await;
                self.select_dataset(resp.filename.clone()).await;
                info!("Fetched {} into {}", ticker, resp.filename);
                self.transition(WorkflowState::Idle).await;
            }
            Err(e) => {
                warn!("Fetch for {} failed: {}", ticker, e);
                self.transition(WorkflowState::Error {
                    message: e.user_message(FETCH_FALLBACK_MESSAGE),
                })
                .await;
            }
        }
    }

    /// Runs the regime analysis on `filename`. An empty filename is a no-op.
    pub async fn run_analyze(&self, filename: &str) -> DashboardResult<()> {
        if filename.trim().is_empty() {
            debug!("Analyze requested without a dataset, ignoring");
            return Ok(());
        }

        let claim = self.claim_analyze()?;
        self.analyze_claimed(claim, filename).await;
        Ok(())
    }

    pub fn claim_analyze(&self) -> DashboardResult<WorkflowClaim> {
        self.claim(Workflow::Analyze)
    }

    pub async fn analyze_claimed(&self, claim: WorkflowClaim, filename: &str) {
        debug_assert_eq!(claim.workflow, Workflow::Analyze);
        if filename.trim().is_empty() {
            debug!("Analyze requested without a dataset, ignoring");
            return;
        }

        self.transition(WorkflowState::LoadingAnalyze).await;
        let outcome = self.service.analyze(filename).await;

        if self.is_torn_down() {
            debug!("Dropping analysis of {} after shutdown", filename);
            return;
        }

        match outcome {
            Ok(result) => {
                let version = self.last_version.fetch_add(1, Ordering::AcqRel) + 1;
                info!(
                    "Analysis of {} ready (v{}): current regime {}",
                    filename, version, result.current_regime
                );
                let snapshot = Arc::new(RegimeSnapshot::new(version, result));
                self.transition(WorkflowState::Ready { snapshot }).await;
            }
            Err(e) => {
                warn!("Analysis of {} failed: {}", filename, e);
                self.transition(WorkflowState::Error {
                    message: e.user_message(ANALYZE_FALLBACK_MESSAGE),
                })
                .await;
            }
        }
    }

    pub async fn select_dataset(&self, filename: impl Into<String>) {
        if self.is_torn_down() {
            return;
        }
        let filename = filename.into();
        let selected = if filename.trim().is_empty() { None } else { Some(filename) };

        let mut data = self.data.write().await;
        if data.selected != selected {
            debug!("Dataset selection: {:?}", selected);
            data.selected = selected.clone();
            let _ = self.event_tx.send(ControllerEvent::SelectionChanged { selected });
        }
    }

    pub async fn state(&self) -> WorkflowState {
        self.data.read().await.state.clone()
    }

    pub async fn summary(&self) -> StateSummary {
        self.data.read().await.state.summary()
    }

    pub async fn snapshot(&self) -> Option<Arc<RegimeSnapshot>> {
        self.data.read().await.state.snapshot().cloned()
    }

    pub async fn datasets(&self) -> Vec<String> {
        self.data.read().await.datasets.clone()
    }

    pub async fn selected(&self) -> Option<String> {
        self.data.read().await.selected.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire) != NO_WORKFLOW
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    /// Stops all further state updates, including completions of calls
    /// already dispatched.
    pub fn shutdown(&self) {
        if !self.torn_down.swap(true, Ordering::AcqRel) {
            info!("Analysis controller shut down");
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn claim(&self, workflow: Workflow) -> DashboardResult<WorkflowClaim> {
        match self.in_flight.compare_exchange(
            NO_WORKFLOW,
            workflow as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(WorkflowClaim {
                slot: self.in_flight.clone(),
                workflow,
            }),
            Err(holder) => {
                let holder = Workflow::from_slot(holder).map_or("workflow", Workflow::as_str);
                warn!("Rejected {}: {} already in flight", workflow.as_str(), holder);
                Err(DashboardError::Busy(holder))
            }
        }
    }

    async fn transition(&self, next: WorkflowState) {
        if self.is_torn_down() {
            return;
        }

        let mut data = self.data.write().await;
        let from = data.state.status();
        data.state = next;
        let summary = data.state.summary();
        info!("Workflow {} -> {}", from, summary.status);
        let _ = self.event_tx.send(ControllerEvent::StatusChange { state: summary });
    }
}
