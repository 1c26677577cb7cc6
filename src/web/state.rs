use serde::Serialize;
use std::sync::Arc;

use crate::config::Settings;
use crate::engine::{AnalysisController, StateSummary};

/// Combined application state for the web server
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<AnalysisController>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(controller: Arc<AnalysisController>, settings: Settings) -> Self {
        Self {
            controller,
            settings: Arc::new(settings),
        }
    }

    pub async fn state_response(&self) -> StateResponse {
        StateResponse {
            state: self.controller.summary().await,
            datasets: self.controller.datasets().await,
            selected: self.controller.selected().await,
            busy: self.controller.is_busy(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub state: StateSummary,
    pub datasets: Vec<String>,
    pub selected: Option<String>,
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<String>,
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormDefaults {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
}

impl From<&Settings> for FormDefaults {
    fn from(settings: &Settings) -> Self {
        Self {
            ticker: settings.dashboard.default_ticker.clone(),
            start_date: settings.dashboard.default_start.clone(),
            end_date: settings.dashboard.default_end.clone(),
        }
    }
}
