use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::views::RegimeSnapshot;

/// Workflow state owned by the analysis controller. Exactly one variant
/// holds at a time.
#[derive(Debug, Clone, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    LoadingFetch,
    LoadingAnalyze,
    Error { message: String },
    Ready { snapshot: Arc<RegimeSnapshot> },
}

impl WorkflowState {
    pub fn status(&self) -> WorkflowStatus {
        match self {
            WorkflowState::Idle => WorkflowStatus::Idle,
            WorkflowState::LoadingFetch => WorkflowStatus::LoadingFetch,
            WorkflowState::LoadingAnalyze => WorkflowStatus::LoadingAnalyze,
            WorkflowState::Error { .. } => WorkflowStatus::Error,
            WorkflowState::Ready { .. } => WorkflowStatus::Ready,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            WorkflowState::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<RegimeSnapshot>> {
        match self {
            WorkflowState::Ready { snapshot } => Some(snapshot),
            _ => None,
        }
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            status: self.status(),
            message: self.error_message().map(str::to_string),
            version: self.snapshot().map(|s| s.version()),
            panel: Panel::from_state(self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkflowStatus {
    Idle,
    LoadingFetch,
    LoadingAnalyze,
    Error,
    Ready,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Idle => write!(f, "idle"),
            WorkflowStatus::LoadingFetch => write!(f, "loadingFetch"),
            WorkflowStatus::LoadingAnalyze => write!(f, "loadingAnalyze"),
            WorkflowStatus::Error => write!(f, "error"),
            WorkflowStatus::Ready => write!(f, "ready"),
        }
    }
}

/// The one dashboard area shown for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Panel {
    Spinner,
    ErrorBanner,
    Populated,
    EmptyPrompt,
}

impl Panel {
    pub fn from_state(state: &WorkflowState) -> Self {
        match state.status() {
            WorkflowStatus::LoadingFetch | WorkflowStatus::LoadingAnalyze => Panel::Spinner,
            WorkflowStatus::Error => Panel::ErrorBanner,
            WorkflowStatus::Ready => Panel::Populated,
            WorkflowStatus::Idle => Panel::EmptyPrompt,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSummary {
    pub status: WorkflowStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub panel: Panel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ControllerEvent {
    StatusChange { state: StateSummary },
    DatasetsUpdated { datasets: Vec<String> },
    SelectionChanged { selected: Option<String> },
}
