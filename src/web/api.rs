use axum::{
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use super::{AppState, DatasetsResponse, FormDefaults};
use crate::engine::ControllerEvent;
use crate::error::DashboardError;
use crate::types::parse_date;
use crate::views::{DashboardView, TimelineChart};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn busy_response(err: &DashboardError) -> Response {
    error_response(StatusCode::CONFLICT, err.to_string())
}

// === State Endpoints ===

pub async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.state_response().await)
}

pub async fn get_defaults(State(state): State<AppState>) -> impl IntoResponse {
    Json(FormDefaults::from(state.settings.as_ref()))
}

pub async fn get_datasets(State(state): State<AppState>) -> impl IntoResponse {
    Json(DatasetsResponse {
        datasets: state.controller.datasets().await,
        selected: state.controller.selected().await,
    })
}

pub async fn post_refresh_datasets(State(state): State<AppState>) -> impl IntoResponse {
    state.controller.refresh_dataset_list().await;
    get_datasets(State(state)).await
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub filename: String,
}

pub async fn post_select_dataset(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> impl IntoResponse {
    state.controller.select_dataset(req.filename).await;
    get_datasets(State(state)).await
}

// === Workflow Endpoints ===

#[derive(Debug, Deserialize)]
pub struct FetchBody {
    pub ticker: String,
    pub start_date: String,
    pub end_date: String,
}

pub async fn post_fetch(
    State(state): State<AppState>,
    Json(body): Json<FetchBody>,
) -> Response {
    let ticker = body.ticker.trim().to_uppercase();
    if ticker.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Ticker is required");
    }

    let (start, end) = match (parse_date(&body.start_date), parse_date(&body.end_date)) {
        (Ok(start), Ok(end)) => (start, end),
        _ => return error_response(StatusCode::BAD_REQUEST, "Dates must be formatted YYYY-MM-DD"),
    };
    if start > end {
        return error_response(StatusCode::BAD_REQUEST, "Start date must not be after end date");
    }

    let claim = match state.controller.claim_fetch() {
        Ok(claim) => claim,
        Err(e) => return busy_response(&e),
    };

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.fetch_claimed(claim, &ticker, start, end).await;
    });

    (StatusCode::ACCEPTED, Json(json!({"status": "accepted"}))).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeBody {
    #[serde(default)]
    pub filename: Option<String>,
}

pub async fn post_analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Response {
    let claim = match state.controller.claim_analyze() {
        Ok(claim) => claim,
        Err(e) => return busy_response(&e),
    };

    let filename = match body.filename.filter(|f| !f.trim().is_empty()) {
        Some(filename) => {
            state.controller.select_dataset(filename.clone()).await;
            filename
        }
        None => match state.controller.selected().await {
            Some(filename) => filename,
            None => return error_response(StatusCode::BAD_REQUEST, "No dataset selected"),
        },
    };

    let controller = state.controller.clone();
    tokio::spawn(async move {
        controller.analyze_claimed(claim, &filename).await;
    });

    (StatusCode::ACCEPTED, Json(json!({"status": "accepted"}))).into_response()
}

// === Derived View Endpoints ===

pub async fn get_view(State(state): State<AppState>) -> Response {
    match state.controller.snapshot().await {
        Some(snapshot) => Json(DashboardView::build(&snapshot)).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No analysis result available"),
    }
}

pub async fn get_chart(State(state): State<AppState>) -> Response {
    let Some(snapshot) = state.controller.snapshot().await else {
        return error_response(StatusCode::NOT_FOUND, "No analysis result available");
    };

    match TimelineChart::build(&snapshot.result().regime_history, snapshot.palette()) {
        Ok(chart) => Json(json!({
            "version": snapshot.version(),
            "option": chart.chart_option(),
        }))
        .into_response(),
        Err(e) => {
            warn!("Chart unavailable: {}", e);
            error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

// === WebSocket ===

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.controller.subscribe();

    info!("WebSocket client connected");

    let initial = json!({
        "type": "Initial",
        "data": state.state_response().await,
    });
    if let Ok(json_str) = serde_json::to_string(&initial) {
        let _ = sender.send(Message::Text(json_str)).await;
    }

    let send_task = tokio::spawn(async move {
        while let Some(event) = next_event(&mut rx).await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Ping(_)) => {
                debug!("Received ping");
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket client disconnected");
                break;
            }
            Err(e) => {
                error!("WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
}

/// Next event for a socket client. A lagging client skips the events it
/// missed; `None` once the controller is gone.
async fn next_event(rx: &mut broadcast::Receiver<ControllerEvent>) -> Option<ControllerEvent> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("WebSocket client lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

// === Health Check ===

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(name: &str) -> ControllerEvent {
        ControllerEvent::SelectionChanged { selected: Some(name.to_string()) }
    }

    #[tokio::test]
    async fn test_lagged_client_keeps_receiving() {
        let (tx, mut rx) = broadcast::channel(2);
        for name in ["a.csv", "b.csv", "c.csv", "d.csv"] {
            tx.send(selection(name)).unwrap();
        }

        assert_eq!(next_event(&mut rx).await, Some(selection("c.csv")));
        assert_eq!(next_event(&mut rx).await, Some(selection("d.csv")));

        tx.send(selection("e.csv")).unwrap();
        assert_eq!(next_event(&mut rx).await, Some(selection("e.csv")));

        drop(tx);
        assert_eq!(next_event(&mut rx).await, None);
    }
}
