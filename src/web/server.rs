use axum::{
    response::Html,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dashboard page
        .route("/", get(serve_dashboard))
        // State endpoints
        .route("/api/health", get(api::health_check))
        .route("/api/state", get(api::get_state))
        .route("/api/defaults", get(api::get_defaults))
        .route("/api/datasets", get(api::get_datasets))
        .route("/api/datasets/refresh", post(api::post_refresh_datasets))
        .route("/api/datasets/select", post(api::post_select_dataset))
        // Workflow endpoints
        .route("/api/fetch", post(api::post_fetch))
        .route("/api/analyze", post(api::post_analyze))
        // Derived views
        .route("/api/view", get(api::get_view))
        .route("/api/chart", get(api::get_chart))
        // WebSocket
        .route("/ws", get(api::websocket_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_dashboard_server(state: AppState, port: u16) -> anyhow::Result<()> {
    let controller = state.controller.clone();
    controller.refresh_dataset_list().await;

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Dashboard server starting on http://localhost:{}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            controller.shutdown();
        })
        .await?;

    Ok(())
}

async fn serve_dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

const DASHBOARD_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Regime Dashboard</title>
    <script src="https://cdn.jsdelivr.net/npm/echarts@5/dist/echarts.min.js"></script>
    <style>
        body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; background: #0f172a; color: #e2e8f0; margin: 0; }
        header { padding: 1rem 2rem; border-bottom: 1px solid #334155; }
        main { display: grid; grid-template-columns: 280px 1fr; gap: 1.5rem; padding: 1.5rem; }
        .card { background: #1e293b; border-radius: 10px; padding: 1rem; }
        label { display: block; font-size: 0.75rem; color: #94a3b8; margin-top: 0.75rem; }
        input, select, button { width: 100%; padding: 0.4rem; margin-top: 0.25rem; }
        .hidden { display: none; }
        .error { color: #ef4444; }
        #chart { height: 360px; }
        .row { display: flex; justify-content: space-between; padding: 0.25rem 0; }
    </style>
</head>
<body>
<header><h1>Regime Dashboard</h1></header>
<main>
    <section class="card">
        <label>Ticker</label><input id="ticker">
        <label>Start</label><input id="start" type="date">
        <label>End</label><input id="end" type="date">
        <button id="fetch">SYNC DATA</button>
        <label>Dataset</label><select id="dataset"></select>
        <button id="analyze">RUN MODEL</button>
    </section>
    <section>
        <div id="spinner" class="card hidden">Running...</div>
        <div id="error" class="card error hidden"></div>
        <div id="empty" class="card">Select a dataset and run the model</div>
        <div id="populated" class="hidden">
            <div class="card" id="status"></div>
            <div class="card" id="quality"></div>
            <div class="card" id="prediction"></div>
            <div class="card" id="stability"></div>
            <div class="card"><div id="chart"></div></div>
        </div>
    </section>
</main>
<script>
const $ = (id) => document.getElementById(id);
const esc = (v) => String(v).replace(/[&<>"']/g, (c) => ({ '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c]));
const chart = echarts.init($('chart'));
let shownVersion = null;

async function post(url, body) {
    const resp = await fetch(url, { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body || {}) });
    if (!resp.ok) { const e = await resp.json(); alert(e.error); }
}

function renderDatasets(datasets, selected) {
    const select = $('dataset');
    select.replaceChildren(...datasets.map(f => {
        const option = document.createElement('option');
        option.value = option.textContent = f;
        option.selected = f === selected;
        return option;
    }));
}

async function renderView() {
    const view = await (await fetch('/api/view')).json();
    $('status').innerHTML = `<b style="color:${view.status.color}">${esc(view.status.regime)}</b> ${view.status.total_days} observations, ${view.status.n_states}-state model`;
    $('quality').innerHTML = `<span style="color:${view.quality.color}">${esc(view.quality.tier)}</span> persistence ${(view.quality.persistence_score * 100).toFixed(1)}%, avg ${view.quality.avg_duration.toFixed(1)} days`;
    const p = view.prediction;
    $('prediction').innerHTML = `Next: <b style="color:${p.next_class.color}">${esc(p.next_regime)}</b> <span style="color:${p.confidence_color}">${(p.confidence * 100).toFixed(1)}%</span>`;
    $('stability').innerHTML = view.stability.map(s => `<div class="row"><span style="color:${s.color}">${esc(s.regime)}</span><span>${s.avg.toFixed(1)}d (${s.count})</span></div>`).join('');
    const resp = await fetch('/api/chart');
    if (resp.ok) { chart.setOption((await resp.json()).option, true); } else { chart.clear(); }
}

async function render(state) {
    const panels = { spinner: 'spinner', errorBanner: 'error', populated: 'populated', emptyPrompt: 'empty' };
    Object.values(panels).forEach(id => $(id).classList.add('hidden'));
    $(panels[state.panel]).classList.remove('hidden');
    $('error').textContent = state.message || '';
    $('fetch').disabled = $('analyze').disabled = state.busy || state.status.startsWith('loading');
    if (state.datasets) renderDatasets(state.datasets, state.selected);
    if (state.panel === 'populated' && state.version !== shownVersion) {
        shownVersion = state.version;
        await renderView();
    }
}

async function refresh() { await render(await (await fetch('/api/state')).json()); }

$('fetch').onclick = () => post('/api/fetch', { ticker: $('ticker').value.toUpperCase(), start_date: $('start').value, end_date: $('end').value });
$('analyze').onclick = () => post('/api/analyze', { filename: $('dataset').value });
$('dataset').onchange = () => post('/api/datasets/select', { filename: $('dataset').value });

(async () => {
    const d = await (await fetch('/api/defaults')).json();
    $('ticker').value = d.ticker; $('start').value = d.start_date; $('end').value = d.end_date;
    await refresh();
    const ws = new WebSocket(`ws://${location.host}/ws`);
    ws.onmessage = () => refresh();
})();
window.addEventListener('resize', () => chart.resize());
</script>
</body>
</html>
"##;
