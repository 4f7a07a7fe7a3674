//! Web map for quakemap.
//!
//! The browser page is a thin view over the orchestrator:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) pushes every published `PageView`
//! - Leaflet draws the markers exactly as the renderer styled them
//! - Date, refresh and zoom controls post commands back

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{Command, OrchestratorHandle, PageView};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Running page orchestrator
    page: OrchestratorHandle,
}

#[derive(Debug, Deserialize)]
struct DateRequest {
    date: String,
}

#[derive(Debug, Deserialize)]
struct StepRequest {
    days: i64,
}

#[derive(Debug, Deserialize)]
struct ZoomRequest {
    zoom: f64,
}

/// Create the Axum router with all routes.
pub fn create_router(page: OrchestratorHandle) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/api/view", get(view_handler))
        .route("/api/date", post(date_handler))
        .route("/api/step", post(step_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/zoom", post(zoom_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { page })
}

/// Serve the web map until `shutdown` fires.
pub async fn run_server(
    config: ServerConfig,
    page: OrchestratorHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(page);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakemap UI starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the map page.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// SSE stream of page views.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.page.subscribe()).filter_map(|view| {
        match Event::default().event("view").json_data(&view) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!("failed to encode view: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Current page view as JSON.
async fn view_handler(State(state): State<AppState>) -> Json<PageView> {
    Json(state.page.current())
}

async fn date_handler(
    State(state): State<AppState>,
    Json(request): Json<DateRequest>,
) -> StatusCode {
    dispatch(&state, Command::SelectDate(request.date)).await
}

async fn step_handler(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> StatusCode {
    dispatch(&state, Command::StepDay(request.days)).await
}

async fn refresh_handler(State(state): State<AppState>) -> StatusCode {
    tracing::info!("refresh requested via UI");
    dispatch(&state, Command::Refresh).await
}

async fn zoom_handler(
    State(state): State<AppState>,
    Json(request): Json<ZoomRequest>,
) -> StatusCode {
    dispatch(&state, Command::Zoom(request.zoom)).await
}

async fn dispatch(state: &AppState, command: Command) -> StatusCode {
    if state.page.send(command).await {
        StatusCode::ACCEPTED
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>quakemap — Terremotos por día</title>

    <!-- Leaflet -->
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --font: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            --bg: #0f0f12;
            --panel: #1c1c1f;
            --text: #fafafa;
            --muted: #a1a1aa;
            --border: #27272a;
            --accent: #818cf8;
        }

        * { margin: 0; padding: 0; box-sizing: border-box; }

        html, body { height: 100%; }

        body {
            font-family: var(--font);
            background: var(--bg);
            color: var(--text);
            display: flex;
            flex-direction: column;
        }

        .toolbar {
            display: flex;
            align-items: center;
            gap: 0.5rem;
            padding: 0.625rem 1rem;
            background: var(--panel);
            border-bottom: 1px solid var(--border);
        }

        .toolbar .title { font-weight: 600; margin-right: auto; }

        .toolbar input, .toolbar button {
            font-family: var(--font);
            font-size: 0.875rem;
            padding: 0.375rem 0.75rem;
            border-radius: 8px;
            border: 1px solid var(--border);
            background: var(--bg);
            color: var(--text);
        }

        .toolbar button { cursor: pointer; }
        .toolbar button:hover { border-color: var(--accent); }

        #map { flex: 1; }

        .status {
            display: flex;
            justify-content: space-between;
            gap: 1rem;
            padding: 0.5rem 1rem;
            font-size: 0.8125rem;
            color: var(--muted);
            background: var(--panel);
            border-top: 1px solid var(--border);
        }

        .loading::after { content: " · cargando…"; color: var(--accent); }
    </style>
</head>
<body>
    <div class="toolbar">
        <span class="title">🌍 quakemap</span>
        <button id="prev-day" title="Día anterior">◀</button>
        <input type="date" id="date-picker">
        <button id="next-day" title="Día siguiente">▶</button>
        <button id="refresh" title="Actualizar">↻ Actualizar</button>
    </div>

    <div id="map"></div>

    <div class="status">
        <span id="selected-date-label"></span>
        <span id="status-line">Cargando estado…</span>
    </div>

    <script>
        const map = L.map("map").setView([28.3, -16.6], 7);
        L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
            attribution: '&copy; <a href="https://www.openstreetmap.org/">OpenStreetMap</a> contributors'
        }).addTo(map);

        const layer = L.layerGroup().addTo(map);
        const picker = document.getElementById("date-picker");
        const label = document.getElementById("selected-date-label");
        const statusLine = document.getElementById("status-line");

        function post(path, body) {
            return fetch(path, {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify(body || {})
            }).catch(err => console.error(`POST ${path} failed:`, err));
        }

        function draw(view) {
            layer.clearLayers();
            for (const m of view.markers) {
                L.circleMarker([m.latitude, m.longitude], {
                    radius: m.radius,
                    color: m.color,
                    fillColor: m.color,
                    fillOpacity: 0.6,
                    weight: 1
                }).bindPopup(m.popup).addTo(layer);
            }
            if (document.activeElement !== picker) {
                picker.value = view.date_value;
            }
            label.textContent = `${view.date_label} · ${view.marker_count} terremotos`;
            label.classList.toggle("loading", view.loading);
            statusLine.textContent = view.status_line;
        }

        picker.addEventListener("change", e => post("/api/date", { date: e.target.value }));
        document.getElementById("prev-day").addEventListener("click", () => post("/api/step", { days: -1 }));
        document.getElementById("next-day").addEventListener("click", () => post("/api/step", { days: 1 }));
        document.getElementById("refresh").addEventListener("click", () => post("/api/refresh"));
        map.on("zoomend", () => post("/api/zoom", { zoom: map.getZoom() }));

        const source = new EventSource("/stream");
        source.addEventListener("view", e => draw(JSON.parse(e.data)));
        source.onerror = () => { statusLine.textContent = "Conexión perdida, reintentando…"; };
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::Value;

    use super::*;
    use crate::client::{QuakeClient, mock};
    use crate::config::{DayRoute, InitialDate, PipelineConfig};
    use crate::orchestrator;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    async fn view(http: &reqwest::Client, base: &str) -> Value {
        http.get(format!("{base}/api/view"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_web_map_round_trip() {
        let api = mock::spawn_api().await;
        let client = QuakeClient::new(&api, DayRoute::Query).unwrap();
        let config = PipelineConfig {
            initial_date: InitialDate::Given("2099-01-01".into()),
            ..PipelineConfig::default()
        };
        let cancel = CancellationToken::new();
        let (page, task) = orchestrator::spawn(Arc::new(client), config, cancel.clone());
        let base = serve(create_router(page)).await;
        let http = reqwest::Client::new();

        let health = http.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "OK");

        let index = http.get(format!("{base}/")).send().await.unwrap();
        assert!(index.text().await.unwrap().contains("date-picker"));

        let response = http
            .post(format!("{base}/api/date"))
            .json(&serde_json::json!({ "date": "2023-11-14" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let mut current = view(&http, &base).await;
        for _ in 0..100 {
            if current["marker_count"] == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            current = view(&http, &base).await;
        }
        assert_eq!(current["date"], "14/11/2023");
        assert_eq!(current["marker_count"], 2);
        assert!(current["markers"][0]["popup"].as_str().unwrap().contains("TENERIFE"));

        cancel.cancel();
        task.await.unwrap();

        let response = http.post(format!("{base}/api/refresh")).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
