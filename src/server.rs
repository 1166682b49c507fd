//! Trigger/status HTTP server.
//!
//! A deliberately small surface for schedulers and operators:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/pass` | Start an indexing pass in the background |
//! | `GET`  | `/status` | Running/last-run pass statistics |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! `POST /pass` answers `202 Accepted` when a pass was started and
//! `409 Conflict` when one is already running; requests are never
//! queued. The pass itself runs on a spawned task, so the response
//! returns immediately and progress is observed via `GET /status`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the status
//! endpoint can back browser dashboards.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::indexer::Indexer;
use crate::models::PassReport;

#[derive(Clone)]
struct AppState {
    indexer: Arc<Indexer>,
}

/// Serve until the process is terminated. Ctrl-C requests a graceful
/// stop of any in-flight pass before shutting the listener down.
pub async fn run_server(bind: &str, indexer: Arc<Indexer>) -> anyhow::Result<()> {
    let state = AppState {
        indexer: Arc::clone(&indexer),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/pass", post(handle_pass))
        .route("/status", get(handle_status))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    println!("Plenum server listening on http://{}", bind);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            indexer.request_stop();
        })
        .await?;

    Ok(())
}

// ============ POST /pass ============

#[derive(Serialize)]
struct PassResponse {
    status: &'static str,
}

/// Start a pass in the background; `409` if one is already running.
async fn handle_pass(State(state): State<AppState>) -> Response {
    match state.indexer.start_background() {
        Ok(()) => {
            (StatusCode::ACCEPTED, Json(PassResponse { status: "accepted" })).into_response()
        }
        Err(err) => {
            error!(%err, "pass trigger rejected");
            (
                StatusCode::CONFLICT,
                Json(PassResponse {
                    status: "already_running",
                }),
            )
                .into_response()
        }
    }
}

// ============ GET /status ============

async fn handle_status(State(state): State<AppState>) -> Json<PassReport> {
    Json(state.indexer.report())
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
