//! Scan control endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hikaze_core::ScanStatus;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::parse_body;
use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scan/status", get(status))
        .route("/scan/start", post(start))
        .route("/scan/stop", post(stop))
}

#[derive(Debug, Default, Deserialize)]
struct StartRequest {
    #[serde(default)]
    paths: Option<Vec<PathBuf>>,
    #[serde(default)]
    full: bool,
}

async fn status(State(state): State<Arc<AppState>>) -> Json<ScanStatus> {
    Json(state.api.scan_status())
}

async fn start(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let request: StartRequest = parse_body(&body)?;
    let started = state.api.start_scan(request.paths, request.full);
    if started {
        info!("Scan started (full: {})", request.full);
    }
    Ok(Json(json!({ "started": started })))
}

async fn stop(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "stopped": state.api.stop_scan() }))
}
