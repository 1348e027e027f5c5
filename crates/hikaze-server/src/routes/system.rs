//! Health, version, settings and model-root endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use hikaze_core::{HealthReport, RootsUpdate, SettingsUpdate, VersionInfo};
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_body;
use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/settings", get(get_settings).put(update_settings))
        .route("/settings/roots", get(get_roots).put(set_roots))
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthReport> {
    Json(state.api.health().await)
}

async fn version(State(state): State<Arc<AppState>>) -> Json<VersionInfo> {
    Json(state.api.version())
}

async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let settings = state.api.settings().await?;
    Ok(Json(json!({ "settings": settings })))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let update: SettingsUpdate = parse_body(&body)?;
    let settings = state.api.update_settings(update).await?;
    Ok(Json(json!({ "settings": settings })))
}

#[derive(Debug, Default, Deserialize)]
struct RootsRequest {
    #[serde(default)]
    roots: Option<Vec<PathBuf>>,
}

async fn get_roots(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "roots": state.api.model_roots() }))
}

async fn set_roots(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RootsUpdate>, ApiError> {
    let request: RootsRequest = parse_body(&body)?;
    let roots = request
        .roots
        .ok_or_else(|| ApiError::bad_request("roots required"))?;
    Ok(Json(state.api.set_model_roots(roots).await?))
}
