//! Background job endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/quick-tag", post(start_quick_tag))
        .route("/jobs/:id", get(get_job).delete(cancel_job))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "jobs": state.api.list_jobs() }))
}

async fn start_quick_tag(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let job = state.api.start_quick_tag()?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "job": job }))))
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let job = state.api.job(&id)?;
    Ok(Json(json!({ "job": job })))
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.api.cancel_job(&id)?;
    Ok(Json(json!({ "canceled": id })))
}
