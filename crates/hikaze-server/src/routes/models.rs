//! Model catalog endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use hikaze_core::{ModelDetail, ModelDetailPage, ModelQuery, ModelRef, TypeCount};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_body, parse_id, QueryPairs};
use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/types", get(types_with_counts))
        .route("/models", get(list_models))
        .route("/models/refresh", post(refresh))
        .route("/models/:id", get(get_model).delete(delete_model))
        .route("/models/:id/tags", post(set_tags).patch(set_tags))
        .route("/models/:id/extra", get(get_extra).patch(update_extra))
        .route("/models/:id/params", get(get_params))
}

fn model_query(q: &QueryPairs) -> Result<ModelQuery, ApiError> {
    let defaults = ModelQuery::default();
    Ok(ModelQuery {
        text: q.get("q").map(str::to_string),
        model_type: q.get("type").map(str::to_string),
        tags: q.list("tags"),
        tag_mode: q.parse("tags_mode")?.unwrap_or(defaults.tag_mode),
        limit: q.parse("limit")?.unwrap_or(defaults.limit),
        offset: q.parse("offset")?.unwrap_or(defaults.offset),
        sort: q.parse("sort")?.unwrap_or(defaults.sort),
        order: q.parse("order")?.unwrap_or(defaults.order),
    })
}

async fn types_with_counts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TypeCount>>, ApiError> {
    Ok(Json(state.api.types_with_counts().await?))
}

async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<ModelDetailPage>, ApiError> {
    let query = model_query(&QueryPairs::new(pairs))?;
    Ok(Json(state.api.list_models(query).await?))
}

async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ModelDetail>, ApiError> {
    Ok(Json(state.api.get_model(parse_id(&id)?).await?))
}

async fn delete_model(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.api.delete_model(parse_id(&id)?).await?;
    Ok(Json(json!({
        "deleted": true,
        "note": "Model record removed from database, file unchanged",
    })))
}

#[derive(Debug, Default, Deserialize)]
struct TagsRequest {
    #[serde(default)]
    add: Vec<String>,
    #[serde(default)]
    remove: Vec<String>,
}

async fn set_tags(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let request: TagsRequest = parse_body(&body)?;
    let tags = state
        .api
        .set_model_tags(id, request.add, request.remove)
        .await?;
    Ok(Json(json!({ "id": id, "tags": tags })))
}

async fn get_extra(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.api.model_extra(parse_id(&id)?).await?))
}

async fn update_extra(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let id = parse_id(&id)?;
    let patch = parse_body::<Option<Value>>(&body)?.unwrap_or_else(|| Value::Object(Map::new()));
    Ok(Json(state.api.update_extra(id, patch).await?))
}

async fn get_params(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    Ok(Json(state.api.model_params(parse_id(&id)?).await?))
}

#[derive(Debug, Default, Deserialize)]
struct RefreshRequest {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    compute_hash: bool,
}

async fn refresh(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Value>, ApiError> {
    let request: RefreshRequest = parse_body(&body)?;
    let target = match (request.path, request.id) {
        (Some(path), _) if !path.as_os_str().is_empty() => ModelRef::Path(path),
        (_, Some(id)) => ModelRef::Id(id),
        _ => return Err(ApiError::bad_request("id or path required")),
    };
    let refreshed = state.api.refresh_model(target, request.compute_hash).await?;
    Ok(Json(json!({ "refreshed": refreshed })))
}
