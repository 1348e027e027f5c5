//! Tag endpoints: CRUD, per-type listing and facets.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use axum::{Json, Router};
use hikaze_core::{FacetQuery, Tag, TagCount};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_body, parse_id, QueryPairs};
use crate::error::ApiError;
use crate::server::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/by-type", get(tags_by_type))
        .route("/tags/facets", get(facets))
        .route("/tags/:id", patch(update_tag).delete(delete_tag))
}

#[derive(Debug, Default, Deserialize)]
struct TagRequest {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    color: Option<String>,
}

async fn list_tags(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(state.api.list_tags().await?))
}

async fn create_tag(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Json<Tag>, ApiError> {
    let request: TagRequest = parse_body(&body)?;
    let name = request
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("name required"))?;
    Ok(Json(state.api.create_tag(name, request.color).await?))
}

async fn update_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Tag>, ApiError> {
    let id = parse_id(&id)?;
    let request: TagRequest = parse_body(&body)?;
    Ok(Json(
        state
            .api
            .update_tag(id, request.name, request.color)
            .await?,
    ))
}

async fn delete_tag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.api.delete_tag(parse_id(&id)?).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn tags_by_type(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let q = QueryPairs::new(pairs);
    let model_type = q.get("type").unwrap_or_default().to_string();
    Ok(Json(state.api.tags_by_type(model_type).await?))
}

async fn facets(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<TagCount>>, ApiError> {
    let q = QueryPairs::new(pairs);
    let query = FacetQuery {
        model_type: q.get("type").map(str::to_string),
        text: q.get("q").map(str::to_string),
        selected: q.list("selected"),
        mode: q.parse("mode")?.unwrap_or_default(),
    };
    Ok(Json(state.api.tag_facets(query).await?))
}
