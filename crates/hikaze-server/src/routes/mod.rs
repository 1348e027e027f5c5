//! HTTP routes, split by domain.
//!
//! Each submodule exposes a `router()` that the server merges. Request
//! bodies are read as raw bytes: an empty body means "no parameters", which
//! the UI relies on for POSTs like `/scan/start`.

mod jobs;
mod models;
mod scan;
mod system;
mod tags;

use crate::error::ApiError;
use crate::server::AppState;
use axum::body::Bytes;
use axum::Router;
use serde::de::DeserializeOwned;
use std::sync::Arc;

pub(crate) fn router() -> Router<Arc<AppState>> {
    Router::new()
        .merge(system::router())
        .merge(scan::router())
        .merge(models::router())
        .merge(tags::router())
        .merge(jobs::router())
}

/// Decode a JSON body; an empty body yields `T::default()`.
pub(crate) fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))
}

/// Numeric path id. Anything else names no resource.
pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found("not found"))
}

/// Query string as ordered pairs, so repeated keys survive.
pub(crate) struct QueryPairs(Vec<(String, String)>);

impl QueryPairs {
    pub(crate) fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    /// First non-blank value for `key`.
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .find(|v| !v.is_empty())
    }

    /// Every value for `key`, with comma-separated values split apart.
    pub(crate) fn list(&self, key: &str) -> Vec<String> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub(crate) fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ApiError> {
        self.get(key)
            .map(|v| {
                v.parse::<T>()
                    .map_err(|_| ApiError::bad_request(format!("invalid value for {key}: {v}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn pairs(raw: &[(&str, &str)]) -> QueryPairs {
        QueryPairs::new(
            raw.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_query_list_merges_repeats_and_commas() {
        let q = pairs(&[("tags", "a,b"), ("q", "x"), ("tags", " c ,"), ("tags", "")]);
        assert_eq!(q.list("tags"), vec!["a", "b", "c"]);
        assert_eq!(q.get("q"), Some("x"));
        assert_eq!(q.get("missing"), None);
    }

    #[test]
    fn test_query_parse_rejects_garbage() {
        let q = pairs(&[("limit", "ten")]);
        assert!(q.parse::<u32>("limit").is_err());
        assert_eq!(pairs(&[("limit", "10")]).parse::<u32>("limit").unwrap(), Some(10));
    }

    #[test]
    fn test_parse_body_empty_is_default() {
        let value: Option<Value> = parse_body(&Bytes::new()).unwrap();
        assert!(value.is_none());
        assert!(parse_body::<Option<Value>>(&Bytes::from_static(b"{oops")).is_err());
    }
}
