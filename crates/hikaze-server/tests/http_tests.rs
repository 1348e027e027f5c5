//! Integration tests for the hikaze-server REST routes.
//!
//! Requests go straight through the router with `oneshot`, so no port is
//! bound. Each test gets its own data root and model tree.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use hikaze_core::{AppConfig, HikazeApi};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestServer {
    _temp: TempDir,
    models_root: PathBuf,
    api: HikazeApi,
}

impl TestServer {
    async fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let models_root = temp.path().join("models");
        std::fs::create_dir_all(models_root.join("lora")).unwrap();
        std::fs::write(models_root.join("lora").join("a.safetensors"), vec![1u8; 64]).unwrap();

        let api = HikazeApi::builder(temp.path().join("data"))
            .config(AppConfig {
                model_roots: vec![models_root.clone()],
                ..AppConfig::default()
            })
            .build()
            .await
            .unwrap();

        Self {
            _temp: temp,
            models_root,
            api,
        }
    }

    fn app(&self) -> Router {
        hikaze_server::router(self.api.clone())
    }

    async fn scanned() -> Self {
        let server = Self::new().await;
        assert!(server.api.start_scan(None, false));
        server.api.wait_for_scan().await;
        server
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or_default()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_and_version() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db"]["ready"], true);
    assert_eq!(body["scanning"]["running"], false);

    let (status, body) = server.get("/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_route_is_json_404() {
    let server = TestServer::new().await;
    let (status, body) = server.get("/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, _) = server.get("/models/abc").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_start_and_list() {
    let server = TestServer::new().await;

    let (status, body) = server.send(Method::POST, "/scan/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["started"], true);
    server.api.wait_for_scan().await;

    let (_, status_body) = server.get("/scan/status").await;
    assert_eq!(status_body["running"], false);
    assert_eq!(status_body["stats"]["added"], 1);

    let (status, body) = server.get("/models?type=lora&tags=lora&sort=name&order=asc").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["type"], "lora");
    assert_eq!(body["items"][0]["tags"], json!(["lora"]));

    let (status, body) = server.get("/models?sort=bogus").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (_, body) = server.get("/types").await;
    assert_eq!(body, json!([{"name": "lora", "count": 1}]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_model_tags_and_status_codes() {
    let server = TestServer::scanned().await;
    let (_, list) = server.get("/models").await;
    let id = list["items"][0]["id"].as_i64().unwrap();

    let (status, body) = server
        .send(
            Method::PATCH,
            &format!("/models/{id}/tags"),
            Some(json!({"add": ["Portrait"]})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["lora", "portrait"]));

    let (status, body) = server
        .send(
            Method::POST,
            &format!("/models/{id}/tags"),
            Some(json!({"remove": ["lora"]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let (status, body) = server.get("/models/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");

    let (status, body) = server
        .send(Method::PATCH, &format!("/models/{id}/tags"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tags"], json!(["lora", "portrait"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_extra_params_and_delete() {
    let server = TestServer::scanned().await;
    let (_, list) = server.get("/models").await;
    let id = list["items"][0]["id"].as_i64().unwrap();

    let (status, body) = server
        .send(
            Method::PATCH,
            &format!("/models/{id}/extra"),
            Some(json!({"params": {"steps": 25}, "prompts": {"negative": "blurry"}})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["params"]["steps"], 25);

    let (_, params) = server.get(&format!("/models/{id}/params")).await;
    assert_eq!(params, json!({"steps": 25, "negative": "blurry"}));

    let (status, body) = server
        .send(Method::DELETE, &format!("/models/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    assert!(server.models_root.join("lora").join("a.safetensors").exists());

    let (status, _) = server.get(&format!("/models/{id}/extra")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refresh_requires_target() {
    let server = TestServer::new().await;
    let (status, body) = server
        .send(Method::POST, "/models/refresh", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");

    let path = server.models_root.join("lora").join("a.safetensors");
    let (status, body) = server
        .send(
            Method::POST,
            "/models/refresh",
            Some(json!({"path": path, "compute_hash": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["refreshed"], true);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tag_crud_and_protection() {
    let server = TestServer::scanned().await;

    let (status, body) = server
        .send(Method::POST, "/tags", Some(json!({"name": " Sci-Fi ", "color": "#00f"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "sci-fi");
    let tag_id = body["id"].as_i64().unwrap();

    let (status, _) = server.send(Method::POST, "/tags", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .send(Method::PATCH, &format!("/tags/{tag_id}"), Some(json!({"name": "scifi"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "scifi");

    let (_, tags) = server.get("/tags").await;
    let lora_id = tags
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "lora")
        .and_then(|t| t["id"].as_i64())
        .unwrap();
    let (status, _) = server
        .send(Method::DELETE, &format!("/tags/{lora_id}"), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .send(Method::DELETE, &format!("/tags/{tag_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = server
        .send(Method::DELETE, &format!("/tags/{tag_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_facets_and_by_type() {
    let server = TestServer::scanned().await;

    let (status, body) = server.get("/tags/facets?type=lora&selected=lora&mode=any").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "lora");
    assert_eq!(body[0]["count"], 1);

    let (status, body) = server.get("/tags/by-type?type=lora").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_quick_tag_job_lifecycle() {
    let server = TestServer::scanned().await;

    let (status, body) = server.send(Method::POST, "/jobs/quick-tag", None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let job_id = body["job"]["id"].as_str().unwrap().to_string();
    server.api.wait_for_quick_tag().await;

    let (status, body) = server.get(&format!("/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["job"]["status"], "success");
    assert_eq!(body["job"]["kind"], "quick_tag");

    let (status, body) = server
        .send(Method::DELETE, &format!("/jobs/{job_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["canceled"], job_id);

    let (status, body) = server.get(&format!("/jobs/{job_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NOT_FOUND");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_settings_and_roots() {
    let server = TestServer::new().await;

    let (_, body) = server.get("/settings").await;
    assert_eq!(body["settings"]["language"], "zh-CN");

    let (status, body) = server
        .send(Method::PUT, "/settings", Some(json!({"language": "en-US"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settings"]["language"], "en-US");

    let (status, _) = server
        .send(Method::PUT, "/settings/roots", Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let lora_root = server.models_root.join("lora");
    let (status, body) = server
        .send(Method::PUT, "/settings/roots", Some(json!({"roots": [lora_root]})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["migrated"], 0);

    let (_, body) = server.get("/settings/roots").await;
    assert_eq!(body["roots"].as_array().unwrap().len(), 1);
}
