use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use folio::config::CorsConfig;
use folio::server::{AppState, cors_layer, create_router};
use folio::store::{SqliteStore, Store};
use serde_json::Value;
use tower::ServiceExt;

pub const ORG: &str = "org-1";
pub const OTHER_ORG: &str = "org-2";
pub const USER: &str = "user-1";

/// In-process router over a private in-memory database.
pub struct TestApp {
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = SqliteStore::open_in_memory().expect("open store");
        store.initialize().expect("initialize schema");

        let state = Arc::new(AppState::new(Arc::new(store)));
        Self {
            router: create_router(
                state,
                cors_layer(&CorsConfig::default()).expect("default cors"),
            ),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).to_string())
            })
        };
        (status, body)
    }

    /// Sends a request as `USER` within `org`.
    pub async fn call(
        &self,
        org: &str,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-organization-id", org)
            .header("x-user-id", USER);
        self.send(with_body(builder, body)).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(ORG, Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(ORG, Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(ORG, Method::PATCH, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(ORG, Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(ORG, Method::DELETE, uri, None).await
    }
}

pub fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub fn id(body: &Value) -> String {
    body["data"]["id"].as_str().expect("id in response").to_string()
}
