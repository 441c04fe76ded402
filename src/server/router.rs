use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use super::workspace::workspace_router;
use crate::store::Store;
use crate::workspace::Workspace;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub workspace: Workspace,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            workspace: Workspace::new(Arc::clone(&store)),
            store,
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", workspace_router())
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}
