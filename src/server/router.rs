use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{Router, routing::get};

use super::admin::admin_router;
use super::context::RequestId;
use super::live::live_router;
use super::user::user_router;
use crate::auth::TokenHasher;
use crate::store::Store;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub hasher: TokenHasher,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            hasher: TokenHasher::new(),
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(mut request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = RequestId::new();
    request.extensions_mut().insert(request_id.clone());
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        %request_id,
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api = user_router()
        .merge(live_router())
        .nest("/admin", admin_router());

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
