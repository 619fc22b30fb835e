//! Public read endpoints serving published content.

mod handlers;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub fn live_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{kind}/lives", post(handlers::list_lives))
        .route("/{kind}/live-infos", post(handlers::live_infos))
}
