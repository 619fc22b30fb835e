mod organizations;
mod users;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub fn admin_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/organizations", post(organizations::create_organization))
        .route("/users", post(users::create_user))
}
