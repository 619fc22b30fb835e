use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{RequireAdmin, create_user_with_token};
use crate::server::AppState;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::validate_name;
use crate::types::User;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub user: User,
    pub token: String,
}

pub async fn create_user(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> impl IntoResponse {
    validate_name("User", &req.name)?;

    let (user, raw) = create_user_with_token(state.store.as_ref(), &state.hasher, &req.name)?;

    Ok::<_, ApiError>(ApiResponse::success(CreateUserResponse {
        user,
        token: raw.to_string(),
    }))
}
