use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};

use crate::auth::RequireAdmin;
use crate::server::AppState;
use crate::server::dto::CreateOrganizationRequest;
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::validate_name;
use crate::service::content::enqueue_organization;
use crate::store::{Transaction, UserStore};

pub async fn create_organization(
    _admin: RequireAdmin,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrganizationRequest>,
) -> impl IntoResponse {
    validate_name("Organization", &req.name)?;
    let store = state.store.as_ref();

    store
        .get_user(&req.owner_id)
        .api_err("Failed to look up owner")?
        .or_not_found("Owner not found")?;

    let mut tx = Transaction::new();
    let org = enqueue_organization(&mut tx, &req.name, &req.owner_id);
    tx.commit(store)?;

    tracing::info!(organization_id = %org.id, owner = %req.owner_id, "organization created");
    Ok::<_, ApiError>(ApiResponse::success(org))
}
