use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    AddAuthorizeRequest, AddAuthorizeResponse, CheckAuthorizeRequest, CheckAuthorizeResponse,
    ListAuthorizesParams,
};
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::server::validation::{validate_add_authorize, validate_check_authorize, validate_scope};
use crate::service::{self, AuthTarget, enqueue_merge, require_authorize};
use crate::store::AuthorizeStore;
use crate::types::Mask;

pub async fn add_authorize(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddAuthorizeRequest>,
) -> impl IntoResponse {
    let grant = validate_add_authorize(req)?;
    let store = state.store.as_ref();

    let target = AuthTarget::scope(grant.auth_type, &grant.type_id);
    require_authorize(store, &target, Mask::ADMIN, ctx.actor_id())?;

    let actor_id = ctx.actor.id.clone();
    let summary = enqueue_merge(store, &mut ctx.transaction, &grant, &actor_id)?;
    ctx.commit(store)?;

    tracing::info!(
        scope = %grant.auth_type,
        type_id = %grant.type_id,
        inserted = summary.inserted.len(),
        updated = summary.updated.len(),
        "authorizations merged"
    );
    Ok::<_, ApiError>(ApiResponse::success(AddAuthorizeResponse {
        inserted: summary.inserted,
        updated: summary.updated,
    }))
}

pub async fn list_authorizes(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListAuthorizesParams>,
) -> impl IntoResponse {
    let target = validate_scope(&params.auth_type, &params.type_id)?;
    let store = state.store.as_ref();

    require_authorize(store, &target, Mask::ADMIN, ctx.actor_id())?;

    let (auth_type, type_id) = target.as_scope();
    let entries = store
        .list_authorizes(auth_type, type_id)
        .api_err("Failed to list authorizations")?;

    Ok::<_, ApiError>(ApiResponse::success(entries))
}

pub async fn check_authorize(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckAuthorizeRequest>,
) -> impl IntoResponse {
    let (target, mask) = validate_check_authorize(&req)?;
    let allowed = service::check_authorize(state.store.as_ref(), &target, mask, ctx.actor_id())?;

    Ok::<_, ApiError>(ApiResponse::success(CheckAuthorizeResponse { allowed }))
}
