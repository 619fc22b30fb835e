use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{CreateApplicationRequest, PageParams};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_name, validate_page};
use crate::service::content::enqueue_application;
use crate::service::{AuthTarget, list_recycled, require_authorize};
use crate::store::RegistryStore;
use crate::types::{AuthType, Mask};

pub async fn create_application(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApplicationRequest>,
) -> impl IntoResponse {
    validate_name("Application", &req.name)?;
    let store = state.store.as_ref();

    store
        .get_organization(&req.organization_id)
        .api_err("Failed to look up organization")?
        .or_not_found("Organization not found")?;

    let target = AuthTarget::scope(AuthType::Organization, &req.organization_id);
    require_authorize(store, &target, Mask::EDIT, ctx.actor_id())?;

    let actor_id = ctx.actor.id.clone();
    let app = enqueue_application(&mut ctx.transaction, &req.organization_id, &req.name, &actor_id);
    ctx.commit(store)?;

    tracing::info!(application_id = %app.id, organization_id = %app.organization_id, "application created");
    Ok::<_, ApiError>(ApiResponse::success(app))
}

/// Deleted files of an application, newest first.
pub async fn list_recycles(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(application_id): Path<String>,
    Query(params): Query<PageParams>,
) -> impl IntoResponse {
    let (page, size) = validate_page(&params)?;
    let store = state.store.as_ref();

    let app = store
        .get_application(&application_id)
        .api_err("Failed to look up application")?
        .or_not_found("Application not found")?;

    let target = AuthTarget::scope(AuthType::Application, &app.id);
    require_authorize(store, &target, Mask::VIEW, ctx.actor_id())?;

    let listing = list_recycled(store, &app, page, size)?;
    Ok::<_, ApiError>(ApiResponse::success(listing))
}
