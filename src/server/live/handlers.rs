use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::server::AppState;
use crate::server::dto::LivesRequest;
use crate::server::response::{ApiError, ApiResponse};
use crate::server::validation::{ValidationErrors, parse_kind, validate_lives};
use crate::service::relation::live_contents;
use crate::service::{ensure_complete, resolve_live};
use crate::types::FileType;

/// Live versions of the requested ids of one kind, relations left unexpanded.
pub async fn list_lives(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<LivesRequest>,
) -> impl IntoResponse {
    let file_type = parse_kind(&kind)?;
    let query = validate_lives(req)?;

    let versions = live_contents(
        state.store.as_ref(),
        &query.application_id,
        file_type,
        &query.ids,
    )?;

    Ok::<_, ApiError>(ApiResponse::success(versions))
}

/// Fully resolved relation trees for pages. Rejected as a whole when any
/// page has a missing or cyclic dependency.
pub async fn live_infos(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<LivesRequest>,
) -> impl IntoResponse {
    if parse_kind(&kind)? != FileType::Page {
        let message = format!("live infos are only served for pages, not {kind}");
        return Err(ApiError::from(ValidationErrors(vec![message])));
    }
    let query = validate_lives(req)?;

    let bundles = resolve_live(state.store.as_ref(), &query.application_id, &query.ids)?;
    if let Err(e) = ensure_complete(&bundles) {
        tracing::debug!(application_id = %query.application_id, error = %e, "live infos rejected");
        return Err(ApiError::from(e));
    }

    Ok::<_, ApiError>(ApiResponse::success(bundles))
}
