use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateFileRequest, CreateVersionRequest, FileDetail, FileStatusRequest, PublishRequest,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{parse_kind, validate_name, validate_version};
use crate::service::content::{enqueue_file, enqueue_file_delete, enqueue_publish, enqueue_version};
use crate::service::{AuthTarget, require_authorize};
use crate::store::{RegistryStore, Store};
use crate::types::{AuthType, Content, FileRecord, FileType, Mask};

fn file_detail(store: &dyn Store, file: FileRecord) -> Result<FileDetail, ApiError> {
    let contents = store
        .list_file_contents(&file.id)
        .api_err("Failed to list contents")?;
    Ok(FileDetail { file, contents })
}

/// Looks up a content and its file, rejecting contents of another kind.
fn content_of_kind(
    store: &dyn Store,
    content_id: &str,
    file_type: FileType,
) -> Result<(FileRecord, Content), ApiError> {
    let content = store
        .get_content(content_id)
        .api_err("Failed to look up content")?
        .or_not_found("Content not found")?;
    let file = store
        .get_file(&content.file_id)
        .api_err("Failed to look up file")?
        .or_not_found("File not found")?;

    if file.file_type != file_type || file.status.is_deleted() {
        return Err(ApiError::invalid_file_id());
    }
    Ok((file, content))
}

pub async fn create_file(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<CreateFileRequest>,
) -> impl IntoResponse {
    let file_type = parse_kind(&kind)?;
    validate_name("File", &req.name)?;
    let store = state.store.as_ref();

    store
        .get_application(&req.application_id)
        .api_err("Failed to look up application")?
        .or_not_found("Application not found")?;

    let target = AuthTarget::scope(AuthType::Application, &req.application_id);
    require_authorize(store, &target, Mask::EDIT, ctx.actor_id())?;

    let actor_id = ctx.actor.id.clone();
    let (file, content) = enqueue_file(
        &mut ctx.transaction,
        &req.application_id,
        &req.name,
        file_type,
        &actor_id,
    );
    ctx.commit(store)?;

    tracing::info!(file_id = %file.id, %file_type, "file created");
    Ok::<_, ApiError>(ApiResponse::success(FileDetail {
        file,
        contents: vec![content],
    }))
}

pub async fn get_file(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let file = store
        .get_file(&id)
        .api_err("Failed to look up file")?
        .or_not_found("File not found")?;

    require_authorize(store, &AuthTarget::File(file.id.clone()), Mask::VIEW, ctx.actor_id())?;

    Ok::<_, ApiError>(ApiResponse::success(file_detail(store, file)?))
}

pub async fn create_version(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<CreateVersionRequest>,
) -> impl IntoResponse {
    let file_type = parse_kind(&kind)?;
    validate_version(&req)?;
    let store = state.store.as_ref();

    let (file, content) = content_of_kind(store, &req.content_id, file_type)?;

    let target = AuthTarget::scope(AuthType::Content, &content.id);
    require_authorize(store, &target, Mask::EDIT, ctx.actor_id())?;

    let actor_id = ctx.actor.id.clone();
    let version = enqueue_version(
        store,
        &mut ctx.transaction,
        &file,
        &content,
        req.relations,
        req.schemas,
        &actor_id,
    )?;
    ctx.commit(store)?;

    tracing::info!(
        content_id = %version.content_id,
        version = version.version_number,
        "version created"
    );
    Ok::<_, ApiError>(ApiResponse::success(version))
}

pub async fn publish(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<PublishRequest>,
) -> impl IntoResponse {
    let file_type = parse_kind(&kind)?;
    let store = state.store.as_ref();

    let (_, content) = content_of_kind(store, &req.content_id, file_type)?;

    let target = AuthTarget::scope(AuthType::Content, &content.id);
    require_authorize(store, &target, Mask::EDIT, ctx.actor_id())?;

    let bundle = enqueue_publish(store, &mut ctx.transaction, &content.id, req.version_number)?;
    ctx.commit(store)?;

    tracing::info!(content_id = %content.id, version = req.version_number, "version published");
    Ok::<_, ApiError>(ApiResponse::success(bundle))
}

pub async fn set_file_status(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(req): Json<FileStatusRequest>,
) -> impl IntoResponse {
    let file_type = parse_kind(&kind)?;
    let store = state.store.as_ref();

    let file = store
        .get_file(&req.id)
        .api_err("Failed to look up file")?
        .filter(|f| f.file_type == file_type)
        .ok_or_else(ApiError::invalid_file_id)?;

    require_authorize(store, &AuthTarget::File(file.id.clone()), Mask::DELETE, ctx.actor_id())?;

    enqueue_file_delete(store, &mut ctx.transaction, &file)?;
    ctx.commit(store)?;

    let file = store
        .get_file(&file.id)
        .api_err("Failed to look up file")?
        .or_not_found("File not found")?;

    tracing::info!(file_id = %file.id, "file deleted");
    Ok::<_, ApiError>(ApiResponse::success(file_detail(store, file)?))
}
