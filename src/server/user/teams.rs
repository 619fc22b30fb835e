use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{
    CreateTeamRequest, ListTeamsParams, TeamMembersRequest, TeamMembersResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::server::validation::{validate_name, validate_team_members};
use crate::service::team::{enqueue_add_members, enqueue_remove_members, enqueue_team};
use crate::service::{AuthTarget, require_authorize};
use crate::store::{RegistryStore, Store, TeamStore};
use crate::types::{AuthType, Mask, Team};

fn find_team(store: &dyn Store, team_id: &str) -> Result<Team, ApiError> {
    store
        .get_team(team_id)
        .api_err("Failed to look up team")?
        .or_not_found("Team not found")
}

fn members_response(
    store: &dyn Store,
    team_id: String,
    changed: Vec<String>,
) -> Result<TeamMembersResponse, ApiError> {
    let members = store
        .list_team_members(&team_id)
        .api_err("Failed to list team members")?;
    Ok(TeamMembersResponse {
        team_id,
        changed,
        members,
    })
}

pub async fn create_team(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTeamRequest>,
) -> impl IntoResponse {
    validate_name("Team", &req.name)?;
    let store = state.store.as_ref();

    store
        .get_organization(&req.organization_id)
        .api_err("Failed to look up organization")?
        .or_not_found("Organization not found")?;

    let target = AuthTarget::scope(AuthType::Organization, &req.organization_id);
    require_authorize(store, &target, Mask::EDIT, ctx.actor_id())?;

    let actor_id = ctx.actor.id.clone();
    let team = enqueue_team(&mut ctx.transaction, &req.organization_id, &req.name, &actor_id);
    ctx.commit(store)?;

    tracing::info!(team_id = %team.id, organization_id = %team.organization_id, "team created");
    Ok::<_, ApiError>(ApiResponse::success(team))
}

pub async fn list_teams(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTeamsParams>,
) -> impl IntoResponse {
    let store = state.store.as_ref();

    let target = AuthTarget::scope(AuthType::Organization, &params.organization_id);
    require_authorize(store, &target, Mask::VIEW, ctx.actor_id())?;

    let teams = store
        .list_teams(&params.organization_id)
        .api_err("Failed to list teams")?;
    Ok::<_, ApiError>(ApiResponse::success(teams))
}

pub async fn list_members(
    RequireUser(ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.as_ref();
    let team = find_team(store, &team_id)?;

    let target = AuthTarget::scope(AuthType::Team, &team.id);
    require_authorize(store, &target, Mask::VIEW, ctx.actor_id())?;

    Ok::<_, ApiError>(ApiResponse::success(members_response(store, team.id, Vec::new())?))
}

pub async fn add_members(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    Json(req): Json<TeamMembersRequest>,
) -> impl IntoResponse {
    let user_ids = validate_team_members(req)?;
    let store = state.store.as_ref();
    let team = find_team(store, &team_id)?;

    let target = AuthTarget::scope(AuthType::Team, &team.id);
    require_authorize(store, &target, Mask::ADMIN, ctx.actor_id())?;

    let added = enqueue_add_members(store, &mut ctx.transaction, &team.id, &user_ids)?;
    ctx.commit(store)?;

    tracing::info!(team_id = %team.id, added = added.len(), "team members added");
    Ok::<_, ApiError>(ApiResponse::success(members_response(store, team.id, added)?))
}

pub async fn remove_members(
    RequireUser(mut ctx): RequireUser,
    State(state): State<Arc<AppState>>,
    Path(team_id): Path<String>,
    Json(req): Json<TeamMembersRequest>,
) -> impl IntoResponse {
    let user_ids = validate_team_members(req)?;
    let store = state.store.as_ref();
    let team = find_team(store, &team_id)?;

    let target = AuthTarget::scope(AuthType::Team, &team.id);
    require_authorize(store, &target, Mask::ADMIN, ctx.actor_id())?;

    let removed = enqueue_remove_members(store, &mut ctx.transaction, &team.id, &user_ids)?;
    ctx.commit(store)?;

    tracing::info!(team_id = %team.id, removed = removed.len(), "team members removed");
    Ok::<_, ApiError>(ApiResponse::success(members_response(store, team.id, removed)?))
}
