mod applications;
mod authorizes;
mod files;
mod teams;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::server::AppState;

pub fn user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/applications", post(applications::create_application))
        .route("/applications/{id}/recycles", get(applications::list_recycles))
        // Teams
        .route("/teams", get(teams::list_teams).post(teams::create_team))
        .route(
            "/teams/{id}/members",
            get(teams::list_members)
                .post(teams::add_members)
                .delete(teams::remove_members),
        )
        // Authorization entries
        .route("/authorizes", get(authorizes::list_authorizes))
        .route("/authorizes", post(authorizes::add_authorize))
        .route("/authorizes/check", post(authorizes::check_authorize))
        // Files by kind (pages, templates, variables, conditions, functions)
        .route("/files/{id}", get(files::get_file))
        .route("/{kind}", post(files::create_file))
        .route("/{kind}/versions", post(files::create_version))
        .route("/{kind}/live", put(files::publish))
        .route("/{kind}/status", put(files::set_file_status))
}
