use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use super::RawToken;
use crate::server::response::ApiError;
use crate::server::{AppState, RequestContext, RequestId};
use crate::store::{Transaction, UserStore};
use crate::types::Token;

/// Extractor that requires an admin token.
pub struct RequireAdmin(pub Token);

/// Extractor that requires a user token. Carries the per-request context
/// (actor, request id and an empty unit of work).
pub struct RequireUser(pub RequestContext);

#[derive(Debug)]
enum AuthError {
    MissingAuth,
    InvalidScheme,
    InvalidToken,
    TokenExpired,
    NotAdmin,
    NotUser,
    Internal,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuth => ApiError::unauthenticated("Authentication required"),
            AuthError::InvalidScheme => ApiError::unauthenticated("Invalid authorization scheme"),
            AuthError::InvalidToken => ApiError::unauthenticated("Invalid token"),
            AuthError::TokenExpired => ApiError::unauthenticated("Token expired"),
            AuthError::NotAdmin => ApiError::access_denied("Admin access required"),
            AuthError::NotUser => ApiError::access_denied("User token required for this operation"),
            AuthError::Internal => ApiError::internal("Failed to validate token"),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_and_validate_token(parts, state)?;

        if !token.is_admin {
            return Err(AuthError::NotAdmin.into());
        }

        Ok(RequireAdmin(token))
    }
}

impl FromRequestParts<Arc<AppState>> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_and_validate_token(parts, state)?;

        if token.is_admin {
            return Err(AuthError::NotUser.into());
        }

        let user_id = token.user_id.as_ref().ok_or(AuthError::NotUser)?;
        let actor = state
            .store
            .get_user(user_id)
            .map_err(|_| AuthError::Internal)?
            .ok_or(AuthError::NotUser)?;

        let request_id = parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(RequestId::new);

        Ok(RequireUser(RequestContext {
            request_id,
            actor,
            transaction: Transaction::new(),
        }))
    }
}

fn bearer_token(parts: &Parts) -> Result<String, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuth)?
        .to_str()
        .map_err(|_| AuthError::InvalidScheme)?;

    header
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .ok_or(AuthError::InvalidScheme)
}

fn extract_and_validate_token(parts: &Parts, state: &AppState) -> Result<Token, AuthError> {
    let raw = bearer_token(parts)?
        .parse::<RawToken>()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = state
        .store
        .get_token_by_lookup(raw.lookup())
        .map_err(|_| AuthError::Internal)?
        .ok_or(AuthError::InvalidToken)?;

    let verified = state.hasher.verify(&raw, &token.token_hash).map_err(|e| {
        tracing::error!(token_id = %token.id, "{e}");
        AuthError::Internal
    })?;
    if !verified {
        return Err(AuthError::InvalidToken);
    }

    if token.expires_at.is_some_and(|at| at < Utc::now()) {
        return Err(AuthError::TokenExpired);
    }

    if let Err(e) = state.store.touch_token(&token.id) {
        tracing::warn!("Failed to update token last_used_at: {e}");
    }

    Ok(token)
}
