use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{Error, Result as StoreResult};

/// Response codes. The leading digit is the class: 1 success, 2 warning,
/// 3 error, 4 access denied.
pub mod code {
    pub const SUCCESS: u32 = 1_000_000;

    pub const VALIDATION_FAILED: u32 = 2_000_001;
    pub const NOT_FOUND: u32 = 2_000_002;
    pub const CONTENT_NOT_FOUND: u32 = 2_000_003;
    pub const ALREADY_EXISTS: u32 = 2_000_004;
    pub const DEPENDENCY_MISSING: u32 = 2_000_005;
    pub const RECURSIVE_DEPENDENCY: u32 = 2_000_006;
    pub const INVALID_FILE_ID: u32 = 2_000_007;
    pub const CANNOT_DELETE: u32 = 2_000_008;
    pub const RELATION_LIMIT: u32 = 2_000_009;
    pub const USER_NOT_FOUND: u32 = 2_000_010;

    pub const INTERNAL: u32 = 3_000_001;
    pub const COMMIT_FAILED: u32 = 3_000_002;

    pub const ACCESS_DENIED: u32 = 4_000_001;
    pub const UNAUTHENTICATED: u32 = 4_000_002;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    Warning,
    Error,
    AccessDenied,
}

impl ResponseClass {
    #[must_use]
    pub fn of(code: u32) -> Self {
        match code / 1_000_000 {
            1 => Self::Success,
            2 => Self::Warning,
            4 => Self::AccessDenied,
            _ => Self::Error,
        }
    }
}

/// Standard API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: u32,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success(data: T) -> Self {
        Self {
            code: code::SUCCESS,
            data: Some(data),
            error: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: u32,
    pub message: String,
    pub data: Option<Value>,
}

impl ApiError {
    #[must_use]
    pub fn warning(status: StatusCode, code: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::warning(StatusCode::UNPROCESSABLE_ENTITY, code::VALIDATION_FAILED, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::warning(StatusCode::UNPROCESSABLE_ENTITY, code::NOT_FOUND, message)
    }

    #[must_use]
    pub fn invalid_file_id() -> Self {
        Self::warning(
            StatusCode::UNPROCESSABLE_ENTITY,
            code::INVALID_FILE_ID,
            "invalid file id",
        )
    }

    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: code::ACCESS_DENIED,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: code::UNAUTHENTICATED,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: code::INTERNAL,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn class(&self) -> ResponseClass {
        ResponseClass::of(self.code)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::AccessDenied => ApiError::access_denied("access denied"),
            Error::InvalidTokenFormat => ApiError::unauthenticated("Invalid token"),
            Error::NotFound => ApiError::not_found("not found"),
            Error::ContentNotFound(ids) => ApiError::warning(
                StatusCode::UNPROCESSABLE_ENTITY,
                code::CONTENT_NOT_FOUND,
                err_message("content not found", &ids),
            )
            .with_data(json!({ "ids": ids })),
            Error::UserNotFound(ids) => ApiError::warning(
                StatusCode::UNPROCESSABLE_ENTITY,
                code::USER_NOT_FOUND,
                err_message("user not found", &ids),
            )
            .with_data(json!({ "ids": ids })),
            Error::BadRequest(message) => ApiError::bad_request(message),
            Error::AlreadyExists => {
                ApiError::warning(StatusCode::CONFLICT, code::ALREADY_EXISTS, "already exists")
            }
            Error::DependencyMissing(ids) => ApiError::warning(
                StatusCode::CONFLICT,
                code::DEPENDENCY_MISSING,
                err_message("dependency missing", &ids),
            )
            .with_data(json!({ "depend_missing": ids })),
            Error::RecursiveDependency(ids) => ApiError::warning(
                StatusCode::CONFLICT,
                code::RECURSIVE_DEPENDENCY,
                err_message("recursive dependency", &ids),
            )
            .with_data(json!({ "recursive_items": ids })),
            Error::CannotDelete(ids) => ApiError::warning(
                StatusCode::CONFLICT,
                code::CANNOT_DELETE,
                "cannot be deleted",
            )
            .with_data(json!({ "referenced_by": ids })),
            Error::RelationLimit(limit) => ApiError::warning(
                StatusCode::UNPROCESSABLE_ENTITY,
                code::RELATION_LIMIT,
                format!("relation tree exceeds {limit} nodes"),
            ),
            Error::Commit { index, source } if source.is_rejection() => {
                tracing::debug!(index, error = %source, "commit rejected");
                ApiError::from(*source)
            }
            Error::Commit { index, source } => {
                tracing::error!(index, error = %source, "commit failed");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: code::COMMIT_FAILED,
                    message: "commit failed".to_string(),
                    data: None,
                }
            }
            other => {
                tracing::error!(error = %other, "unexpected failure");
                ApiError::internal("internal error")
            }
        }
    }
}

fn err_message(prefix: &str, ids: &[String]) -> String {
    format!("{prefix}: {}", ids.join(","))
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.class() {
            ResponseClass::Warning => tracing::debug!(code = self.code, "{}", self.message),
            ResponseClass::AccessDenied => tracing::info!(code = self.code, "{}", self.message),
            ResponseClass::Error => tracing::error!(code = self.code, "{}", self.message),
            ResponseClass::Success => {}
        }

        let body = json!({ "code": self.code, "data": self.data, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Extension trait for converting store results to API errors with a custom message.
pub trait StoreResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!(error = %e, "{message}");
            ApiError::internal(message)
        })
    }
}

/// Extension for Option types from store operations.
pub trait StoreOptionExt<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> StoreOptionExt<T> for Option<T> {
    fn or_not_found(self, message: &'static str) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(message))
    }
}
