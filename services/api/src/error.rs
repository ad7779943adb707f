//! Custom error types for the API service
//!
//! Every error renders as `{"message": ..., "errors": [{"code", "detail", "attr"?}]}`.
//! Validation and business-rule failures both use 422.

use axum::{
    Json,
    async_trait,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use rbac::RbacError;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Error codes shared by handlers
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const INVALID: &str = "invalid";
    pub const BLANK: &str = "blank";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const NOT_FOUND: &str = "not_found";
    pub const PERMISSION_DENIED: &str = "permission_denied";
    pub const ADMIN_REQUIRED: &str = "admin_required";
    pub const CONFLICT: &str = "conflict";
    pub const LIMIT_EXCEEDED: &str = "limit_exceeded";
    pub const NOT_AUTHENTICATED: &str = "not_authenticated";
    pub const TOKEN_INVALID: &str = "token_invalid";
    pub const SERVER_ERROR: &str = "server_error";

    pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
    pub const ACCOUNT_INACTIVE: &str = "account_inactive";
    pub const EMAIL_EXISTS: &str = "email_exists";
    pub const PASSWORD_MISMATCH: &str = "password_mismatch";
    pub const INVALID_REFRESH_TOKEN: &str = "invalid_refresh_token";
    pub const TOKEN_BLACKLISTED: &str = "token_blacklisted";
    pub const USER_NOT_FOUND: &str = "user_not_found";
    pub const LOGOUT_FAILED: &str = "logout_failed";
    pub const ALREADY_DELETED: &str = "already_deleted";
    pub const SYSTEM_ROLE: &str = "system_role";
}

/// One entry of the `errors` array
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorDetail {
    pub code: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

impl ErrorDetail {
    pub fn new(code: &str, detail: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            detail: detail.into(),
            attr: None,
        }
    }

    pub fn field(attr: &str, code: &str, detail: impl Into<String>) -> Self {
        Self {
            attr: Some(attr.to_string()),
            ..Self::new(code, detail)
        }
    }
}

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or invalid input (422)
    #[error("Validation failed")]
    Validation(Vec<ErrorDetail>),

    /// Well-formed input rejected by a business rule (422)
    #[error("{message}")]
    BusinessLogic {
        message: String,
        errors: Vec<ErrorDetail>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    PermissionDenied { code: &'static str, message: String },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Throttled(String),

    /// Unexpected failure; the cause is logged, never returned
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ApiError {
    pub fn field(attr: &str, code: &str, detail: impl Into<String>) -> Self {
        ApiError::Validation(vec![ErrorDetail::field(attr, code, detail)])
    }

    pub fn business(code: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        ApiError::BusinessLogic {
            message: detail.clone(),
            errors: vec![ErrorDetail::new(code, detail)],
        }
    }

    /// Business-rule failure tied to one input field
    pub fn business_field(attr: &str, code: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        ApiError::BusinessLogic {
            message: detail.clone(),
            errors: vec![ErrorDetail::field(attr, code, detail)],
        }
    }

    pub fn permission_denied(detail: impl Into<String>) -> Self {
        ApiError::PermissionDenied {
            code: codes::PERMISSION_DENIED,
            message: detail.into(),
        }
    }

    pub fn admin_required() -> Self {
        ApiError::PermissionDenied {
            code: codes::ADMIN_REQUIRED,
            message: "Administrator role required".to_string(),
        }
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized(
            "Authentication credentials were not provided or are invalid".to_string(),
        )
    }

    pub fn internal(e: impl std::fmt::Display) -> Self {
        ApiError::Internal(e.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BusinessLogic { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Throttled(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) | ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> (String, Vec<ErrorDetail>) {
        match self {
            ApiError::Validation(errors) => ("Validation failed".to_string(), errors),
            ApiError::BusinessLogic { message, errors } => (message, errors),
            ApiError::NotFound(detail) => (
                "Resource not found".to_string(),
                vec![ErrorDetail::new(codes::NOT_FOUND, detail)],
            ),
            ApiError::PermissionDenied { code, message } => {
                ("Permission denied".to_string(), vec![ErrorDetail::new(code, message)])
            }
            ApiError::Conflict(detail) => (
                "Resource conflict".to_string(),
                vec![ErrorDetail::new(codes::CONFLICT, detail)],
            ),
            ApiError::Unauthorized(detail) => (
                "Authentication required".to_string(),
                vec![ErrorDetail::new(codes::NOT_AUTHENTICATED, detail)],
            ),
            ApiError::Throttled(detail) => (
                "Too many requests".to_string(),
                vec![ErrorDetail::new(codes::LIMIT_EXCEEDED, detail)],
            ),
            ApiError::Internal(_) | ApiError::Database(_) => (
                "Internal server error".to_string(),
                vec![ErrorDetail::new(codes::SERVER_ERROR, "Internal server error")],
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let (message, errors) = self.body();
        let body = Json(json!({
            "message": message,
            "errors": errors,
        }));

        (status, body).into_response()
    }
}

impl From<RbacError> for ApiError {
    fn from(e: RbacError) -> Self {
        match e {
            RbacError::RoleNotFound(_)
            | RbacError::PermissionNotFound(_)
            | RbacError::RolePermissionNotFound { .. }
            | RbacError::UserRoleNotFound { .. }
            | RbacError::ObjectPermissionNotFound(_) => ApiError::NotFound(e.to_string()),
            RbacError::SystemRole(_) => ApiError::business(codes::SYSTEM_ROLE, e.to_string()),
            RbacError::DuplicateRole(_) | RbacError::DuplicatePermission(_) => {
                ApiError::Conflict(e.to_string())
            }
            RbacError::Invalid { field, reason } => ApiError::field(field, codes::INVALID, reason),
            RbacError::Database(db) => ApiError::Database(db),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Database(DatabaseError::Query(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(vec![ErrorDetail::new(codes::INVALID, rejection.body_text())])
    }
}

/// `Json` extractor whose rejections use the API error envelope
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
