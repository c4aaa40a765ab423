//! API error taxonomy and the JSON envelope every endpoint answers with.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::error;

use crate::auth::{jwt::TokenError, repo::StoreError, repo_types::Role};

/// `{isSuccess, message, payload?, ts}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    #[serde(rename = "isSuccess")]
    pub is_success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<T>,
    pub ts: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, payload: T) -> Self {
        Self {
            is_success: true,
            message: message.into(),
            payload: Some(payload),
            ts: timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(is_success: bool, message: impl Into<String>) -> Self {
        Self {
            is_success,
            message: message.into(),
            payload: None,
            ts: timestamp(),
        }
    }
}

fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("email already registered")]
    DuplicateEmail,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("password reset required")]
    PasswordResetRequired,

    #[error("role {required} required")]
    RoleNotPermitted { required: Role },

    #[error("invalid refresh token: {0}")]
    InvalidRefreshToken(TokenError),

    #[error("refresh token revoked")]
    TokenRevoked,

    #[error("refresh token belongs to another user")]
    TokenUserMismatch,

    #[error("missing authorization header")]
    MissingAuthorization,

    #[error("malformed authorization header")]
    MalformedAuthorizationHeader,

    #[error("unauthorized: {0}")]
    Unauthorized(TokenError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmail => StatusCode::CONFLICT,
            ApiError::RoleNotPermitted { .. } => StatusCode::FORBIDDEN,
            ApiError::InvalidCredentials
            | ApiError::PasswordResetRequired
            | ApiError::InvalidRefreshToken(_)
            | ApiError::TokenRevoked
            | ApiError::TokenUserMismatch
            | ApiError::MissingAuthorization
            | ApiError::MalformedAuthorizationHeader
            | ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::StoreUnavailable(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable client-facing wording. Internal causes never leak.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::DuplicateEmail => "User with this email already exists".into(),
            ApiError::InvalidCredentials => "Invalid email or password".into(),
            ApiError::PasswordResetRequired => {
                "Password is not valid. Please reset your password".into()
            }
            ApiError::RoleNotPermitted { required } => {
                format!("Access denied. {required} role required")
            }
            ApiError::InvalidRefreshToken(_) | ApiError::TokenRevoked => {
                "Invalid or expired refresh token".into()
            }
            ApiError::TokenUserMismatch => "Invalid refresh token".into(),
            ApiError::MissingAuthorization => "Authorization header required".into(),
            ApiError::MalformedAuthorizationHeader => "Invalid authorization format".into(),
            ApiError::Unauthorized(e) => format!("Invalid or expired token: {e}"),
            ApiError::NotFound(what) => format!("{what} not found"),
            ApiError::StoreUnavailable(_) => "Service temporarily unavailable".into(),
            ApiError::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let body = ApiResponse::message(false, self.public_message());
        (status, Json(body)).into_response()
    }
}
