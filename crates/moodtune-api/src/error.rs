//! API error handling
//!
//! Every failure leaving a handler or middleware is an [`AppError`], rendered
//! as a JSON [`ApiError`] body. Internal details are only included when the
//! server runs in development mode.

use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use moodtune_core::StoreError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::password::PasswordError;
use crate::auth::jwt::TokenError;

static EXPOSE_INTERNAL_DETAILS: AtomicBool = AtomicBool::new(false);

/// Include internal error details in responses (development mode)
pub fn set_expose_internal_details(enabled: bool) {
    EXPOSE_INTERNAL_DETAILS.store(enabled, Ordering::Relaxed);
}

fn expose_internal_details() -> bool {
    EXPOSE_INTERNAL_DETAILS.load(Ordering::Relaxed)
}

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Every violation found, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    /// Lock expiry, for locked accounts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<DateTime<Utc>>,
    /// Internal details (development mode only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            errors: None,
            locked_until: None,
            details: None,
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_locked_until(mut self, until: DateTime<Utc>) -> Self {
        self.locked_until = Some(until);
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Reasons a caller is not authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    NoToken,
    InvalidToken,
    TokenExpired,
    InvalidCredentials,
    /// Token was valid but its identity no longer resolves
    UnknownIdentity,
    Deactivated,
}

impl AuthFailure {
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::NoToken => "NO_TOKEN",
            AuthFailure::InvalidToken => "INVALID_TOKEN",
            AuthFailure::TokenExpired => "TOKEN_EXPIRED",
            AuthFailure::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthFailure::UnknownIdentity => "UNAUTHENTICATED",
            AuthFailure::Deactivated => "ACCOUNT_DEACTIVATED",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::NoToken => "No token provided, authorization denied",
            AuthFailure::InvalidToken => "Invalid token",
            AuthFailure::TokenExpired => "Token has expired",
            AuthFailure::InvalidCredentials => "Invalid username or password",
            AuthFailure::UnknownIdentity => "Token is not valid",
            AuthFailure::Deactivated => "Account is deactivated",
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthFailure::TokenExpired,
            _ => AuthFailure::InvalidToken,
        }
    }
}

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Unauthenticated: {}", .0.code())]
    Unauthenticated(AuthFailure),

    #[error("Account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Conflict(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::AccountLocked { .. } => StatusCode::LOCKED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthenticated(failure) => failure.code(),
            AppError::AccountLocked { .. } => "ACCOUNT_LOCKED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "USERNAME_TAKEN",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let body = match self {
            AppError::Validation(errors) => ApiError::new(code, "Validation failed").with_errors(errors),
            AppError::Unauthenticated(failure) => ApiError::new(code, failure.message()),
            AppError::AccountLocked { until } => {
                ApiError::new(code, "Account temporarily locked due to too many failed login attempts")
                    .with_locked_until(until)
            }
            AppError::NotFound(resource) => ApiError::new(code, format!("{resource} not found")),
            AppError::Conflict(message) => ApiError::new(code, message),
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                let body = ApiError::new(code, "Internal server error");
                if expose_internal_details() {
                    body.with_details(detail)
                } else {
                    body
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => AppError::Conflict("Username already exists".to_string()),
            StoreError::Timeout(_) | StoreError::Backend(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
