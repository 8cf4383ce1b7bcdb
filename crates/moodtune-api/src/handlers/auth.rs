//! Authentication API handlers
//!
//! Registration, login, the current-identity endpoints, and the
//! authentication service health probe.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::json_body;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::{AuthResponse, AuthenticatedUser, MessageResponse, Session, UserResponse};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{
    canonical_username, validate_login, validate_preferences, validate_registration, LoginRequest, RegisterRequest,
    UpdatePreferencesRequest,
};

fn auth_response(state: &AppState, session: Session, message: &str) -> AuthResponse {
    AuthResponse {
        message: message.to_string(),
        token: session.token,
        expires_in: state.auth.token_lifetime(),
        user: session.user.into(),
    }
}

/// Register a new account
///
/// Usernames are canonicalized to lowercase; a username differing only in
/// case from an existing one is taken.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResponse),
        (status = 400, description = "Invalid input or username taken", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let request = json_body(payload)?;
    let attempted = request.username.clone().unwrap_or_default();

    let registration = match validate_registration(request, state.users.as_ref()).await {
        Ok(registration) => registration,
        Err(err) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username: attempted,
                reason: err.code().to_lowercase(),
                context,
            });
            return Err(err);
        }
    };

    let session = state.auth.register(registration, context).await?;

    Ok((
        StatusCode::CREATED,
        Json(auth_response(&state, session, "User registered successfully")),
    ))
}

/// Login with username and password
///
/// Five consecutive failures lock the account for two hours. The failure
/// that crosses the threshold, and every attempt while locked, answer 423.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "Missing username or password", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 423, description = "Account temporarily locked", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let request = json_body(payload)?;
    let now = Utc::now();

    let username = request.username.as_deref().map(canonical_username).unwrap_or_default();

    let attempt = match validate_login(request, state.users.as_ref(), now).await {
        Err(AppError::AccountLocked { until }) => return Err(state.auth.reject_locked(username, until, context).into()),
        other => other?,
    };
    let session = state.auth.login(attempt, now, context).await?;

    Ok(Json(auth_response(&state, session, "Login successful")))
}

/// Get the current user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(UserResponse::new(user.profile))
}

/// Update the current user's preferences
///
/// Each field is optional; present fields replace the stored value.
#[utoipa::path(
    put,
    path = "/api/auth/preferences",
    tag = "auth",
    request_body = UpdatePreferencesRequest,
    responses(
        (status = 200, description = "Preferences updated successfully", body = UserResponse),
        (status = 400, description = "Invalid preference values", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_preferences_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdatePreferencesRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let patch = validate_preferences(json_body(payload)?)?;
    let user = state.auth.update_preferences(user.user_id, &patch).await?;

    Ok(Json(UserResponse::new(user).with_message("Preferences updated successfully")))
}

/// Logout
///
/// Tokens are not stored server-side; the client discards its token. This
/// endpoint only records the event and always succeeds.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logout successful", body = MessageResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    state.auth.logout(user.user_id, RequestContext::from_headers(&headers));
    Json(MessageResponse::new("Logout successful"))
}

/// Deactivate the current account
///
/// The record is kept but treated as nonexistent for authentication;
/// outstanding tokens stop working immediately.
#[utoipa::path(
    delete,
    path = "/api/auth/deactivate",
    tag = "auth",
    responses(
        (status = 200, description = "Account deactivated successfully", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn deactivate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .deactivate(user.user_id, RequestContext::from_headers(&headers))
        .await?;

    Ok(Json(MessageResponse::new("Account deactivated successfully")))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthHealthResponse {
    #[schema(example = "OK")]
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    /// Whether the caller presented a usable token
    pub authenticated: bool,
}

#[utoipa::path(
    get,
    path = "/api/auth/health",
    tag = "auth",
    responses(
        (status = 200, description = "Authentication service is up", body = AuthHealthResponse),
    )
)]
pub async fn auth_health_handler(user: Option<Extension<AuthenticatedUser>>) -> impl IntoResponse {
    Json(AuthHealthResponse {
        status: "OK".to_string(),
        service: "Authentication Service".to_string(),
        timestamp: Utc::now(),
        authenticated: user.is_some(),
    })
}
