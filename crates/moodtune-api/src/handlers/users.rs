//! User profile handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::json_body;
use crate::auth::{AuthenticatedUser, UserResponse};
use crate::error::AppError;
use crate::state::AppState;
use crate::validation::{validate_preferences, UpdateProfileRequest};

#[utoipa::path(
    get,
    path = "/api/users/profile",
    tag = "users",
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_profile_handler(Extension(user): Extension<AuthenticatedUser>) -> Json<UserResponse> {
    Json(UserResponse::new(user.profile))
}

/// Update the profile; only preferences are editable
#[utoipa::path(
    put,
    path = "/api/users/profile",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated successfully", body = UserResponse),
        (status = 400, description = "Invalid preference values", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let patch = validate_preferences(request.preferences.unwrap_or_default())?;
    let user = state.auth.update_preferences(user.user_id, &patch).await?;

    Ok(Json(UserResponse::new(user).with_message("Profile updated successfully")))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub id: Uuid,
    pub username: String,
    pub join_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub playlist_count: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserStatsResponse {
    pub user: UserStats,
}

#[utoipa::path(
    get,
    path = "/api/users/stats",
    tag = "users",
    responses(
        (status = 200, description = "Account statistics", body = UserStatsResponse),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = user.profile;
    let playlist_count = state.playlists.count_owned(user.id).await?;

    Ok(Json(UserStatsResponse {
        user: UserStats {
            id: user.id,
            username: user.username,
            join_date: user.created_at,
            last_login: user.last_login,
            playlist_count,
        },
    }))
}
