//! Playlist API handlers
//!
//! Every lookup is scoped to the requester: mutations match on both the
//! playlist id and the owner, reads additionally accept public playlists.
//! Anything outside that scope is indistinguishable from a missing playlist.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use moodtune_core::{PageRequest, Playlist};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::json_body;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::{AuthenticatedUser, MessageResponse};
use crate::error::AppError;
use crate::generator::build_playlist;
use crate::state::AppState;
use crate::validation::{
    validate_playlist_request, validate_playlist_update, GeneratePlaylistRequest, UpdatePlaylistRequest,
};

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ListPlaylistsQuery {
    /// Page number, starting at 1
    pub page: Option<String>,
    /// Page size (1-100, default 10)
    pub limit: Option<String>,
}

impl ListPlaylistsQuery {
    /// Resolve to (page, limit), falling back to defaults on unparsable input
    fn resolve(&self) -> (u64, u64) {
        let page = self
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);
        let limit = self
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (page, limit)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Pagination {
    pub current: u64,
    pub pages: u64,
    pub total: u64,
}

impl Pagination {
    fn new(current: u64, limit: u64, total: u64) -> Self {
        Self {
            current,
            pages: total.div_ceil(limit),
            total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaylistListResponse {
    pub playlists: Vec<Playlist>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PlaylistResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub playlist: Playlist,
}

fn parse_playlist_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Playlist"))
}

fn not_visible(user: &AuthenticatedUser, id: &str, headers: &HeaderMap) -> AppError {
    audit_log(&AuditEvent::AccessDenied {
        user_id: user.user_id,
        resource: format!("playlist:{id}"),
        context: RequestContext::from_headers(headers),
    });
    AppError::NotFound("Playlist")
}

/// Generate a playlist for the requester
///
/// Tracks come from the configured selector; the default picks a fixed pool
/// by mood.
#[utoipa::path(
    post,
    path = "/api/playlists/generate",
    tag = "playlists",
    request_body = GeneratePlaylistRequest,
    responses(
        (status = 201, description = "Playlist generated successfully", body = PlaylistResponse),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_playlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    payload: Result<Json<GeneratePlaylistRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = validate_playlist_request(json_body(payload)?)?;

    let tracks = state.selector.select(&request);
    let playlist = build_playlist(request, user.user_id, tracks, Utc::now());
    let playlist = state.playlists.create(playlist).await?;

    tracing::info!(playlist_id = %playlist.id, owner_id = %user.user_id, mood = %playlist.mood, "Playlist generated");

    Ok((
        StatusCode::CREATED,
        Json(PlaylistResponse {
            message: Some("Playlist generated successfully".to_string()),
            playlist,
        }),
    ))
}

/// List the requester's playlists, newest first
#[utoipa::path(
    get,
    path = "/api/playlists",
    tag = "playlists",
    params(ListPlaylistsQuery),
    responses(
        (status = 200, description = "Owned playlists", body = PlaylistListResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_playlists_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    query: Result<Query<ListPlaylistsQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let (page, limit) = query.resolve();

    let result = state
        .playlists
        .list_owned(
            user.user_id,
            PageRequest {
                offset: (page - 1).saturating_mul(limit),
                limit,
            },
        )
        .await?;

    Ok(Json(PlaylistListResponse {
        playlists: result.items,
        pagination: Pagination::new(page, limit, result.total),
    }))
}

/// Fetch one playlist the requester owns or that is public
#[utoipa::path(
    get,
    path = "/api/playlists/{id}",
    tag = "playlists",
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Playlist", body = PlaylistResponse),
        (status = 404, description = "Playlist not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_playlist_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let playlist_id = parse_playlist_id(&id)?;

    let playlist = state
        .playlists
        .find_visible(playlist_id, user.user_id)
        .await?
        .ok_or_else(|| not_visible(&user, &id, &headers))?;

    Ok(Json(PlaylistResponse {
        message: None,
        playlist,
    }))
}

/// Update an owned playlist's name, description or visibility
#[utoipa::path(
    put,
    path = "/api/playlists/{id}",
    tag = "playlists",
    params(("id" = String, Path, description = "Playlist id")),
    request_body = UpdatePlaylistRequest,
    responses(
        (status = 200, description = "Playlist updated successfully", body = PlaylistResponse),
        (status = 400, description = "Validation failed", body = crate::error::ApiError),
        (status = 404, description = "Playlist not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_playlist_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePlaylistRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let playlist_id = parse_playlist_id(&id)?;
    let patch = validate_playlist_update(json_body(payload)?)?;

    let playlist = state
        .playlists
        .update_owned(playlist_id, user.user_id, &patch, Utc::now())
        .await?
        .ok_or_else(|| not_visible(&user, &id, &headers))?;

    Ok(Json(PlaylistResponse {
        message: Some("Playlist updated successfully".to_string()),
        playlist,
    }))
}

/// Delete an owned playlist
#[utoipa::path(
    delete,
    path = "/api/playlists/{id}",
    tag = "playlists",
    params(("id" = String, Path, description = "Playlist id")),
    responses(
        (status = 200, description = "Playlist deleted successfully", body = MessageResponse),
        (status = 404, description = "Playlist not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_playlist_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let playlist_id = parse_playlist_id(&id)?;

    if !state.playlists.delete_owned(playlist_id, user.user_id).await? {
        return Err(not_visible(&user, &id, &headers));
    }

    Ok(Json(MessageResponse::new("Playlist deleted successfully")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, limit: Option<&str>) -> ListPlaylistsQuery {
        ListPlaylistsQuery {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_query_defaults_and_clamping() {
        assert_eq!(query(None, None).resolve(), (1, 10));
        assert_eq!(query(Some("3"), Some("25")).resolve(), (3, 25));
        assert_eq!(query(Some("0"), Some("0")).resolve(), (1, 1));
        assert_eq!(query(Some("abc"), Some("1000")).resolve(), (1, 100));
    }

    #[test]
    fn test_pagination_page_count() {
        let p = Pagination::new(1, 10, 0);
        assert_eq!(p.pages, 0);
        assert_eq!(Pagination::new(1, 10, 10).pages, 1);
        assert_eq!(Pagination::new(2, 10, 11).pages, 2);
    }

    #[test]
    fn test_non_uuid_id_is_not_found() {
        assert!(matches!(parse_playlist_id("123"), Err(AppError::NotFound("Playlist"))));
    }
}
