//! OpenAPI document served at `/api-docs/openapi.json`

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::{AuthResponse, MessageResponse, UserPublic, UserResponse};
use crate::error::ApiError;
use crate::handlers::{auth, health, playlists, users};
use crate::validation::{
    GeneratePlaylistRequest, LoginRequest, RegisterRequest, UpdatePlaylistRequest, UpdatePreferencesRequest,
    UpdateProfileRequest,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "MoodTune API",
        description = "Accounts, preferences and mood-based playlists"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        auth::register_handler,
        auth::login_handler,
        auth::me_handler,
        auth::update_preferences_handler,
        auth::logout_handler,
        auth::deactivate_handler,
        auth::auth_health_handler,
        playlists::generate_playlist_handler,
        playlists::list_playlists_handler,
        playlists::get_playlist_handler,
        playlists::update_playlist_handler,
        playlists::delete_playlist_handler,
        users::get_profile_handler,
        users::update_profile_handler,
        users::stats_handler,
    ),
    components(schemas(
        ApiError,
        RegisterRequest,
        LoginRequest,
        UpdatePreferencesRequest,
        UpdateProfileRequest,
        GeneratePlaylistRequest,
        UpdatePlaylistRequest,
        AuthResponse,
        UserPublic,
        UserResponse,
        MessageResponse,
        moodtune_core::Preferences,
        moodtune_core::Mood,
        moodtune_core::Activity,
        moodtune_core::Genre,
        moodtune_core::Track,
        moodtune_core::Playlist,
        playlists::Pagination,
        playlists::PlaylistResponse,
        playlists::PlaylistListResponse,
        users::UserStats,
        users::UserStatsResponse,
        auth::AuthHealthResponse,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        health::MetricsResponse,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Registration, login and the current identity"),
        (name = "playlists", description = "Owner-scoped playlist management"),
        (name = "users", description = "Profile and account statistics"),
        (name = "health", description = "Liveness, readiness and counters"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
