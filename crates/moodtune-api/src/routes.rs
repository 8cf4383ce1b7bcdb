//! API route definitions

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::middleware::{auth_middleware, optional_auth_middleware};
use crate::handlers::{auth, playlists, users};
use crate::state::AppState;

/// Routes nested under `/api`
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Anonymous or authenticated
    let optional_routes = Router::new()
        .route("/auth/health", get(auth::auth_health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth_middleware));

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/preferences", put(auth::update_preferences_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/deactivate", delete(auth::deactivate_handler))
        // Playlist endpoints
        .route("/playlists", get(playlists::list_playlists_handler))
        .route("/playlists/generate", post(playlists::generate_playlist_handler))
        .route(
            "/playlists/:id",
            get(playlists::get_playlist_handler)
                .put(playlists::update_playlist_handler)
                .delete(playlists::delete_playlist_handler),
        )
        // Profile endpoints
        .route(
            "/users/profile",
            get(users::get_profile_handler).put(users::update_profile_handler),
        )
        .route("/users/stats", get(users::stats_handler))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
}
