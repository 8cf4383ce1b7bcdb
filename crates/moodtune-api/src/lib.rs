//! MoodTune API - REST server for accounts, preferences and playlists
//!
//! The router nests the JSON API under `/api`, serves liveness, readiness
//! and counters at the root, and publishes the OpenAPI document with a
//! Swagger UI.

pub mod audit;
pub mod auth;
pub mod error;
pub mod generator;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use moodtune_core::{AppConfig, PlaylistStore, StoreBackend, UserStore};
use moodtune_store::{MemoryStore, PostgresStore, TimeoutStore};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::password::PasswordHasherService;
use crate::handlers::health;
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub use crate::error::{AppError, ApiError};

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .nest("/api", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::security_headers_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Connect the configured store and assemble application state
///
/// Every store call is bounded by `database.timeout_ms`.
pub async fn build_state(config: AppConfig) -> anyhow::Result<Arc<AppState>> {
    let limit = config.database.timeout();

    let (users, playlists): (Arc<dyn UserStore>, Arc<dyn PlaylistStore>) = match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            let store = Arc::new(TimeoutStore::new(MemoryStore::new(), limit));
            (store.clone(), store)
        }
        StoreBackend::Postgres => {
            let store =
                PostgresStore::connect(&config.database.postgres_url, config.database.pool_size, limit).await?;
            store.init_schema().await?;
            tracing::info!(pool_size = config.database.pool_size, "Connected to PostgreSQL");
            let store = Arc::new(TimeoutStore::new(store, limit));
            (store.clone(), store)
        }
    };

    Ok(Arc::new(AppState::new(
        config,
        users,
        playlists,
        PasswordHasherService::default(),
    )))
}

/// State over a fresh in-memory store with minimal hashing cost
#[cfg(any(test, feature = "test-utils"))]
pub fn create_test_state() -> Arc<AppState> {
    use crate::auth::password::PasswordConfig;
    use moodtune_core::config::Environment;

    let mut config = AppConfig::default();
    config.server.environment = Environment::Development;

    let store = Arc::new(MemoryStore::new());
    Arc::new(AppState::new(
        config,
        store.clone(),
        store,
        PasswordHasherService::new(PasswordConfig::fast()),
    ))
}

/// Router over [`create_test_state`], for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(create_test_state())
}
