//! API Integration Tests
//!
//! Drive the full router against the in-memory store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use moodtune_api::auth::jwt::{issue_token, JwtConfig};
use moodtune_api::{create_router, create_router_for_testing, create_test_state};
use moodtune_core::config::DEV_JWT_SECRET;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

/// Send a request and decode the JSON response body
async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(json_body) => builder.body(Body::from(serde_json::to_string(&json_body).unwrap())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await
}

async fn generate(app: &Router, token: &str, name: &str) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/api/playlists/generate",
        Some(token),
        Some(json!({
            "name": name,
            "mood": "energetic",
            "activity": "working-out",
            "genres": ["rock"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["playlist"].clone()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_readiness() {
    let app = create_router_for_testing();

    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());

    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
    assert_eq!(body["checks"]["store"], true);

    let (status, body) = send(&app, "GET", "/api/auth/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["service"], "Authentication Service");
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_not_ready_returns_503() {
    let state = create_test_state();
    state.set_ready(false);
    let app = create_router(state);

    let (status, body) = send(&app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_metrics_counts_requests() {
    let app = create_router_for_testing();
    send(&app, "GET", "/health", None, None).await;
    send(&app, "GET", "/api/auth/me", None, None).await;

    let (status, body) = send(&app, "GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["totalRequests"].as_u64().unwrap() >= 2);
    assert!(body["statusCounts"]["401"].as_u64().unwrap() >= 1);
}

// =============================================================================
// Authentication Tests
// =============================================================================

#[tokio::test]
async fn test_register_login_lockout_and_generate_scenario() {
    let app = create_router_for_testing();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "alice_01", "password": "longenough1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User registered successfully");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(body["user"]["username"], "alice_01");
    assert_eq!(body["expiresIn"], 604_800);

    // Case-insensitive username match
    let (status, body) = login(&app, "ALICE_01", "longenough1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert!(body["user"]["lastLogin"].is_string());
    let token = body["token"].as_str().unwrap().to_string();

    // Five wrong passwords: 401 x4 then 423
    for attempt in 1..=5 {
        let (status, body) = login(&app, "alice_01", "wrong-password").await;
        if attempt < 5 {
            assert_eq!(status, StatusCode::UNAUTHORIZED, "attempt {attempt}");
            assert_eq!(body["code"], "INVALID_CREDENTIALS");
        } else {
            assert_eq!(status, StatusCode::LOCKED, "attempt {attempt}");
            assert_eq!(body["code"], "ACCOUNT_LOCKED");
            assert!(body["lockedUntil"].is_string());
        }
    }

    // Sixth attempt within the window, even with the right password
    let (status, body) = login(&app, "alice_01", "longenough1").await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");

    // A locked identity's existing token is rejected as locked
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["code"], "ACCOUNT_LOCKED");

    // A second identity generates from the energetic pool only
    let bob = register(&app, "bob_02", "longenough2").await;
    let playlist = generate(&app, &bob, "Gym").await;
    let ids: Vec<&str> = playlist["tracks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["3", "4"]);
    assert_eq!(playlist["description"], "A energetic playlist for working-out");
    assert_eq!(playlist["aiGenerated"], true);
    assert_eq!(playlist["isPublic"], false);
}

#[tokio::test]
async fn test_duplicate_username_any_case_is_rejected() {
    let app = create_router_for_testing();
    register(&app, "alice_01", "longenough1").await;

    for username in ["alice_01", "ALICE_01", "  Alice_01 "] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "username": username, "password": "longenough1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "USERNAME_TAKEN");
    }
}

#[tokio::test]
async fn test_registration_reports_every_violation() {
    let app = create_router_for_testing();

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "a!", "password": "short" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_bodies_are_validation_errors() {
    let app = create_router_for_testing();

    // Unknown field
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "carol", "password": "longenough1", "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Empty password
    let (status, body) = login(&app, "carol", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    // Wrong JSON type
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": 42, "password": true })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    // Decoding stops at the first mistyped field
    assert_eq!(body["errors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_user_login_is_invalid_credentials() {
    let app = create_router_for_testing();
    let (status, body) = login(&app, "nobody", "longenough1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_token_failures_are_distinguished() {
    let app = create_router_for_testing();

    let (status, body) = send(&app, "GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "NO_TOKEN");

    let (status, body) = send(&app, "GET", "/api/auth/me", Some("not.a.token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let foreign = issue_token(&JwtConfig::new("some-other-secret", 3600, "moodtune"), Uuid::new_v4()).unwrap();
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&foreign), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let expired = moodtune_api::auth::jwt::issue_token_at(
        &JwtConfig::new(DEV_JWT_SECRET, 60, "moodtune"),
        Uuid::new_v4(),
        1_000_000,
    )
    .unwrap();
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "TOKEN_EXPIRED");

    // Valid signature, identity never existed
    let orphan = issue_token(&JwtConfig::new(DEV_JWT_SECRET, 3600, "moodtune"), Uuid::new_v4()).unwrap();
    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&orphan), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_deactivated_account_tokens_stop_working() {
    let app = create_router_for_testing();
    let token = register(&app, "dave", "longenough1").await;

    let (status, body) = send(&app, "DELETE", "/api/auth/deactivate", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Account deactivated successfully");

    let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "ACCOUNT_DEACTIVATED");

    let (status, body) = login(&app, "dave", "longenough1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_logout_always_succeeds() {
    let app = create_router_for_testing();
    let token = register(&app, "erin", "longenough1").await;

    let (status, body) = send(&app, "POST", "/api/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout successful");

    let (status, body) = send(&app, "GET", "/api/auth/health", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}

// =============================================================================
// Preference and Profile Tests
// =============================================================================

#[tokio::test]
async fn test_preference_updates_are_idempotent() {
    let app = create_router_for_testing();
    let token = register(&app, "frank", "longenough1").await;
    let prefs = json!({ "favoriteGenres": ["jazz", "r&b"], "defaultMood": "calm" });

    let (status, first) = send(&app, "PUT", "/api/auth/preferences", Some(&token), Some(prefs.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Preferences updated successfully");

    let (status, second) = send(&app, "PUT", "/api/auth/preferences", Some(&token), Some(prefs)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["user"]["preferences"], second["user"]["preferences"]);
    assert_eq!(second["user"]["preferences"]["favoriteGenres"], json!(["jazz", "r&b"]));
    assert_eq!(second["user"]["preferences"]["defaultMood"], "calm");
    assert_eq!(second["user"]["preferences"]["defaultActivity"], "relaxing");
}

#[tokio::test]
async fn test_invalid_preferences_rejected() {
    let app = create_router_for_testing();
    let token = register(&app, "gina", "longenough1").await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/auth/preferences",
        Some(&token),
        Some(json!({ "defaultMood": "angry", "defaultActivity": "flying" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_profile_and_stats() {
    let app = create_router_for_testing();
    let token = register(&app, "hank", "longenough1").await;
    generate(&app, &token, "One").await;
    generate(&app, &token, "Two").await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/users/profile",
        Some(&token),
        Some(json!({ "preferences": { "defaultActivity": "studying" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Profile updated successfully");

    let (status, body) = send(&app, "GET", "/api/users/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["preferences"]["defaultActivity"], "studying");
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body["user"].get("failedAttempts").is_none());

    let (status, body) = send(&app, "GET", "/api/users/stats", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "hank");
    assert_eq!(body["user"]["playlistCount"], 2);
    assert!(body["user"]["joinDate"].is_string());
}

// =============================================================================
// Playlist Tests
// =============================================================================

#[tokio::test]
async fn test_playlist_ownership_isolation() {
    let app = create_router_for_testing();
    let owner = register(&app, "owner_1", "longenough1").await;
    let other = register(&app, "other_1", "longenough1").await;

    let playlist = generate(&app, &owner, "Private").await;
    let uri = format!("/api/playlists/{}", playlist["id"].as_str().unwrap());

    // Private: invisible to others for every operation
    let (status, _) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "PUT", &uri, Some(&other), Some(json!({ "name": "Mine" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Owner publishes it
    let (status, body) = send(&app, "PUT", &uri, Some(&owner), Some(json!({ "isPublic": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Playlist updated successfully");
    assert_eq!(body["playlist"]["isPublic"], true);

    // Public: readable, still not mutable
    let (status, body) = send(&app, "GET", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["playlist"]["name"], "Private");
    let (status, _) = send(&app, "PUT", &uri, Some(&other), Some(json!({ "name": "Mine" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Not listed for the other identity
    let (_, body) = send(&app, "GET", "/api/playlists", Some(&other), None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (status, body) = send(&app, "DELETE", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Playlist deleted successfully");
    let (status, body) = send(&app, "GET", &uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_playlist_listing_pagination() {
    let app = create_router_for_testing();
    let token = register(&app, "ivy", "longenough1").await;
    for name in ["A", "B", "C"] {
        generate(&app, &token, name).await;
    }

    let (status, body) = send(&app, "GET", "/api/playlists?page=2&limit=2", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["playlists"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"], json!({ "current": 2, "pages": 2, "total": 3 }));

    let (status, body) = send(&app, "GET", "/api/playlists?page=abc&limit=0", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["current"], 1);
    assert_eq!(body["pagination"]["pages"], 3);
}

#[tokio::test]
async fn test_playlist_validation_and_unknown_ids() {
    let app = create_router_for_testing();
    let token = register(&app, "jack", "longenough1").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/playlists/generate",
        Some(&token),
        Some(json!({ "name": "", "mood": "angry", "activity": "party", "genres": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"].as_array().unwrap().len(), 3);

    let (status, _) = send(&app, "GET", "/api/playlists/not-a-uuid", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", &format!("/api/playlists/{}", Uuid::new_v4()), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_security_headers_on_api_responses() {
    let app = create_router_for_testing();
    let response = app
        .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = create_router_for_testing();
    let (status, body) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/playlists/generate"].is_object());
    assert!(body["components"]["securitySchemes"]["bearer_auth"].is_object());
}
