//! Authorization middleware for protected routes
//!
//! Extracts and verifies the bearer token, then re-resolves the identity
//! against the credential store. On success, adds the resolved identity,
//! without any credential material, to request extensions.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::jwt::verify_token;
use super::models::UserPublic;
use super::service::AuthError;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::{AppError, AuthFailure};
use crate::state::AppState;

/// Authenticated identity attached to protected requests
///
/// Extract in handlers with `Extension<AuthenticatedUser>`. `profile` is
/// the record as resolved for this request, so handlers need no second
/// lookup to render it.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub profile: UserPublic,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::NoToken)?
        .to_str()
        .map_err(|_| AuthFailure::InvalidToken)?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some("") => Err(AuthFailure::NoToken),
        Some(token) => Ok(token),
        None => Err(AuthFailure::InvalidToken),
    }
}

/// Run the full authorization pipeline against request headers
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedUser, AppError> {
    let token = bearer_token(headers).map_err(AppError::Unauthenticated)?;

    let user_id = match verify_token(state.auth.jwt(), token) {
        Ok(id) => id,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                context: RequestContext::from_headers(headers),
            });
            return Err(AppError::Unauthenticated(AuthFailure::from(e)));
        }
    };

    match state.auth.resolve_identity(user_id, Utc::now()).await {
        Ok(user) => Ok(AuthenticatedUser {
            user_id: user.id,
            profile: UserPublic::from(user),
        }),
        Err(e @ (AuthError::UnknownIdentity | AuthError::Deactivated)) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                context: RequestContext::from_headers(headers),
            });
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Authorization middleware that requires a valid token and a live identity
///
/// Rejects with `NO_TOKEN`, `INVALID_TOKEN`, `TOKEN_EXPIRED`,
/// `UNAUTHENTICATED` (identity gone), `ACCOUNT_DEACTIVATED`, or
/// `ACCOUNT_LOCKED`.
///
/// ```ignore
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = authenticate(&state, request.headers()).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Optional authentication middleware
///
/// Performs the same resolution as [`auth_middleware`] but never rejects;
/// the user is only added to extensions when every check passes.
pub async fn optional_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let resolved = authenticate(&state, request.headers()).await;
    if let Ok(user) = resolved {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[tokio::test]
    async fn test_authenticate_attaches_resolved_profile() {
        use crate::auth::jwt::issue_token;
        use crate::validation::Registration;

        let state = crate::create_test_state();
        let session = state
            .auth
            .register(
                Registration {
                    username: "alice_01".to_string(),
                    password: "longenough1".to_string(),
                },
                RequestContext::default(),
            )
            .await
            .unwrap();

        let mut request_headers = HeaderMap::new();
        let value = format!("Bearer {}", session.token);
        request_headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());

        let user = authenticate(&state, &request_headers).await.unwrap();
        assert_eq!(user.user_id, session.user.id);
        assert_eq!(user.profile.id, session.user.id);
        assert_eq!(user.profile.username, "alice_01");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json["profile"].get("passwordHash").is_none());

        // Identity that never existed
        let orphan = issue_token(state.auth.jwt(), Uuid::new_v4()).unwrap();
        let value = format!("Bearer {orphan}");
        request_headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&value).unwrap());
        let err = authenticate(&state, &request_headers).await.unwrap_err();
        assert_eq!(err.code(), "UNAUTHENTICATED");
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthFailure::NoToken));
        assert_eq!(bearer_token(&headers("Bearer ")), Err(AuthFailure::NoToken));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), Err(AuthFailure::InvalidToken));
    }
}
