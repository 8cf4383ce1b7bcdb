//! Request accounting middleware
//!
//! Counts requests and tallies response status codes on [`AppState`]; the
//! totals are served by the `/metrics` endpoint.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::state::AppState;

pub async fn metrics_middleware(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let endpoint = normalize_endpoint(request.uri().path());

    state.increment_requests();
    let response = next.run(request).await;

    let status = response.status().as_u16();
    state.record_status(status);

    tracing::debug!(
        %method,
        endpoint = %endpoint,
        status,
        latency_us = start.elapsed().as_micros() as u64,
        "Request completed"
    );

    response
}

/// Replace id segments with `:id` so log lines group by route
fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|seg| if uuid::Uuid::parse_str(seg).is_ok() { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("/api/playlists/550e8400-e29b-41d4-a716-446655440000"),
            "/api/playlists/:id"
        );
        assert_eq!(normalize_endpoint("/api/playlists"), "/api/playlists");
        assert_eq!(normalize_endpoint("/api/playlists/not-an-id"), "/api/playlists/not-an-id");
        assert_eq!(normalize_endpoint("/health"), "/health");
    }
}
