//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level on the "audit" target so it can be
//! filtered and routed separately from application logs. Events never carry
//! plaintext passwords or password hashes.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Client metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    RegistrationFailure {
        username: String,
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    LoginSuccess {
        user_id: Uuid,
        username: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    LoginFailure {
        username: String,
        reason: String,
        failed_attempts: Option<u32>,
        account_locked: bool,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Threshold crossed; the account is now locked
    AccountLocked {
        user_id: Uuid,
        username: String,
        failed_attempts: u32,
        locked_until: DateTime<Utc>,
        #[serde(flatten)]
        context: RequestContext,
    },

    Logout {
        user_id: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    AccountDeactivated {
        user_id: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Missing, invalid or expired token, or a token whose identity is
    /// unusable
    InvalidToken {
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// A playlist lookup scoped to the requester found nothing
    AccessDenied {
        user_id: Uuid,
        resource: String,
        #[serde(flatten)]
        context: RequestContext,
    },
}

impl AuditEvent {
    pub fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::AccountLocked { .. } => "Account locked",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::AccountDeactivated { .. } => "Account deactivated",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }

    fn user_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::AccountLocked { user_id, .. }
            | AuditEvent::Logout { user_id, .. }
            | AuditEvent::AccountDeactivated { user_id, .. }
            | AuditEvent::AccessDenied { user_id, .. } => Some(*user_id),
            _ => None,
        }
    }

    fn context(&self) -> &RequestContext {
        match self {
            AuditEvent::RegistrationSuccess { context, .. }
            | AuditEvent::RegistrationFailure { context, .. }
            | AuditEvent::LoginSuccess { context, .. }
            | AuditEvent::LoginFailure { context, .. }
            | AuditEvent::AccountLocked { context, .. }
            | AuditEvent::Logout { context, .. }
            | AuditEvent::AccountDeactivated { context, .. }
            | AuditEvent::InvalidToken { context, .. }
            | AuditEvent::AccessDenied { context, .. } => context,
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is serialized to JSON in the `event` field; the common
/// fields are also emitted individually for filtering.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let context = event.context();

    info!(
        target: "audit",
        timestamp = %timestamp,
        event = %event_json,
        user_id = ?event.user_id(),
        ip_address = ?context.ip_address,
        user_agent = ?context.user_agent,
        "{}",
        event.summary()
    );
}

/// Extract the client IP from proxy headers
///
/// Checks X-Forwarded-For (first hop), then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return Some(first_ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
