//! Authentication service layer
//!
//! Credential lifecycle on top of a [`UserStore`]: registration, login with
//! progressive lockout, identity re-resolution for the middleware, and
//! preference and deactivation mutations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use moodtune_core::{LockoutPolicy, NewUser, PreferencesPatch, StoreError, User, UserStore};
use thiserror::Error;
use uuid::Uuid;

use super::jwt::{issue_token, JwtConfig, TokenError};
use super::password::{PasswordError, PasswordHasherService};
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::{AppError, AuthFailure};
use crate::validation::{LoginAttempt, Registration};

/// Authentication service errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Token identity does not resolve")]
    UnknownIdentity,

    #[error("Account is deactivated")]
    Deactivated,

    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Failed to issue token: {0}")]
    Token(#[from] TokenError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthenticated(AuthFailure::InvalidCredentials),
            AuthError::AccountLocked { until } => AppError::AccountLocked { until },
            AuthError::UnknownIdentity => AppError::Unauthenticated(AuthFailure::UnknownIdentity),
            AuthError::Deactivated => AppError::Unauthenticated(AuthFailure::Deactivated),
            AuthError::UserNotFound => AppError::NotFound("User"),
            AuthError::Store(e) => AppError::from(e),
            AuthError::Password(e) => AppError::from(e),
            AuthError::Token(e) => AppError::Internal(e.to_string()),
        }
    }
}

/// An authenticated identity together with its fresh session token
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasherService,
    jwt: JwtConfig,
    policy: LockoutPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        hasher: PasswordHasherService,
        jwt: JwtConfig,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            users,
            hasher,
            jwt,
            policy,
        }
    }

    pub fn jwt(&self) -> &JwtConfig {
        &self.jwt
    }

    /// Token lifetime in seconds
    pub fn token_lifetime(&self) -> u64 {
        self.jwt.expiration_secs
    }

    /// Create an identity from a validated registration and sign it in
    pub async fn register(&self, registration: Registration, context: RequestContext) -> Result<Session, AuthError> {
        let Registration { username, password } = registration;
        let password_hash = self.hasher.hash(password).await?;

        let new_user = NewUser {
            username: username.clone(),
            password_hash,
        };
        let user = match self.users.create(new_user, Utc::now()).await {
            Ok(user) => user,
            Err(err) => {
                if matches!(err, StoreError::DuplicateUsername) {
                    audit_log(&AuditEvent::RegistrationFailure {
                        username,
                        reason: "username_taken".to_string(),
                        context,
                    });
                }
                return Err(err.into());
            }
        };

        let token = issue_token(&self.jwt, user.id)?;

        audit_log(&AuditEvent::RegistrationSuccess {
            user_id: user.id,
            username: user.username.clone(),
            context,
        });

        Ok(Session { user, token })
    }

    /// Authenticate a validated login attempt
    ///
    /// Wrong passwords advance the lockout state machine atomically in the
    /// store; the attempt that crosses the threshold answers as locked.
    /// Unknown and deactivated identities never touch lockout counters.
    pub async fn login(
        &self,
        attempt: LoginAttempt,
        now: DateTime<Utc>,
        context: RequestContext,
    ) -> Result<Session, AuthError> {
        let LoginAttempt {
            username,
            password,
            user,
        } = attempt;

        let user = match user {
            Some(user) if user.is_active => user,
            other => {
                // Same argon2 cost as a real mismatch; the result is irrelevant
                let _ = self.hasher.verify_placeholder(password).await;
                let reason = if other.is_some() { "account_deactivated" } else { "unknown_user" };
                return Err(self.reject_login(username, reason, None, context));
            }
        };

        if let Some(until) = user.lockout_state().locked_until(now) {
            return Err(self.reject_locked(username, until, context));
        }

        // Verification errors are hard failures and are not counted
        let password_valid = self.hasher.verify(password, user.password_hash.clone()).await?;

        if !password_valid {
            let Some(state) = self.users.record_login_failure(user.id, now, &self.policy).await? else {
                return Err(self.reject_login(username, "unknown_user", None, context));
            };

            if let Some(until) = state.locked_until(now) {
                tracing::warn!(user_id = %user.id, failed_attempts = state.failed_attempts(), "Account locked");
                audit_log(&AuditEvent::AccountLocked {
                    user_id: user.id,
                    username: user.username.clone(),
                    failed_attempts: state.failed_attempts(),
                    locked_until: until,
                    context: context.clone(),
                });
                audit_log(&AuditEvent::LoginFailure {
                    username,
                    reason: "invalid_password".to_string(),
                    failed_attempts: Some(state.failed_attempts()),
                    account_locked: true,
                    context,
                });
                return Err(AuthError::AccountLocked { until });
            }

            return Err(self.reject_login(
                username,
                "invalid_password",
                Some(state.failed_attempts()),
                context,
            ));
        }

        let Some(user) = self.users.record_login_success(user.id, now).await? else {
            return Err(self.reject_login(username, "unknown_user", None, context));
        };

        let token = issue_token(&self.jwt, user.id)?;

        audit_log(&AuditEvent::LoginSuccess {
            user_id: user.id,
            username: user.username.clone(),
            context,
        });

        Ok(Session { user, token })
    }

    /// Audit a login refused because the account is inside its lock window
    pub fn reject_locked(&self, username: String, until: DateTime<Utc>, context: RequestContext) -> AuthError {
        audit_log(&AuditEvent::LoginFailure {
            username,
            reason: "account_locked".to_string(),
            failed_attempts: None,
            account_locked: true,
            context,
        });
        AuthError::AccountLocked { until }
    }

    fn reject_login(
        &self,
        username: String,
        reason: &str,
        failed_attempts: Option<u32>,
        context: RequestContext,
    ) -> AuthError {
        audit_log(&AuditEvent::LoginFailure {
            username,
            reason: reason.to_string(),
            failed_attempts,
            account_locked: false,
            context,
        });
        AuthError::InvalidCredentials
    }

    /// Re-resolve a token's identity to a live, usable record
    pub async fn resolve_identity(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        if !user.is_active {
            return Err(AuthError::Deactivated);
        }
        if let Some(until) = user.lockout_state().locked_until(now) {
            return Err(AuthError::AccountLocked { until });
        }

        Ok(user)
    }

    /// Merge validated preference fields into the stored preferences
    pub async fn update_preferences(&self, user_id: Uuid, patch: &PreferencesPatch) -> Result<User, AuthError> {
        self.users
            .update_preferences(user_id, patch, Utc::now())
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Soft-delete an identity; its outstanding tokens stop resolving
    pub async fn deactivate(&self, user_id: Uuid, context: RequestContext) -> Result<(), AuthError> {
        if !self.users.deactivate(user_id, Utc::now()).await? {
            return Err(AuthError::UserNotFound);
        }

        audit_log(&AuditEvent::AccountDeactivated { user_id, context });
        Ok(())
    }

    /// Record a logout; the token itself is discarded client-side
    pub fn logout(&self, user_id: Uuid, context: RequestContext) {
        audit_log(&AuditEvent::Logout { user_id, context });
    }
}
