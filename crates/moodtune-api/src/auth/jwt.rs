//! Session token issuance and verification
//!
//! Tokens are HS256-signed JWTs carrying the identity id and an absolute
//! expiry. Nothing about issued tokens is stored server-side; verification
//! is a signature, issuer, and expiry check only. Clock skew is not
//! compensated.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use moodtune_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;

/// Claims embedded in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - identity id
    pub sub: String,
    /// Unique token id
    pub jti: String,
    /// Issued at (Unix seconds)
    pub iat: u64,
    /// Expiration (Unix seconds)
    pub exp: u64,
}

/// Why a token was rejected
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Malformed token")]
    Malformed,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Token signing settings
#[derive(Clone)]
pub struct JwtConfig {
    secret: String,
    /// Token lifetime in seconds
    pub expiration_secs: u64,
    pub issuer: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<String>, expiration_secs: u64, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            expiration_secs,
            issuer: issuer.into(),
        }
    }

    pub fn from_auth_config(auth: &AuthConfig) -> Self {
        Self::new(auth.jwt_secret.clone(), auth.token_expiration_secs, auth.issuer.clone())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("expiration_secs", &self.expiration_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Issue a token for `user_id` valid from now
pub fn issue_token(config: &JwtConfig, user_id: Uuid) -> Result<String, TokenError> {
    issue_token_at(config, user_id, unix_now()?)
}

/// Issue a token as if issued at `issued_at` (Unix seconds)
pub fn issue_token_at(config: &JwtConfig, user_id: Uuid, issued_at: u64) -> Result<String, TokenError> {
    let claims = Claims {
        iss: config.issuer.clone(),
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: issued_at,
        exp: issued_at.saturating_add(config.expiration_secs),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify a token and return the identity id it asserts
pub fn verify_token(config: &JwtConfig, token: &str) -> Result<Uuid, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(config.secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        })?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(secret: &str) -> JwtConfig {
        JwtConfig::new(secret, 604_800, "moodtune")
    }

    #[test]
    fn test_issue_and_verify_token() {
        let config = config("test-secret");
        let user_id = Uuid::new_v4();

        let token = issue_token(&config, user_id).expect("Failed to issue token");
        let verified = verify_token(&config, &token).expect("Failed to verify token");

        assert_eq!(verified, user_id);
    }

    #[test]
    fn test_malformed_token() {
        let config = config("test-secret");
        let result = verify_token(&config, "invalid.token.here");
        assert!(matches!(result, Err(TokenError::Malformed)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = issue_token(&config("secret1"), Uuid::new_v4()).unwrap();
        let result = verify_token(&config("secret2"), &token);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_expired_token() {
        let config = JwtConfig::new("test-secret", 3600, "moodtune");
        let now = unix_now().unwrap();

        // Issued 2 hours ago with a 1 hour lifetime
        let token = issue_token_at(&config, Uuid::new_v4(), now - 7200).unwrap();
        let result = verify_token(&config, &token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_issuer() {
        let token = issue_token(&JwtConfig::new("s", 60, "someone-else"), Uuid::new_v4()).unwrap();
        let result = verify_token(&JwtConfig::new("s", 60, "moodtune"), &token);
        assert!(matches!(result, Err(TokenError::Malformed)));
    }

    #[test]
    fn test_non_uuid_subject_rejected() {
        let config = config("test-secret");
        let now = unix_now().unwrap();
        let claims = Claims {
            iss: "moodtune".to_string(),
            sub: "not-a-uuid".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(matches!(verify_token(&config, &token), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", config("very-secret-key"));
        assert!(!debug.contains("very-secret-key"));
    }
}
