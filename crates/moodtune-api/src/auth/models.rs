//! Authentication response shapes

use chrono::{DateTime, Utc};
use moodtune_core::{Preferences, User};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Public user information (without secret hash or lockout counters)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    #[schema(example = "alice_01")]
    pub username: String,
    pub preferences: Preferences,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserPublic {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            preferences: user.preferences.clone(),
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

impl From<User> for UserPublic {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// Registration and login response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    /// Token lifetime in seconds
    #[schema(example = 604800)]
    pub expires_in: u64,
    pub user: UserPublic,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub user: UserPublic,
}

impl UserResponse {
    pub fn new(user: impl Into<UserPublic>) -> Self {
        Self {
            message: None,
            user: user.into(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moodtune_core::NewUser;

    #[test]
    fn test_user_public_excludes_secrets() {
        let user = User::new(
            NewUser {
                username: "alice_01".to_string(),
                password_hash: "$argon2id$secret".to_string(),
            },
            Utc::now(),
        );

        let json = serde_json::to_value(UserPublic::from(&user)).unwrap();
        let text = json.to_string();
        assert!(!text.contains("argon2id"));
        assert!(json.get("failedAttempts").is_none());
        assert!(json.get("lockedUntil").is_none());
        assert_eq!(json["preferences"]["defaultMood"], "happy");
        assert!(json["lastLogin"].is_null());
    }
}
