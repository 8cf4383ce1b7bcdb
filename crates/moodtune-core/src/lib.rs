//! MoodTune Core - Domain models, lockout rules, and store traits
//!
//! This crate defines the vocabulary shared by the store and API crates:
//! - Closed enums for moods, activities and genres
//! - Identity and playlist records
//! - The account lockout state machine
//! - Store traits for credentials and playlists
//! - Configuration management

pub mod config;
pub mod lockout;
pub mod store;

pub use config::{AppConfig, AuthConfig, ConfigError, Environment, StoreBackend};
pub use lockout::{LockoutPolicy, LockoutState};
pub use store::{PageRequest, PlaylistPage, PlaylistStore, StoreError, StoreResult, UserStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

// ============================================================================
// Closed enums
// ============================================================================

/// Error returned when a string is not a member of one of the closed enums
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Mood a playlist is generated for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Energetic,
    Calm,
    Focused,
    Romantic,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Energetic,
        Mood::Calm,
        Mood::Focused,
        Mood::Romantic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Focused => "focused",
            Mood::Romantic => "romantic",
        }
    }
}

/// Activity a playlist accompanies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Activity {
    WorkingOut,
    Studying,
    #[default]
    Relaxing,
    Commuting,
    Party,
    Sleep,
}

impl Activity {
    pub const ALL: [Activity; 6] = [
        Activity::WorkingOut,
        Activity::Studying,
        Activity::Relaxing,
        Activity::Commuting,
        Activity::Party,
        Activity::Sleep,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::WorkingOut => "working-out",
            Activity::Studying => "studying",
            Activity::Relaxing => "relaxing",
            Activity::Commuting => "commuting",
            Activity::Party => "party",
            Activity::Sleep => "sleep",
        }
    }
}

/// Music genre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Genre {
    Pop,
    Rock,
    HipHop,
    Jazz,
    Classical,
    Electronic,
    Country,
    #[serde(rename = "r&b")]
    RnB,
    Indie,
    Alternative,
}

impl Genre {
    pub const ALL: [Genre; 10] = [
        Genre::Pop,
        Genre::Rock,
        Genre::HipHop,
        Genre::Jazz,
        Genre::Classical,
        Genre::Electronic,
        Genre::Country,
        Genre::RnB,
        Genre::Indie,
        Genre::Alternative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::HipHop => "hip-hop",
            Genre::Jazz => "jazz",
            Genre::Classical => "classical",
            Genre::Electronic => "electronic",
            Genre::Country => "country",
            Genre::RnB => "r&b",
            Genre::Indie => "indie",
            Genre::Alternative => "alternative",
        }
    }
}

macro_rules! impl_closed_enum_str {
    ($ty:ty, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

impl_closed_enum_str!(Mood, "mood");
impl_closed_enum_str!(Activity, "activity");
impl_closed_enum_str!(Genre, "genre");

// ============================================================================
// Identity
// ============================================================================

/// Listening preferences attached to an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub favorite_genres: Vec<Genre>,
    pub default_mood: Mood,
    pub default_activity: Activity,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            favorite_genres: Vec::new(),
            default_mood: Mood::Happy,
            default_activity: Activity::Relaxing,
        }
    }
}

/// Partial update of [`Preferences`]; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferencesPatch {
    pub favorite_genres: Option<Vec<Genre>>,
    pub default_mood: Option<Mood>,
    pub default_activity: Option<Activity>,
}

impl PreferencesPatch {
    pub fn is_empty(&self) -> bool {
        self.favorite_genres.is_none() && self.default_mood.is_none() && self.default_activity.is_none()
    }

    /// Merge the present fields into `prefs`
    pub fn apply_to(&self, prefs: &mut Preferences) {
        if let Some(genres) = &self.favorite_genres {
            prefs.favorite_genres = genres.clone();
        }
        if let Some(mood) = self.default_mood {
            prefs.default_mood = mood;
        }
        if let Some(activity) = self.default_activity {
            prefs.default_activity = activity;
        }
    }
}

/// Durable account record
///
/// Never serialized: the API exposes a separate public view without the
/// secret hash and lockout fields.
#[derive(Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
    pub preferences: Preferences,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a fresh record with default preferences and `Unlocked(0)`
    pub fn new(new_user: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: new_user.username,
            password_hash: new_user.password_hash,
            preferences: Preferences::default(),
            is_active: true,
            last_login: None,
            failed_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn lockout_state(&self) -> LockoutState {
        LockoutState::from_fields(self.failed_attempts, self.locked_until)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("preferences", &self.preferences)
            .field("is_active", &self.is_active)
            .field("last_login", &self.last_login)
            .field("failed_attempts", &self.failed_attempts)
            .field("locked_until", &self.locked_until)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Input for creating an identity; the username is already canonical
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

// ============================================================================
// Playlists
// ============================================================================

/// Placeholder track entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub album: String,
    /// Duration in seconds
    pub duration: u32,
    pub image_url: String,
}

/// Playlist owned by exactly one identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub mood: Mood,
    pub activity: Activity,
    pub genres: Vec<Genre>,
    pub tracks: Vec<Track>,
    pub is_public: bool,
    pub ai_generated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Playlist {
    pub fn is_visible_to(&self, requester: Uuid) -> bool {
        self.owner_id == requester || self.is_public
    }
}

/// Partial update of a playlist's editable fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

impl PlaylistPatch {
    pub fn apply_to(&self, playlist: &mut Playlist, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            playlist.name = name.clone();
        }
        if let Some(description) = &self.description {
            playlist.description = description.clone();
        }
        if let Some(is_public) = self.is_public {
            playlist.is_public = is_public;
        }
        playlist.updated_at = now;
    }
}
