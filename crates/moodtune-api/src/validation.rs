//! Request validation pipeline
//!
//! Each endpoint has a request type that deserializes the raw body and a
//! `validate_*` function that runs every rule for that endpoint, collecting
//! all violations before rejecting. Successful validation yields a typed
//! command; handlers never see unvalidated input.

use std::collections::HashSet;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use moodtune_core::{Activity, Genre, Mood, PlaylistPatch, PreferencesPatch, User, UserStore};
use regex::Regex;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::AppError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 30;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const PLAYLIST_NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const PLAYLIST_MAX_GENRES: usize = 5;
pub const FAVORITE_GENRES_MAX: usize = 10;

const USERNAME_TAKEN: &str = "Username is already taken";

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern is valid"))
}

/// Trim and lowercase a username for lookup and storage
pub fn canonical_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Accumulated rule violations for one request
#[derive(Debug, Default)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn push(&mut self, message: impl Into<String>) {
        self.0.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_error(self) -> AppError {
        AppError::Validation(self.0)
    }
}

fn join_names<T: Copy>(values: &[T], name: impl Fn(T) -> &'static str) -> String {
    values.iter().map(|v| name(*v)).collect::<Vec<_>>().join(", ")
}

fn valid_moods() -> String {
    join_names(&Mood::ALL, |m| m.as_str())
}

fn valid_activities() -> String {
    join_names(&Activity::ALL, |a| a.as_str())
}

fn valid_genres() -> String {
    join_names(&Genre::ALL, |g| g.as_str())
}

/// Parse genre names, reporting every unknown entry in one violation
fn parse_genres(names: &[String], violations: &mut Violations, with_valid_list: bool) -> Vec<Genre> {
    let mut genres = Vec::with_capacity(names.len());
    let mut invalid = Vec::new();
    for name in names {
        match name.parse::<Genre>() {
            Ok(genre) => genres.push(genre),
            Err(_) => invalid.push(name.as_str()),
        }
    }

    if !invalid.is_empty() {
        let mut message = format!("Invalid genres: {}", invalid.join(", "));
        if with_valid_list {
            message.push_str(&format!(". Valid genres are: {}", valid_genres()));
        }
        violations.push(message);
    }
    genres
}

fn dedup_in_order(genres: Vec<Genre>) -> Vec<Genre> {
    let mut seen = HashSet::new();
    genres.into_iter().filter(|g| seen.insert(*g)).collect()
}

// ============================================================================
// Registration
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[schema(example = "alice_01")]
    pub username: Option<String>,
    #[schema(example = "longenough1")]
    pub password: Option<String>,
}

/// Validated registration; `username` is canonical
#[derive(Debug)]
pub struct Registration {
    pub username: String,
    pub password: String,
}

fn check_username_format(username: &str, violations: &mut Violations) {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        violations.push(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        ));
    }
    if !username_pattern().is_match(username) {
        violations.push("Username can only contain letters, numbers, and underscores");
    }
}

fn check_new_password(password: Option<&str>, violations: &mut Violations) {
    match password {
        None | Some("") => violations.push("Password is required"),
        Some(p) => {
            let len = p.chars().count();
            if len < PASSWORD_MIN_LEN {
                violations.push(format!("Password must be at least {PASSWORD_MIN_LEN} characters long"));
            }
            if len > PASSWORD_MAX_LEN {
                violations.push(format!("Password cannot exceed {PASSWORD_MAX_LEN} characters"));
            }
        }
    }
}

/// Validate a registration, including the username availability lookup
///
/// A taken username on an otherwise valid request is a conflict; alongside
/// other violations it is reported in the validation list.
pub async fn validate_registration(
    request: RegisterRequest,
    users: &dyn UserStore,
) -> Result<Registration, AppError> {
    let mut violations = Violations::default();
    let mut taken = false;

    let username = request
        .username
        .as_deref()
        .map(canonical_username)
        .filter(|u| !u.is_empty());

    match &username {
        None => violations.push("Username is required"),
        Some(username) => {
            check_username_format(username, &mut violations);
            if users.find_by_username(username).await?.is_some() {
                taken = true;
                violations.push(USERNAME_TAKEN);
            }
        }
    }

    check_new_password(request.password.as_deref(), &mut violations);

    match (username, request.password) {
        (Some(username), Some(password)) if violations.is_empty() => Ok(Registration { username, password }),
        _ if taken && violations.len() == 1 => Err(AppError::Conflict(USERNAME_TAKEN.to_string())),
        _ => Err(violations.into_error()),
    }
}

// ============================================================================
// Login
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    #[schema(example = "alice_01")]
    pub username: Option<String>,
    #[schema(example = "longenough1")]
    pub password: Option<String>,
}

/// Validated login attempt, carrying the identity record if one exists
pub struct LoginAttempt {
    pub username: String,
    pub password: String,
    pub user: Option<User>,
}

/// Validate a login and reject immediately when the account is locked
pub async fn validate_login(
    request: LoginRequest,
    users: &dyn UserStore,
    now: DateTime<Utc>,
) -> Result<LoginAttempt, AppError> {
    let mut violations = Violations::default();

    let username = request
        .username
        .as_deref()
        .map(canonical_username)
        .filter(|u| !u.is_empty());
    if username.is_none() {
        violations.push("Username is required");
    }

    let password = request.password.filter(|p| !p.is_empty());
    if password.is_none() {
        violations.push("Password is required");
    }

    let (Some(username), Some(password)) = (username, password) else {
        return Err(violations.into_error());
    };

    let user = users.find_by_username(&username).await?;
    if let Some(until) = user.as_ref().and_then(|u| u.lockout_state().locked_until(now)) {
        return Err(AppError::AccountLocked { until });
    }

    Ok(LoginAttempt {
        username,
        password,
        user,
    })
}

// ============================================================================
// Playlists
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GeneratePlaylistRequest {
    #[schema(example = "Gym")]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(example = "energetic")]
    pub mood: Option<String>,
    #[schema(example = "working-out")]
    pub activity: Option<String>,
    #[schema(example = json!(["rock"]))]
    pub genres: Option<Vec<String>>,
}

/// Validated playlist generation request
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRequest {
    pub name: String,
    pub description: Option<String>,
    pub mood: Mood,
    pub activity: Activity,
    pub genres: Vec<Genre>,
}

fn check_description(description: Option<&str>, violations: &mut Violations) {
    if description.is_some_and(|d| d.chars().count() > DESCRIPTION_MAX_LEN) {
        violations.push(format!("Description cannot exceed {DESCRIPTION_MAX_LEN} characters"));
    }
}

pub fn validate_playlist_request(request: GeneratePlaylistRequest) -> Result<PlaylistRequest, AppError> {
    let mut violations = Violations::default();

    let name = request.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    match name {
        None => violations.push("Playlist name is required"),
        Some(n) if n.chars().count() > PLAYLIST_NAME_MAX_LEN => {
            violations.push(format!("Playlist name cannot exceed {PLAYLIST_NAME_MAX_LEN} characters"))
        }
        Some(_) => {}
    }

    check_description(request.description.as_deref(), &mut violations);

    let mood = request.mood.as_deref().and_then(|m| m.parse::<Mood>().ok());
    if mood.is_none() {
        violations.push(format!("Valid mood is required. Must be one of: {}", valid_moods()));
    }

    let activity = request.activity.as_deref().and_then(|a| a.parse::<Activity>().ok());
    if activity.is_none() {
        violations.push(format!(
            "Valid activity is required. Must be one of: {}",
            valid_activities()
        ));
    }

    let genres = match request.genres.as_deref() {
        None | Some([]) => {
            violations.push("At least one genre must be selected");
            Vec::new()
        }
        Some(names) => {
            let genres = parse_genres(names, &mut violations, true);
            if names.len() > PLAYLIST_MAX_GENRES {
                violations.push(format!("Maximum {PLAYLIST_MAX_GENRES} genres can be selected"));
            }
            genres
        }
    };

    match (name, mood, activity) {
        (Some(name), Some(mood), Some(activity)) if violations.is_empty() => Ok(PlaylistRequest {
            name: name.to_string(),
            description: request.description.filter(|d| !d.trim().is_empty()),
            mood,
            activity,
            genres,
        }),
        _ => Err(violations.into_error()),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdatePlaylistRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

pub fn validate_playlist_update(request: UpdatePlaylistRequest) -> Result<PlaylistPatch, AppError> {
    let mut violations = Violations::default();

    let name = request.name.as_deref().map(str::trim);
    match name {
        Some("") => violations.push("Playlist name cannot be empty"),
        Some(n) if n.chars().count() > PLAYLIST_NAME_MAX_LEN => {
            violations.push(format!("Playlist name cannot exceed {PLAYLIST_NAME_MAX_LEN} characters"))
        }
        _ => {}
    }

    check_description(request.description.as_deref(), &mut violations);

    if !violations.is_empty() {
        return Err(violations.into_error());
    }

    Ok(PlaylistPatch {
        name: name.map(str::to_string),
        description: request.description,
        is_public: request.is_public,
    })
}

// ============================================================================
// Preferences
// ============================================================================

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    #[schema(example = json!(["jazz", "indie"]))]
    pub favorite_genres: Option<Vec<String>>,
    #[schema(example = "calm")]
    pub default_mood: Option<String>,
    #[schema(example = "studying")]
    pub default_activity: Option<String>,
}

/// Profile update body; only preferences are editable
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub preferences: Option<UpdatePreferencesRequest>,
}

pub fn validate_preferences(request: UpdatePreferencesRequest) -> Result<PreferencesPatch, AppError> {
    let mut violations = Violations::default();

    let favorite_genres = request.favorite_genres.as_deref().map(|names| {
        let genres = parse_genres(names, &mut violations, false);
        if names.len() > FAVORITE_GENRES_MAX {
            violations.push(format!("Maximum {FAVORITE_GENRES_MAX} favorite genres allowed"));
        }
        dedup_in_order(genres)
    });

    let default_mood = match request.default_mood.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<Mood>() {
            Ok(mood) => Some(mood),
            Err(_) => {
                violations.push(format!("Invalid mood. Must be one of: {}", valid_moods()));
                None
            }
        },
    };

    let default_activity = match request.default_activity.as_deref() {
        None => None,
        Some(raw) => match raw.parse::<Activity>() {
            Ok(activity) => Some(activity),
            Err(_) => {
                violations.push(format!("Invalid activity. Must be one of: {}", valid_activities()));
                None
            }
        },
    };

    if !violations.is_empty() {
        return Err(violations.into_error());
    }

    Ok(PreferencesPatch {
        favorite_genres,
        default_mood,
        default_activity,
    })
}
