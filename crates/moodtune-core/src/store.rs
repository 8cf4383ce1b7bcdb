//! Store traits for identities and playlists
//!
//! Implementations live in `moodtune-store`. Every method that changes
//! lockout or login fields must be atomic at the store boundary: callers
//! never read-modify-write those fields themselves.

use crate::lockout::{LockoutPolicy, LockoutState};
use crate::{NewUser, Playlist, PlaylistPatch, PreferencesPatch, User};
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Store-level errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Offset/limit window for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

/// One page of playlists plus the total count for the owner
#[derive(Debug, Clone)]
pub struct PlaylistPage {
    pub items: Vec<Playlist>,
    pub total: u64,
}

/// Credential store
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new identity; fails with [`StoreError::DuplicateUsername`]
    /// when the canonical username is taken
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> StoreResult<User>;

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Atomically apply one failed authentication and return the new state
    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> StoreResult<Option<LockoutState>>;

    /// Atomically reset lockout fields and stamp `last_login`
    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<User>>;

    async fn update_preferences(
        &self,
        id: Uuid,
        patch: &PreferencesPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    /// Soft delete; returns false when no such identity exists
    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

    /// Cheap liveness probe used by readiness checks
    async fn ping(&self) -> StoreResult<()>;
}

/// Playlist record store
///
/// Mutations and owned listings are always scoped by owner; a lookup by id
/// alone is never offered.
#[async_trait::async_trait]
pub trait PlaylistStore: Send + Sync {
    async fn create(&self, playlist: Playlist) -> StoreResult<Playlist>;

    /// Owner's playlists, newest first
    async fn list_owned(&self, owner: Uuid, page: PageRequest) -> StoreResult<PlaylistPage>;

    async fn count_owned(&self, owner: Uuid) -> StoreResult<u64>;

    /// Fetch when owned by `requester` or public
    async fn find_visible(&self, id: Uuid, requester: Uuid) -> StoreResult<Option<Playlist>>;

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &PlaylistPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Playlist>>;

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<bool>;
}
