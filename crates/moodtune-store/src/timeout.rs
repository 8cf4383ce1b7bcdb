//! Timeout decorator for stores
//!
//! [`TimeoutStore`] wraps any [`UserStore`]/[`PlaylistStore`] and bounds each
//! call with `tokio::time::timeout`. An elapsed deadline surfaces as
//! [`StoreError::Timeout`] instead of a hung request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use moodtune_core::{
    LockoutPolicy, LockoutState, NewUser, PageRequest, Playlist, PlaylistPage, PlaylistPatch, PlaylistStore,
    PreferencesPatch, StoreError, StoreResult, User, UserStore,
};

/// Store wrapper that enforces a per-call deadline
#[derive(Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S> TimeoutStore<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

/// Run `operation` under `limit`
pub(crate) async fn with_timeout<T, Fut>(limit: Duration, op_name: &'static str, operation: Fut) -> StoreResult<T>
where
    Fut: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation = op_name, timeout_ms = limit.as_millis() as u64, "Store operation timed out");
            Err(StoreError::Timeout(limit))
        }
    }
}

#[async_trait]
impl<S: UserStore> UserStore for TimeoutStore<S> {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        with_timeout(self.limit, "create_user", UserStore::create(&self.inner, new_user, now)).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        with_timeout(self.limit, "find_by_username", self.inner.find_by_username(username)).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        with_timeout(self.limit, "find_by_id", self.inner.find_by_id(id)).await
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> StoreResult<Option<LockoutState>> {
        with_timeout(
            self.limit,
            "record_login_failure",
            self.inner.record_login_failure(id, now, policy),
        )
        .await
    }

    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        with_timeout(self.limit, "record_login_success", self.inner.record_login_success(id, now)).await
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        patch: &PreferencesPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        with_timeout(
            self.limit,
            "update_preferences",
            self.inner.update_preferences(id, patch, now),
        )
        .await
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        with_timeout(self.limit, "deactivate", self.inner.deactivate(id, now)).await
    }

    async fn ping(&self) -> StoreResult<()> {
        with_timeout(self.limit, "ping", self.inner.ping()).await
    }
}

#[async_trait]
impl<S: PlaylistStore> PlaylistStore for TimeoutStore<S> {
    async fn create(&self, playlist: Playlist) -> StoreResult<Playlist> {
        with_timeout(self.limit, "create_playlist", PlaylistStore::create(&self.inner, playlist)).await
    }

    async fn list_owned(&self, owner: Uuid, page: PageRequest) -> StoreResult<PlaylistPage> {
        with_timeout(self.limit, "list_owned", self.inner.list_owned(owner, page)).await
    }

    async fn count_owned(&self, owner: Uuid) -> StoreResult<u64> {
        with_timeout(self.limit, "count_owned", self.inner.count_owned(owner)).await
    }

    async fn find_visible(&self, id: Uuid, requester: Uuid) -> StoreResult<Option<Playlist>> {
        with_timeout(self.limit, "find_visible", self.inner.find_visible(id, requester)).await
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &PlaylistPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Playlist>> {
        with_timeout(
            self.limit,
            "update_owned",
            self.inner.update_owned(id, owner, patch, now),
        )
        .await
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        with_timeout(self.limit, "delete_owned", self.inner.delete_owned(id, owner)).await
    }
}
