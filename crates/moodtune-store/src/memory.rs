//! In-memory store backend
//!
//! [`MemoryStore`] keeps identities and playlists behind
//! [`parking_lot::RwLock`]s. Every lockout transition is applied while the
//! write guard is held, which makes it atomic with respect to concurrent
//! logins on the same identity.
//!
//! Data is not persisted; everything is lost when the process exits.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use moodtune_core::{
    LockoutPolicy, LockoutState, NewUser, PageRequest, Playlist, PlaylistPage, PlaylistPatch, PlaylistStore,
    PreferencesPatch, StoreError, StoreResult, User, UserStore,
};

#[derive(Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    /// Lowercased username to id
    by_username: HashMap<String, Uuid>,
}

/// In-memory store implementing both [`UserStore`] and [`PlaylistStore`]
///
/// Cheaply cloneable; all clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<UserTable>>,
    playlists: Arc<RwLock<HashMap<Uuid, Playlist>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.users.read().by_id.len()
    }

    fn modify_user<T>(&self, id: Uuid, f: impl FnOnce(&mut User) -> T) -> Option<T> {
        let mut table = self.users.write();
        table.by_id.get_mut(&id).map(f)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create(&self, new_user: NewUser, now: DateTime<Utc>) -> StoreResult<User> {
        let key = new_user.username.to_lowercase();
        let mut table = self.users.write();
        if table.by_username.contains_key(&key) {
            return Err(StoreError::DuplicateUsername);
        }

        let user = User::new(new_user, now);
        table.by_username.insert(key, user.id);
        table.by_id.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let table = self.users.read();
        Ok(table
            .by_username
            .get(&username.to_lowercase())
            .and_then(|id| table.by_id.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().by_id.get(&id).cloned())
    }

    async fn record_login_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        policy: &LockoutPolicy,
    ) -> StoreResult<Option<LockoutState>> {
        Ok(self.modify_user(id, |user| {
            let next = user.lockout_state().on_failure(now, policy);
            if next != user.lockout_state() {
                let (attempts, until) = next.into_fields();
                user.failed_attempts = attempts;
                user.locked_until = until;
                user.updated_at = now;
            }
            next
        }))
    }

    async fn record_login_success(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<User>> {
        Ok(self.modify_user(id, |user| {
            let (attempts, until) = user.lockout_state().on_success().into_fields();
            user.failed_attempts = attempts;
            user.locked_until = until;
            user.last_login = Some(now);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn update_preferences(
        &self,
        id: Uuid,
        patch: &PreferencesPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        Ok(self.modify_user(id, |user| {
            patch.apply_to(&mut user.preferences);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn deactivate(&self, id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .modify_user(id, |user| {
                user.is_active = false;
                user.updated_at = now;
            })
            .is_some())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl PlaylistStore for MemoryStore {
    async fn create(&self, playlist: Playlist) -> StoreResult<Playlist> {
        let mut playlists = self.playlists.write();
        if playlists.contains_key(&playlist.id) {
            return Err(StoreError::Backend(format!("playlist {} already exists", playlist.id)));
        }
        playlists.insert(playlist.id, playlist.clone());
        Ok(playlist)
    }

    async fn list_owned(&self, owner: Uuid, page: PageRequest) -> StoreResult<PlaylistPage> {
        let playlists = self.playlists.read();
        let mut owned: Vec<&Playlist> = playlists.values().filter(|p| p.owner_id == owner).collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = owned.len() as u64;
        let items = owned
            .into_iter()
            .skip(usize::try_from(page.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(page.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect();

        Ok(PlaylistPage { items, total })
    }

    async fn count_owned(&self, owner: Uuid) -> StoreResult<u64> {
        Ok(self.playlists.read().values().filter(|p| p.owner_id == owner).count() as u64)
    }

    async fn find_visible(&self, id: Uuid, requester: Uuid) -> StoreResult<Option<Playlist>> {
        Ok(self
            .playlists
            .read()
            .get(&id)
            .filter(|p| p.is_visible_to(requester))
            .cloned())
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        patch: &PlaylistPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Playlist>> {
        let mut playlists = self.playlists.write();
        Ok(playlists.get_mut(&id).filter(|p| p.owner_id == owner).map(|p| {
            patch.apply_to(p, now);
            p.clone()
        }))
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> StoreResult<bool> {
        let mut playlists = self.playlists.write();
        match playlists.get(&id) {
            Some(p) if p.owner_id == owner => {
                playlists.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
