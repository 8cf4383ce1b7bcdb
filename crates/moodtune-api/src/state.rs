//! Shared server state: stores, auth service and request counters

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moodtune_core::{AppConfig, PlaylistStore, UserStore};
use parking_lot::Mutex;

use crate::auth::jwt::JwtConfig;
use crate::auth::password::PasswordHasherService;
use crate::auth::service::AuthService;
use crate::generator::{MoodPoolSelector, TrackSelector};

/// State handed to every handler and middleware
pub struct AppState {
    /// Validated configuration
    pub config: AppConfig,
    /// Credential store
    pub users: Arc<dyn UserStore>,
    /// Playlist record store
    pub playlists: Arc<dyn PlaylistStore>,
    pub auth: AuthService,
    /// Playlist track selection strategy
    pub selector: Arc<dyn TrackSelector>,
    /// Server start time
    pub start_time: Instant,
    /// Requests seen since startup
    pub request_count: AtomicU64,
    /// Responses served, by status code
    status_counts: Mutex<BTreeMap<u16, u64>>,
    /// Cleared while the server should not take traffic
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Create application state over the given stores
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserStore>,
        playlists: Arc<dyn PlaylistStore>,
        hasher: PasswordHasherService,
    ) -> Self {
        let auth = AuthService::new(
            users.clone(),
            hasher,
            JwtConfig::from_auth_config(&config.auth),
            config.auth.lockout_policy(),
        );

        Self {
            config,
            users,
            playlists,
            auth,
            selector: Arc::new(MoodPoolSelector::default()),
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
            status_counts: Mutex::new(BTreeMap::new()),
            is_ready: AtomicBool::new(true),
        }
    }

    /// Replace the track selection strategy
    pub fn with_selector(mut self, selector: Arc<dyn TrackSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Count one request, returning the previous total
    pub fn increment_requests(&self) -> u64 {
        self.request_count.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get_request_count(&self) -> u64 {
        self.request_count.load(Ordering::SeqCst)
    }

    pub fn record_status(&self, status: u16) {
        *self.status_counts.lock().entry(status).or_insert(0) += 1;
    }

    /// Snapshot of per-status response tallies
    pub fn status_counts(&self) -> BTreeMap<u16, u64> {
        self.status_counts.lock().clone()
    }

    /// Whole seconds since startup
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Toggle readiness; `/ready` answers 503 while false
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
