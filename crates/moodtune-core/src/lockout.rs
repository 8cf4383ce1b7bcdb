//! Account lockout state machine
//!
//! Tracks consecutive authentication failures for one identity and
//! computes temporary lock windows. The type is pure; stores persist it as
//! the `(failed_attempts, locked_until)` field pair and apply transitions
//! atomically.

use chrono::{DateTime, Duration, Utc};

/// Thresholds governing when an identity becomes locked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Consecutive failures that trigger a lock
    pub max_attempts: u32,
    /// How long a lock lasts
    pub lock_duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lock_duration: Duration::hours(2),
        }
    }
}

/// Lockout state of a single identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Unlocked { failed_attempts: u32 },
    /// `failed_attempts` is kept so the persisted counter survives the lock
    Locked {
        until: DateTime<Utc>,
        failed_attempts: u32,
    },
}

impl Default for LockoutState {
    fn default() -> Self {
        LockoutState::Unlocked { failed_attempts: 0 }
    }
}

impl LockoutState {
    /// Rebuild the state from persisted fields
    pub fn from_fields(failed_attempts: u32, locked_until: Option<DateTime<Utc>>) -> Self {
        match locked_until {
            Some(until) => LockoutState::Locked {
                until,
                failed_attempts,
            },
            None => LockoutState::Unlocked { failed_attempts },
        }
    }

    /// Persisted representation: `(failed_attempts, locked_until)`
    pub fn into_fields(self) -> (u32, Option<DateTime<Utc>>) {
        match self {
            LockoutState::Unlocked { failed_attempts } => (failed_attempts, None),
            LockoutState::Locked {
                until,
                failed_attempts,
            } => (failed_attempts, Some(until)),
        }
    }

    pub fn failed_attempts(&self) -> u32 {
        match self {
            LockoutState::Unlocked { failed_attempts } | LockoutState::Locked { failed_attempts, .. } => {
                *failed_attempts
            }
        }
    }

    /// Lock expiry, when a lock is still in force at `now`
    pub fn locked_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            LockoutState::Locked { until, .. } if *until > now => Some(*until),
            _ => None,
        }
    }

    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until(now).is_some()
    }

    /// Apply one failed authentication at `now`
    ///
    /// An active lock is left untouched. An elapsed lock restarts the
    /// counter, so the failure lands on `Unlocked(1)` (or re-locks when the
    /// policy threshold is 1).
    pub fn on_failure(self, now: DateTime<Utc>, policy: &LockoutPolicy) -> Self {
        let current = match self {
            LockoutState::Locked { until, .. } if until > now => return self,
            LockoutState::Locked { .. } => 0,
            LockoutState::Unlocked { failed_attempts } => failed_attempts,
        };

        let next = current.saturating_add(1);
        if next >= policy.max_attempts {
            LockoutState::Locked {
                until: now + policy.lock_duration,
                failed_attempts: next,
            }
        } else {
            LockoutState::Unlocked {
                failed_attempts: next,
            }
        }
    }

    /// Apply a successful authentication
    pub fn on_success(self) -> Self {
        LockoutState::default()
    }
}
