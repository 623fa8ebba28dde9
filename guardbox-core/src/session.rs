//! Sliding-window sessions
//!
//! A session carries two expiry horizons. The *active* horizon is short:
//! once it passes, the session is silently replaced with a fresh record
//! rather than invalidated. The *idle* horizon is the absolute ceiling:
//! once it passes, the session is gone no matter what. The split lets the
//! active window bound how long a leaked id stays usable while the idle
//! window bounds total session lifetime.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{SESSION_ID_PREFIX, generate_prefixed_id, validate_prefixed_id};
use crate::user::UserId;

/// Opaque session token, also the session record's primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: &str) -> Self {
        SessionId(id.to_string())
    }

    pub fn new_random() -> Self {
        SessionId(generate_prefixed_id(SESSION_ID_PREFIX))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, SESSION_ID_PREFIX)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two expiry windows applied to every new session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionDuration {
    /// Horizon after which the session is silently rotated.
    pub active: Duration,
    /// Horizon after which the session is invalidated outright.
    pub idle: Duration,
}

impl SessionDuration {
    pub fn new(active: Duration, idle: Duration) -> Self {
        Self { active, idle }
    }
}

impl Default for SessionDuration {
    fn default() -> Self {
        Self {
            active: Duration::hours(24),
            idle: Duration::days(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub active_expires_at: DateTime<Utc>,
    pub idle_expires_at: DateTime<Utc>,
}

impl Session {
    /// Build a fresh session for `user_id` with both windows anchored at now.
    ///
    /// `idle_expires_at` sits at `now + active + idle`, so the idle window
    /// opens where the active window closes.
    pub fn new(user_id: UserId, duration: &SessionDuration) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new_random(),
            user_id,
            active_expires_at: now + duration.active,
            idle_expires_at: now + duration.active + duration.idle,
        }
    }

    /// The active window has not passed; the session is valid as-is.
    pub fn is_active(&self) -> bool {
        Utc::now() < self.active_expires_at
    }

    /// The idle window has passed; the session is unrecoverable.
    pub fn is_idle_expired(&self) -> bool {
        self.idle_expires_at < Utc::now()
    }
}
