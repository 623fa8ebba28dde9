//! One-time tokens
//!
//! An [`Otp`] is a short-lived, single-use token keyed by an
//! application-defined `kind` (e.g. `"magiclink"`, `"verify_email"`). It may
//! be bound to a user and may carry an opaque `state` payload such as the
//! email address a magic link should verify. Tokens can be issued before a
//! user exists, so `user_id` is optional.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{OTP_ID_PREFIX, generate_prefixed_id, validate_prefixed_id};
use crate::user::UserId;

/// Opaque one-time token id. The id is the secret, so it carries the same
/// entropy requirements as a session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OtpId(String);

impl OtpId {
    pub fn new(id: &str) -> Self {
        OtpId(id.to_string())
    }

    pub fn new_random() -> Self {
        OtpId(generate_prefixed_id(OTP_ID_PREFIX))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, OTP_ID_PREFIX)
    }
}

impl Default for OtpId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for OtpId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OtpId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for OtpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Otp {
    pub id: OtpId,
    pub kind: String,
    pub user_id: Option<UserId>,
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Otp {
    /// Build a fresh token expiring `expires_in` from now.
    pub fn new(value: OtpCreate, expires_in: Duration) -> Self {
        Self {
            id: OtpId::new_random(),
            kind: value.kind,
            user_id: value.user_id,
            state: value.state,
            expires_at: Utc::now() + expires_in,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

/// Value object for issuing a one-time token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpCreate {
    pub kind: String,
    pub user_id: Option<UserId>,
    pub state: Option<String>,
}

impl OtpCreate {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            user_id: None,
            state: None,
        }
    }

    pub fn user_id(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}
