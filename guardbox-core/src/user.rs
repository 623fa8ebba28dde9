//! Users and linked provider accounts
//!
//! A [`User`] is the identity every other record hangs off of. An
//! [`Account`] links one external-provider identity (e.g. a Google subject)
//! to a user; a user may hold many accounts across providers, and the
//! (provider, key) pair is unique across the whole store.

use serde::{Deserialize, Serialize};

use crate::id::{USER_ID_PREFIX, generate_prefixed_id, validate_prefixed_id};

/// A unique, stable identifier for a specific user.
///
/// Treat this value as opaque; the prefix is a debugging aid, not a format
/// guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: &str) -> Self {
        UserId(id.to_string())
    }

    pub fn new_random() -> Self {
        UserId(generate_prefixed_id(USER_ID_PREFIX))
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_valid(&self) -> bool {
        validate_prefixed_id(&self.0, USER_ID_PREFIX)
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user identity.
///
/// `email` is optional but unique across users when present. A user created
/// through a provider that does not share an email address simply has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub email_verified: bool,
}

/// Value object for creating a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: Option<String>,
    pub email_verified: bool,
}

impl UserCreate {
    pub fn new(email: Option<String>, email_verified: bool) -> Self {
        Self {
            email,
            email_verified,
        }
    }
}

/// Partial update for a user. Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub email_verified: Option<bool>,
}

/// One external-provider identity linked to a user.
///
/// `metadata` is an opaque provider-specific payload; protocol adapters own
/// its shape and (de)serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub provider: String,
    pub key: String,
    pub metadata: Option<serde_json::Value>,
}

/// An account link payload before the owning user is known.
///
/// Passed alongside [`UserCreate`] so a sign-up and its provider link are
/// resolved in one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub provider: String,
    pub key: String,
    pub metadata: Option<serde_json::Value>,
}

impl NewAccount {
    pub fn new(provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            key: key.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Bind this link to its resolved owner.
    pub fn into_account(self, user_id: UserId) -> Account {
        Account {
            user_id,
            provider: self.provider,
            key: self.key,
            metadata: self.metadata,
        }
    }
}
