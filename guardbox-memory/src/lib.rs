//! In-memory storage backend for guardbox
//!
//! Reference implementations of the three adapter contracts plus a cookie
//! jar, backed by concurrent maps. Intended for tests, examples, and
//! prototyping; nothing here persists across process restarts.
//!
//! The adapters still honor the contract details real backends must provide:
//! `add_account` enforces (provider, key) uniqueness atomically, and
//! `delete_otp` is an unconditional idempotent remove.

use async_trait::async_trait;
use chrono::Duration;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use guardbox_core::{
    Account, CookieJar, CookieOptions, Error, Otp, OtpAdapter, OtpCreate, OtpId, Session,
    SessionAdapter, SessionDuration, SessionId, User, UserAdapter, UserCreate, UserId, UserUpdate,
    error::StorageError,
};

/// In-memory user and account store.
#[derive(Default)]
pub struct MemoryUserAdapter {
    users: DashMap<UserId, User>,
    // Keyed by (provider, key); the map key is the uniqueness constraint.
    accounts: DashMap<(String, String), Account>,
}

impl MemoryUserAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserAdapter for MemoryUserAdapter {
    async fn create_user(&self, value: UserCreate) -> Result<User, Error> {
        let user = User {
            id: UserId::new_random(),
            email: value.email,
            email_verified: value.email_verified,
        };
        self.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        Ok(self.users.get(user_id).map(|user| user.value().clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.value().email.as_deref() == Some(email))
            .map(|entry| entry.value().clone()))
    }

    async fn update_user(&self, user_id: &UserId, value: UserUpdate) -> Result<User, Error> {
        let mut user = self
            .users
            .get_mut(user_id)
            .ok_or(StorageError::NotFound)?;
        if let Some(email) = value.email {
            user.email = Some(email);
        }
        if let Some(email_verified) = value.email_verified {
            user.email_verified = email_verified;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.users.remove(user_id);
        Ok(())
    }

    async fn add_account(&self, account: Account) -> Result<Account, Error> {
        if !self.users.contains_key(&account.user_id) {
            return Err(StorageError::NotFound.into());
        }
        // The entry API makes the uniqueness check and insert one atomic step.
        match self
            .accounts
            .entry((account.provider.clone(), account.key.clone()))
        {
            Entry::Occupied(_) => Err(StorageError::Constraint(format!(
                "account ({}, {}) already exists",
                account.provider, account.key
            ))
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(account)
            }
        }
    }

    async fn get_account(&self, provider: &str, key: &str) -> Result<Option<Account>, Error> {
        Ok(self
            .accounts
            .get(&(provider.to_string(), key.to_string()))
            .map(|account| account.value().clone()))
    }

    async fn get_user_accounts(
        &self,
        user_id: &UserId,
        provider: Option<&str>,
    ) -> Result<Vec<Account>, Error> {
        Ok(self
            .accounts
            .iter()
            .filter(|entry| {
                let account = entry.value();
                account.user_id == *user_id
                    && provider.is_none_or(|provider| account.provider == provider)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_account_metadata(
        &self,
        provider: &str,
        key: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Account>, Error> {
        match self
            .accounts
            .get_mut(&(provider.to_string(), key.to_string()))
        {
            Some(mut account) => {
                account.metadata = Some(metadata);
                Ok(Some(account.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_account(&self, provider: &str, key: &str) -> Result<(), Error> {
        self.accounts
            .remove(&(provider.to_string(), key.to_string()));
        Ok(())
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionAdapter {
    sessions: DashMap<SessionId, Session>,
}

impl MemorySessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionAdapter for MemorySessionAdapter {
    async fn create_session(
        &self,
        user_id: &UserId,
        duration: &SessionDuration,
    ) -> Result<Session, Error> {
        let session = Session::new(user_id.clone(), duration);
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, Error> {
        Ok(self.sessions.get(session_id).map(|session| session.value().clone()))
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), Error> {
        self.sessions
            .retain(|_, session| session.user_id != *user_id);
        Ok(())
    }
}

/// In-memory one-time token store.
#[derive(Default)]
pub struct MemoryOtpAdapter {
    otps: DashMap<OtpId, Otp>,
}

impl MemoryOtpAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpAdapter for MemoryOtpAdapter {
    async fn create_otp(&self, value: OtpCreate, expires_in: Duration) -> Result<Otp, Error> {
        let otp = Otp::new(value, expires_in);
        self.otps.insert(otp.id.clone(), otp.clone());
        Ok(otp)
    }

    async fn get_otp(&self, otp_id: &OtpId) -> Result<Option<Otp>, Error> {
        Ok(self.otps.get(otp_id).map(|otp| otp.value().clone()))
    }

    async fn delete_otp(&self, otp_id: &OtpId) -> Result<(), Error> {
        // Unconditional and idempotent: a concurrent verifier that lost the
        // race simply finds nothing.
        self.otps.remove(otp_id);
        Ok(())
    }

    async fn delete_user_otps(&self, user_id: &UserId, kind: Option<&str>) -> Result<(), Error> {
        self.otps.retain(|_, otp| {
            let owned = otp.user_id.as_ref() == Some(user_id);
            let kind_matches = kind.is_none_or(|kind| otp.kind == kind);
            !(owned && kind_matches)
        });
        Ok(())
    }
}

/// A cookie recorded by [`MemoryCookieJar`], attributes included, so tests
/// can assert on what would have been written to the response.
#[derive(Debug, Clone)]
pub struct StoredCookie {
    pub value: String,
    pub options: CookieOptions,
}

/// In-memory cookie transport for tests and examples.
#[derive(Default)]
pub struct MemoryCookieJar {
    cookies: DashMap<String, StoredCookie>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored cookie with its write attributes, if present.
    pub fn stored(&self, key: &str) -> Option<StoredCookie> {
        self.cookies.get(key).map(|cookie| cookie.value().clone())
    }
}

#[async_trait]
impl CookieJar for MemoryCookieJar {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.cookies.get(key).map(|cookie| cookie.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, options: CookieOptions) -> Result<(), Error> {
        self.cookies.insert(
            key.to_string(),
            StoredCookie {
                value: value.to_string(),
                options,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str, _options: CookieOptions) -> Result<(), Error> {
        self.cookies.remove(key);
        Ok(())
    }
}
