//! Storage adapter contracts
//!
//! Three independent capability traits — [`UserAdapter`], [`SessionAdapter`],
//! [`OtpAdapter`] — that storage backends implement. A deployment may omit
//! the OTP adapter; the facade then rejects OTP operations with a
//! configuration error.
//!
//! Contract notes for implementers:
//!
//! - Lookups return `Ok(None)` when a record is absent; errors are reserved
//!   for storage failures.
//! - `add_account` must enforce uniqueness of the (provider, key) pair and
//!   surface violations as [`StorageError::Constraint`]. The facade relies on
//!   this to abort account linking with no partial state.
//! - `delete_otp` must be unconditional and idempotent: deleting a token that
//!   is already gone succeeds. The facade's at-most-one-verification
//!   guarantee under concurrent attempts rests on this.
//! - Ids are generated by the adapter. Use the generators in [`crate::id`]
//!   (CSPRNG-backed) rather than anything guessable.
//!
//! [`StorageError::Constraint`]: crate::error::StorageError::Constraint

use async_trait::async_trait;
use chrono::Duration;

use crate::{
    Error,
    otp::{Otp, OtpCreate, OtpId},
    session::{Session, SessionDuration, SessionId},
    user::{Account, User, UserCreate, UserId, UserUpdate},
};

/// Storage capability for users and their linked provider accounts.
#[async_trait]
pub trait UserAdapter: Send + Sync + 'static {
    /// Create a new user with a fresh opaque id.
    async fn create_user(&self, value: UserCreate) -> Result<User, Error>;

    /// Find a user by id.
    async fn get_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, Error>;

    /// Find a user by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    /// Merge the provided fields into an existing user.
    ///
    /// Fails with [`StorageError::NotFound`] if the user does not exist.
    ///
    /// [`StorageError::NotFound`]: crate::error::StorageError::NotFound
    async fn update_user(&self, user_id: &UserId, value: UserUpdate) -> Result<User, Error>;

    /// Delete a user. Does not cascade to sessions, OTPs, or accounts.
    async fn delete_user(&self, user_id: &UserId) -> Result<(), Error>;

    /// Store an account link. The (provider, key) pair is unique.
    async fn add_account(&self, account: Account) -> Result<Account, Error>;

    /// Find an account by its (provider, key) pair.
    async fn get_account(&self, provider: &str, key: &str) -> Result<Option<Account>, Error>;

    /// List a user's accounts, optionally narrowed to one provider.
    async fn get_user_accounts(
        &self,
        user_id: &UserId,
        provider: Option<&str>,
    ) -> Result<Vec<Account>, Error>;

    /// Replace the opaque metadata payload on an account.
    async fn update_account_metadata(
        &self,
        provider: &str,
        key: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Account>, Error>;

    /// Delete an account link by its (provider, key) pair.
    async fn delete_account(&self, provider: &str, key: &str) -> Result<(), Error>;
}

/// Storage capability for sessions.
#[async_trait]
pub trait SessionAdapter: Send + Sync + 'static {
    /// Create a session for `user_id` with windows derived from `duration`.
    async fn create_session(
        &self,
        user_id: &UserId,
        duration: &SessionDuration,
    ) -> Result<Session, Error>;

    /// Find a session by id. Expiry is the facade's concern, not the
    /// adapter's: expired records are returned as stored.
    async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, Error>;

    /// Delete a session by id.
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error>;

    /// Delete every session owned by `user_id` (revoke-all-devices).
    async fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), Error>;
}

/// Storage capability for one-time tokens. Optional: a deployment without
/// OTP flows simply configures no adapter.
#[async_trait]
pub trait OtpAdapter: Send + Sync + 'static {
    /// Create a token expiring `expires_in` from now.
    async fn create_otp(&self, value: OtpCreate, expires_in: Duration) -> Result<Otp, Error>;

    /// Find a token by id, expired or not.
    async fn get_otp(&self, otp_id: &OtpId) -> Result<Option<Otp>, Error>;

    /// Delete a token. Idempotent: deleting an absent token succeeds.
    async fn delete_otp(&self, otp_id: &OtpId) -> Result<(), Error>;

    /// Delete a user's tokens, optionally narrowed to one kind.
    async fn delete_user_otps(&self, user_id: &UserId, kind: Option<&str>) -> Result<(), Error>;
}

/// Side-effect hook invoked exactly once per newly created user, after any
/// account link has been durably stored. Not invoked when `create_user`
/// resolves to an existing user.
#[async_trait]
pub trait OnUserCreate: Send + Sync + 'static {
    async fn on_user_create(&self, user: &User, account: Option<&Account>) -> Result<(), Error>;
}
