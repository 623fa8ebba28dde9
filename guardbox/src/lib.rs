//! # Guardbox
//!
//! Guardbox is an embeddable authentication core for Rust applications. It
//! manages user identity, linked external-provider accounts, sliding-window
//! sessions, and single-use one-time tokens, independent of any storage
//! engine or web framework: storage backends implement the adapter contracts
//! from [`guardbox_core`], and the host application supplies a cookie
//! transport bound to the current request.
//!
//! The core deliberately does *not* implement cryptographic primitives,
//! password hashing, or authorization. Protocol adapters (OAuth2, WebAuthn)
//! are ordinary consumers of the facade's public surface, not part of it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guardbox::Guardbox;
//! use guardbox_core::UserCreate;
//! use guardbox_memory::{MemoryCookieJar, MemorySessionAdapter, MemoryUserAdapter};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let auth = Guardbox::new(
//!         "my-app",
//!         Arc::new(MemoryUserAdapter::new()),
//!         Arc::new(MemorySessionAdapter::new()),
//!         Arc::new(MemoryCookieJar::new()),
//!     );
//!
//!     let user = auth
//!         .create_user(UserCreate::new(Some("user@example.com".into()), false), None)
//!         .await?
//!         .expect("fresh email is never rejected");
//!
//!     let session = auth.create_session(&user.id).await?;
//!     auth.set_session(Some(&session)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info};

pub use guardbox_core::{
    Account, CookieJar, CookieOptions, Error, NewAccount, OnUserCreate, Otp, OtpAdapter,
    OtpCreate, OtpId, SameSite, Session, SessionAdapter, SessionDuration, SessionId, User,
    UserAdapter, UserCreate, UserId, UserUpdate,
};

use guardbox_core::error::ConfigError;

/// The authentication facade.
///
/// Composes a user adapter, a session adapter, an optional OTP adapter, and
/// a cookie transport into the identity, session-lifecycle, and one-time
/// token engines. Holds no cache and no background state: every read hits
/// the adapter, and all methods complete within the caller's request.
pub struct Guardbox<U, S, C>
where
    U: UserAdapter,
    S: SessionAdapter,
    C: CookieJar,
{
    app_name: String,
    users: Arc<U>,
    sessions: Arc<S>,
    otps: Option<Arc<dyn OtpAdapter>>,
    cookies: Arc<C>,
    session_duration: SessionDuration,
    default_otp_duration: Duration,
    cookie_options: CookieOptions,
    on_user_create: Option<Arc<dyn OnUserCreate>>,
}

impl<U, S, C> Guardbox<U, S, C>
where
    U: UserAdapter,
    S: SessionAdapter,
    C: CookieJar,
{
    /// Create a facade with the default session duration (24h active / 30d
    /// idle), a 1h default OTP duration, and no OTP adapter.
    pub fn new(
        app_name: impl Into<String>,
        users: Arc<U>,
        sessions: Arc<S>,
        cookies: Arc<C>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            users,
            sessions,
            otps: None,
            cookies,
            session_duration: SessionDuration::default(),
            default_otp_duration: Duration::hours(1),
            cookie_options: CookieOptions::default(),
            on_user_create: None,
        }
    }

    /// Enable OTP support with the given adapter.
    pub fn with_otp_adapter(mut self, otps: Arc<dyn OtpAdapter>) -> Self {
        self.otps = Some(otps);
        self
    }

    pub fn with_session_duration(mut self, duration: SessionDuration) -> Self {
        self.session_duration = duration;
        self
    }

    pub fn with_default_otp_duration(mut self, duration: Duration) -> Self {
        self.default_otp_duration = duration;
        self
    }

    /// Cookie attributes applied over every write, above per-call options.
    pub fn with_cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie_options = options;
        self
    }

    /// Hook invoked exactly once per newly created user.
    pub fn with_user_create_hook(mut self, hook: Arc<dyn OnUserCreate>) -> Self {
        self.on_user_create = Some(hook);
        self
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// The cookie key the session id is stored under.
    pub fn session_cookie_key(&self) -> String {
        format!("{}-guardbox-session", self.app_name)
    }

    pub fn session_duration(&self) -> &SessionDuration {
        &self.session_duration
    }

    pub fn default_otp_duration(&self) -> Duration {
        self.default_otp_duration
    }

    // ------------------------------------------------------------------
    // Cookie passthroughs
    //
    // Exposed so protocol adapters can stash transient state (an OAuth2
    // CSRF nonce, a WebAuthn challenge) under the same transport and
    // attribute policy as the session cookie.
    // ------------------------------------------------------------------

    pub async fn get_cookie(&self, key: &str) -> Result<Option<String>, Error> {
        self.cookies.get(key).await
    }

    /// Write a cookie. Effective attributes are the facade-wide overrides,
    /// over the per-call options, over the core defaults
    /// (`path=/; HttpOnly; Secure; SameSite=Lax`).
    pub async fn set_cookie(
        &self,
        key: &str,
        value: &str,
        options: CookieOptions,
    ) -> Result<(), Error> {
        let options = self.effective_cookie_options(options);
        self.cookies.set(key, value, options).await
    }

    pub async fn delete_cookie(&self, key: &str, options: CookieOptions) -> Result<(), Error> {
        let options = self.effective_cookie_options(options);
        self.cookies.delete(key, options).await
    }

    fn effective_cookie_options(&self, options: CookieOptions) -> CookieOptions {
        self.cookie_options
            .clone()
            .merged_over(&options)
            .merged_over(&CookieOptions::core_defaults())
    }

    // ------------------------------------------------------------------
    // Identity & account linking
    // ------------------------------------------------------------------

    /// Create a user, optionally linking a provider account in the same
    /// operation.
    ///
    /// If `value.email` already belongs to a user, the operation only
    /// proceeds when that user's email is verified, the incoming value is
    /// verified, *and* an account link was supplied — i.e. this is an
    /// account-linking attempt onto a verified identity. Anything else
    /// returns `Ok(None)` with no side effects, so an unverified sign-up
    /// cannot claim someone else's address.
    ///
    /// A unique-constraint violation on the (provider, key) link aborts the
    /// whole operation; no partial state is left behind beyond the already
    /// durable user row for a genuinely new sign-up.
    pub async fn create_user(
        &self,
        value: UserCreate,
        account: Option<NewAccount>,
    ) -> Result<Option<User>, Error> {
        let mut existing = None;
        if let Some(email) = &value.email {
            existing = self.users.get_user_by_email(email).await?;
        }

        if let Some(user) = &existing
            && (!user.email_verified || !value.email_verified || account.is_none())
        {
            debug!(user_id = %user.id, "rejected create_user for already-claimed email");
            return Ok(None);
        }

        let (user, newly_created) = match existing {
            Some(user) => (user, false),
            None => (self.users.create_user(value).await?, true),
        };

        let linked = match account {
            Some(account) => Some(
                self.users
                    .add_account(account.into_account(user.id.clone()))
                    .await?,
            ),
            None => None,
        };

        if newly_created {
            info!(user_id = %user.id, "created user");
            if let Some(hook) = &self.on_user_create {
                hook.on_user_create(&user, linked.as_ref()).await?;
            }
        }

        Ok(Some(user))
    }

    pub async fn get_user_by_id(&self, user_id: &UserId) -> Result<Option<User>, Error> {
        self.users.get_user_by_id(user_id).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        self.users.get_user_by_email(email).await
    }

    /// Merge the provided fields into an existing user. Fails with a
    /// storage `NotFound` error if the user does not exist.
    pub async fn update_user(&self, user_id: &UserId, value: UserUpdate) -> Result<User, Error> {
        self.users.update_user(user_id, value).await
    }

    /// Delete a user. Sessions, OTPs, and accounts are *not* cascaded;
    /// revoke them explicitly via [`Self::delete_user_sessions`],
    /// [`Self::delete_user_otps`], and [`Self::delete_account`].
    pub async fn delete_user(&self, user_id: &UserId) -> Result<(), Error> {
        self.users.delete_user(user_id).await
    }

    pub async fn add_account(&self, account: Account) -> Result<Account, Error> {
        self.users.add_account(account).await
    }

    pub async fn get_account(&self, provider: &str, key: &str) -> Result<Option<Account>, Error> {
        self.users.get_account(provider, key).await
    }

    pub async fn get_user_accounts(
        &self,
        user_id: &UserId,
        provider: Option<&str>,
    ) -> Result<Vec<Account>, Error> {
        self.users.get_user_accounts(user_id, provider).await
    }

    pub async fn update_account_metadata(
        &self,
        provider: &str,
        key: &str,
        metadata: serde_json::Value,
    ) -> Result<Option<Account>, Error> {
        self.users
            .update_account_metadata(provider, key, metadata)
            .await
    }

    pub async fn delete_account(&self, provider: &str, key: &str) -> Result<(), Error> {
        self.users.delete_account(provider, key).await
    }

    // ------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------

    /// Resolve the current session from the session cookie.
    ///
    /// - No cookie: `Ok(None)`, no adapter I/O.
    /// - Stale cookie (no matching record): clears the cookie, `Ok(None)`.
    /// - Active window still open: the record is returned untouched.
    /// - Active window passed, idle window open: the record is rotated — the
    ///   old record is deleted *before* the replacement becomes visible
    ///   through the cookie, so the old and new ids are never valid at the
    ///   same time. The caller receives the new record.
    /// - Idle window passed: record deleted, cookie cleared, `Ok(None)`.
    pub async fn get_session(&self) -> Result<Option<Session>, Error> {
        let Some(session_id) = self.get_cookie(&self.session_cookie_key()).await? else {
            return Ok(None);
        };
        let session_id = SessionId::from(session_id);

        let Some(session) = self.sessions.get_session(&session_id).await? else {
            debug!(session_id = %session_id, "stale session cookie, clearing");
            self.set_session(None).await?;
            return Ok(None);
        };

        if session.is_active() {
            return Ok(Some(session));
        }

        self.sessions.delete_session(&session.id).await?;

        if session.is_idle_expired() {
            debug!(session_id = %session.id, "session idle-expired");
            self.set_session(None).await?;
            return Ok(None);
        }

        let renewed = self.create_session(&session.user_id).await?;
        self.set_session(Some(&renewed)).await?;
        debug!(old = %session.id, new = %renewed.id, "session rotated");
        Ok(Some(renewed))
    }

    /// Create a session record. Does not touch the cookie; follow up with
    /// [`Self::set_session`] to make it the current one.
    pub async fn create_session(&self, user_id: &UserId) -> Result<Session, Error> {
        self.sessions
            .create_session(user_id, &self.session_duration)
            .await
    }

    /// Write (or with `None`, clear) the session cookie.
    ///
    /// The cookie's own expiry is pinned to the session's `idle_expires_at`
    /// so the browser drops it at the absolute ceiling; the server-side idle
    /// window is what actually governs validity.
    pub async fn set_session(&self, session: Option<&Session>) -> Result<(), Error> {
        let key = self.session_cookie_key();
        match session {
            Some(session) => {
                self.set_cookie(
                    &key,
                    session.id.as_str(),
                    CookieOptions {
                        expires: Some(session.idle_expires_at),
                        ..Default::default()
                    },
                )
                .await
            }
            None => self.delete_cookie(&key, CookieOptions::default()).await,
        }
    }

    pub async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.sessions.delete_session(session_id).await
    }

    /// Revoke every session of a user, independent of the current cookie.
    pub async fn delete_user_sessions(&self, user_id: &UserId) -> Result<(), Error> {
        self.sessions.delete_user_sessions(user_id).await
    }

    /// Delete the current session record and clear the cookie. A no-op when
    /// no session cookie is present.
    pub async fn sign_out(&self) -> Result<(), Error> {
        if let Some(session_id) = self.get_cookie(&self.session_cookie_key()).await? {
            self.delete_session(&SessionId::from(session_id)).await?;
            self.set_session(None).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // One-time tokens
    // ------------------------------------------------------------------

    fn otp_adapter(&self) -> Result<&Arc<dyn OtpAdapter>, Error> {
        self.otps
            .as_ref()
            .ok_or_else(|| ConfigError::OtpAdapterMissing.into())
    }

    /// Issue a one-time token with the facade's default OTP duration.
    pub async fn create_otp(&self, value: OtpCreate) -> Result<Otp, Error> {
        self.create_otp_with_duration(value, self.default_otp_duration)
            .await
    }

    /// Issue a one-time token with a custom duration.
    pub async fn create_otp_with_duration(
        &self,
        value: OtpCreate,
        expires_in: Duration,
    ) -> Result<Otp, Error> {
        self.otp_adapter()?.create_otp(value, expires_in).await
    }

    /// Verify and consume a one-time token.
    ///
    /// Returns `Ok(None)` for an unknown id or a `kind` mismatch — a
    /// mismatch never reveals whether the id existed, and leaves the token
    /// in place. A matching token is deleted *before* the expiry check, so
    /// even a token that turns out to be expired is consumed and a second
    /// concurrent verification of the same id finds nothing.
    pub async fn verify_otp(&self, otp_id: &OtpId, kind: &str) -> Result<Option<Otp>, Error> {
        let otps = self.otp_adapter()?;

        let Some(otp) = otps.get_otp(otp_id).await? else {
            return Ok(None);
        };
        if otp.kind != kind {
            return Ok(None);
        }

        otps.delete_otp(&otp.id).await?;

        if otp.is_expired() {
            debug!(otp_id = %otp.id, kind = %otp.kind, "otp expired at verification");
            return Ok(None);
        }
        debug!(otp_id = %otp.id, kind = %otp.kind, "otp verified and consumed");
        Ok(Some(otp))
    }

    pub async fn delete_otp(&self, otp_id: &OtpId) -> Result<(), Error> {
        self.otp_adapter()?.delete_otp(otp_id).await
    }

    /// Delete a user's tokens; `kind = None` deletes tokens of every kind.
    pub async fn delete_user_otps(
        &self,
        user_id: &UserId,
        kind: Option<&str>,
    ) -> Result<(), Error> {
        self.otp_adapter()?.delete_user_otps(user_id, kind).await
    }
}
