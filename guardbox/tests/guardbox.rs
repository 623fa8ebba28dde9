use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Duration;
use guardbox::{
    Account, CookieJar, CookieOptions, Error, Guardbox, NewAccount, OnUserCreate, OtpAdapter,
    OtpCreate, SessionAdapter, SessionDuration, User, UserCreate,
};
use guardbox_core::error::{ConfigError, StorageError};
use guardbox_memory::{MemoryCookieJar, MemoryOtpAdapter, MemorySessionAdapter, MemoryUserAdapter};

type TestGuardbox = Guardbox<MemoryUserAdapter, MemorySessionAdapter, MemoryCookieJar>;

struct TestHarness {
    auth: TestGuardbox,
    sessions: Arc<MemorySessionAdapter>,
    otps: Arc<MemoryOtpAdapter>,
    jar: Arc<MemoryCookieJar>,
}

fn harness(duration: SessionDuration) -> TestHarness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let sessions = Arc::new(MemorySessionAdapter::new());
    let otps = Arc::new(MemoryOtpAdapter::new());
    let jar = Arc::new(MemoryCookieJar::new());

    let auth = Guardbox::new(
        "guardbox",
        Arc::new(MemoryUserAdapter::new()),
        sessions.clone(),
        jar.clone(),
    )
    .with_session_duration(duration)
    .with_otp_adapter(otps.clone());

    TestHarness {
        auth,
        sessions,
        otps,
        jar,
    }
}

async fn signed_in_user(auth: &TestGuardbox) -> User {
    let user = auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), false),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    let session = auth.create_session(&user.id).await.unwrap();
    auth.set_session(Some(&session)).await.unwrap();
    user
}

// ---------------------------------------------------------------------
// Identity & account linking
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_create_user_roundtrip() {
    let h = harness(SessionDuration::default());

    let user = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.email.as_deref(), Some("email@example.com"));
    assert!(user.email_verified);

    let by_id = h.auth.get_user_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(by_id, user);
    let by_email = h
        .auth
        .get_user_by_email("email@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email, user);
}

#[tokio::test]
async fn test_create_user_with_account() {
    let h = harness(SessionDuration::default());

    let user = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            Some(NewAccount::new("provider_name", "id")),
        )
        .await
        .unwrap()
        .unwrap();

    let account = h
        .auth
        .get_account("provider_name", "id")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.user_id, user.id);
    assert_eq!(account.provider, "provider_name");
    assert_eq!(account.key, "id");
}

#[tokio::test]
async fn test_link_account_onto_verified_identity() {
    let h = harness(SessionDuration::default());

    let user = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    // Same verified email with an account link resolves to the same user.
    let linked = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            Some(NewAccount::new("provider_name", "id")),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.id, user.id);

    let account = h
        .auth
        .get_account("provider_name", "id")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.user_id, user.id);
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let h = harness(SessionDuration::default());

    h.auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    // Duplicate email without an account link: rejected even when verified.
    let dup = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), true),
            None,
        )
        .await
        .unwrap();
    assert!(dup.is_none());

    // Incoming value unverified: rejected despite the account link.
    let dup = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), false),
            Some(NewAccount::new("provider_name", "id")),
        )
        .await
        .unwrap();
    assert!(dup.is_none());

    // Existing user unverified: rejected even with a verified incoming link.
    h.auth
        .create_user(
            UserCreate::new(Some("email2@example.com".to_string()), false),
            None,
        )
        .await
        .unwrap()
        .unwrap();
    let dup = h
        .auth
        .create_user(
            UserCreate::new(Some("email2@example.com".to_string()), true),
            Some(NewAccount::new("provider_name", "id")),
        )
        .await
        .unwrap();
    assert!(dup.is_none());

    // No second user record was created along the way.
    let account = h.auth.get_account("provider_name", "id").await.unwrap();
    assert!(account.is_none());
}

#[tokio::test]
async fn test_duplicate_account_link_aborts() {
    let h = harness(SessionDuration::default());

    h.auth
        .create_user(
            UserCreate::new(Some("a@example.com".to_string()), true),
            Some(NewAccount::new("google", "sub-1")),
        )
        .await
        .unwrap()
        .unwrap();

    let err = h
        .auth
        .create_user(
            UserCreate::new(Some("b@example.com".to_string()), true),
            Some(NewAccount::new("google", "sub-1")),
        )
        .await
        .unwrap_err();
    assert!(err.is_constraint_violation());
}

struct CountingHook {
    calls: AtomicUsize,
    last_had_account: AtomicUsize,
}

#[async_trait::async_trait]
impl OnUserCreate for CountingHook {
    async fn on_user_create(&self, _user: &User, account: Option<&Account>) -> Result<(), Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_had_account
            .store(account.is_some() as usize, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_user_create_hook_fires_once() {
    let hook = Arc::new(CountingHook {
        calls: AtomicUsize::new(0),
        last_had_account: AtomicUsize::new(0),
    });

    let auth = Guardbox::new(
        "guardbox",
        Arc::new(MemoryUserAdapter::new()),
        Arc::new(MemorySessionAdapter::new()),
        Arc::new(MemoryCookieJar::new()),
    )
    .with_user_create_hook(hook.clone());

    auth.create_user(
        UserCreate::new(Some("email@example.com".to_string()), true),
        Some(NewAccount::new("google", "sub-1")),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    assert_eq!(hook.last_had_account.load(Ordering::SeqCst), 1);

    // Linking onto the existing verified identity creates no user, so the
    // hook must not fire again.
    auth.create_user(
        UserCreate::new(Some("email@example.com".to_string()), true),
        Some(NewAccount::new("github", "sub-2")),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_user_merges_fields() {
    let h = harness(SessionDuration::default());
    let user = h
        .auth
        .create_user(
            UserCreate::new(Some("email@example.com".to_string()), false),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    let updated = h
        .auth
        .update_user(
            &user.id,
            guardbox::UserUpdate {
                email: None,
                email_verified: Some(true),
            },
        )
        .await
        .unwrap();
    assert!(updated.email_verified);
    assert_eq!(updated.email.as_deref(), Some("email@example.com"));

    let err = h
        .auth
        .update_user(&"usr_missing".into(), guardbox::UserUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(StorageError::NotFound)));
}

// ---------------------------------------------------------------------
// Session lifecycle
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_get_session_valid_returns_unchanged() {
    let h = harness(SessionDuration::default());
    signed_in_user(&h.auth).await;

    let before = h
        .jar
        .get(&h.auth.session_cookie_key())
        .await
        .unwrap()
        .unwrap();
    let session = h.auth.get_session().await.unwrap().unwrap();
    assert_eq!(session.id.as_str(), before);

    // A valid session causes no writes: same cookie, same record.
    let again = h.auth.get_session().await.unwrap().unwrap();
    assert_eq!(again, session);
}

#[tokio::test]
async fn test_get_session_absent_cookie() {
    let h = harness(SessionDuration::default());
    assert!(h.auth.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn test_sliding_refresh_rotates_session() {
    let h = harness(SessionDuration::new(
        Duration::milliseconds(-1000),
        Duration::days(30),
    ));
    let user = signed_in_user(&h.auth).await;
    let old_id = h
        .jar
        .get(&h.auth.session_cookie_key())
        .await
        .unwrap()
        .unwrap();

    let renewed = h.auth.get_session().await.unwrap().unwrap();
    assert_ne!(renewed.id.as_str(), old_id);
    assert_eq!(renewed.user_id, user.id);

    // The old record is gone and the cookie now carries the new id.
    let stale = h.sessions.get_session(&old_id.as_str().into()).await.unwrap();
    assert!(stale.is_none());
    let cookie = h
        .jar
        .get(&h.auth.session_cookie_key())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cookie, renewed.id.as_str());
}

#[tokio::test]
async fn test_absolute_expiry_clears_session() {
    let h = harness(SessionDuration::new(
        Duration::milliseconds(-1000),
        Duration::milliseconds(-1000),
    ));
    signed_in_user(&h.auth).await;

    assert!(h.auth.get_session().await.unwrap().is_none());
    assert!(
        h.jar
            .get(&h.auth.session_cookie_key())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_stale_cookie_is_cleared() {
    let h = harness(SessionDuration::default());
    h.jar
        .set(
            &h.auth.session_cookie_key(),
            "sess_no-such-record",
            CookieOptions::default(),
        )
        .await
        .unwrap();

    assert!(h.auth.get_session().await.unwrap().is_none());
    assert!(
        h.jar
            .get(&h.auth.session_cookie_key())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_set_session_pins_cookie_expiry() {
    let h = harness(SessionDuration::default());
    let user = signed_in_user(&h.auth).await;
    let session = h.auth.get_session().await.unwrap().unwrap();
    assert_eq!(session.user_id, user.id);

    let stored = h.jar.stored(&h.auth.session_cookie_key()).unwrap();
    assert_eq!(stored.options.expires, Some(session.idle_expires_at));
    // Core defaults are applied beneath the per-call expiry.
    assert_eq!(stored.options.path.as_deref(), Some("/"));
    assert_eq!(stored.options.http_only, Some(true));
}

#[tokio::test]
async fn test_sign_out() {
    let h = harness(SessionDuration::default());
    let user = signed_in_user(&h.auth).await;

    h.auth.sign_out().await.unwrap();
    assert!(h.auth.get_session().await.unwrap().is_none());
    assert!(
        h.jar
            .get(&h.auth.session_cookie_key())
            .await
            .unwrap()
            .is_none()
    );

    // Idempotent: signing out again with no cookie is a no-op.
    h.auth.sign_out().await.unwrap();

    // The user record is untouched.
    assert!(h.auth.get_user_by_id(&user.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_user_sessions_revokes_all() {
    let h = harness(SessionDuration::default());
    let user = signed_in_user(&h.auth).await;
    let extra = h.auth.create_session(&user.id).await.unwrap();

    h.auth.delete_user_sessions(&user.id).await.unwrap();
    assert!(h.auth.get_session().await.unwrap().is_none());
    assert!(h.sessions.get_session(&extra.id).await.unwrap().is_none());
}

// ---------------------------------------------------------------------
// One-time tokens
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_otp_verify_roundtrip() {
    let h = harness(SessionDuration::default());

    let otp = h
        .auth
        .create_otp(
            OtpCreate::new("verify_email")
                .user_id("usr_id".into())
                .state("email@example.com"),
        )
        .await
        .unwrap();

    let verified = h
        .auth
        .verify_otp(&otp.id, "verify_email")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(verified, otp);
}

#[tokio::test]
async fn test_otp_single_use() {
    let h = harness(SessionDuration::default());
    let otp = h.auth.create_otp(OtpCreate::new("magiclink")).await.unwrap();

    assert!(
        h.auth
            .verify_otp(&otp.id, "magiclink")
            .await
            .unwrap()
            .is_some()
    );
    // Second verification of the same id finds nothing.
    assert!(
        h.auth
            .verify_otp(&otp.id, "magiclink")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_otp_expired_is_consumed() {
    let h = harness(SessionDuration::default());
    let otp = h
        .auth
        .create_otp_with_duration(OtpCreate::new("magiclink"), Duration::milliseconds(-1000))
        .await
        .unwrap();

    assert!(
        h.auth
            .verify_otp(&otp.id, "magiclink")
            .await
            .unwrap()
            .is_none()
    );
    // Consumed despite being expired: the record is gone.
    assert!(h.otps.get_otp(&otp.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_otp_kind_mismatch_preserves_token() {
    let h = harness(SessionDuration::default());
    let otp = h.auth.create_otp(OtpCreate::new("magiclink")).await.unwrap();

    assert!(
        h.auth
            .verify_otp(&otp.id, "verify_email")
            .await
            .unwrap()
            .is_none()
    );
    // A kind mismatch does not consume the token.
    assert!(
        h.auth
            .verify_otp(&otp.id, "magiclink")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_otp_without_adapter_is_config_error() {
    let auth = Guardbox::new(
        "guardbox",
        Arc::new(MemoryUserAdapter::new()),
        Arc::new(MemorySessionAdapter::new()),
        Arc::new(MemoryCookieJar::new()),
    );

    let err = auth.create_otp(OtpCreate::new("magiclink")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::OtpAdapterMissing)
    ));

    let err = auth
        .verify_otp(&"otp_missing".into(), "magiclink")
        .await
        .unwrap_err();
    assert!(err.is_config_error());
}

// ---------------------------------------------------------------------
// Cookie passthroughs
// ---------------------------------------------------------------------

#[tokio::test]
async fn test_cookie_passthrough_merges_options() {
    let h = harness(SessionDuration::default());

    h.auth
        .set_cookie("guardbox-test", "value", CookieOptions::default())
        .await
        .unwrap();
    let stored = h.jar.stored("guardbox-test").unwrap();
    assert_eq!(stored.options.path.as_deref(), Some("/"));
    assert_eq!(stored.options.http_only, Some(true));
    assert_eq!(stored.options.secure, Some(true));

    assert_eq!(
        h.auth.get_cookie("guardbox-test").await.unwrap().as_deref(),
        Some("value")
    );
    h.auth
        .delete_cookie("guardbox-test", CookieOptions::default())
        .await
        .unwrap();
    assert!(h.auth.get_cookie("guardbox-test").await.unwrap().is_none());
}

#[tokio::test]
async fn test_facade_cookie_overrides_win() {
    let sessions = Arc::new(MemorySessionAdapter::new());
    let jar = Arc::new(MemoryCookieJar::new());
    let auth = Guardbox::new(
        "guardbox",
        Arc::new(MemoryUserAdapter::new()),
        sessions,
        jar.clone(),
    )
    .with_cookie_options(CookieOptions {
        secure: Some(false),
        domain: Some("example.com".to_string()),
        ..Default::default()
    });

    auth.set_cookie(
        "guardbox-test",
        "value",
        CookieOptions {
            secure: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    // Facade-wide overrides sit above per-call options.
    let stored = jar.stored("guardbox-test").unwrap();
    assert_eq!(stored.options.secure, Some(false));
    assert_eq!(stored.options.domain.as_deref(), Some("example.com"));
    assert_eq!(stored.options.path.as_deref(), Some("/"));
}
