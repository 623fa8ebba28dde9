//! OAuth2 authorization-code adapter for guardbox
//!
//! A protocol adapter layered on the guardbox facade's public surface: it
//! stores a CSRF state nonce through the facade's cookie passthroughs,
//! exchanges the authorization code at the provider's token endpoint, and
//! resolves the provider profile into a guardbox user, account link, and
//! session. It holds no storage of its own.
//!
//! # Example
//!
//! ```rust,ignore
//! use guardbox_oauth::OAuth2Provider;
//!
//! let google = OAuth2Provider::google(
//!     std::env::var("GOOGLE_CLIENT_ID")?,
//!     std::env::var("GOOGLE_CLIENT_SECRET")?,
//!     "http://localhost:8080/callback",
//! );
//!
//! // 1. Redirect the user to the sign-in URL.
//! let url = google.authorization_url(&auth).await?;
//!
//! // 2. In the callback, trade code + state for a session.
//! if let Some(session) = google.authenticate(&auth, &code, &state).await? {
//!     auth.set_session(Some(&session)).await?;
//! }
//! ```

pub mod providers;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use guardbox::{CookieJar, Guardbox, NewAccount, Session, SessionAdapter, UserAdapter, UserCreate};
use guardbox_core::id::generate_opaque_token;

pub use providers::{GitHubProfileFetcher, GoogleProfileFetcher};

/// Errors from the OAuth2 adapter.
///
/// Provider-side rejections (bad code, revoked grant, unreachable token
/// endpoint) are *not* errors: they resolve to `Ok(None)` like any other
/// failed authentication attempt. Errors are reserved for core failures and
/// misconfigured endpoints.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Auth error: {0}")]
    Core(#[from] guardbox::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

/// Tokens returned by the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Tokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// A provider profile normalized to what the identity engine needs.
///
/// `raw` is the untouched provider payload, stored as the account link's
/// metadata.
#[derive(Debug, Clone)]
pub struct OAuth2Profile {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub raw: serde_json::Value,
}

/// Maps freshly exchanged tokens to a provider profile.
///
/// `None` means the profile could not be fetched or parsed; the sign-in
/// attempt fails without erroring.
#[async_trait]
pub trait ProfileFetcher: Send + Sync + 'static {
    async fn fetch(&self, tokens: &OAuth2Tokens) -> Option<OAuth2Profile>;
}

/// An OAuth2 authorization-code provider.
///
/// Build one with [`OAuth2Provider::builder`], or use the
/// [`google`](OAuth2Provider::google) / [`github`](OAuth2Provider::github)
/// presets.
pub struct OAuth2Provider {
    /// The provider name used as the account link's provider key, e.g. "google".
    pub provider: String,
    client_id: String,
    client_secret: String,
    authorization_url: String,
    token_url: String,
    redirect_url: String,
    scope: Option<String>,
    profile: Arc<dyn ProfileFetcher>,
    http: reqwest::Client,
}

pub struct OAuth2ProviderBuilder {
    provider: String,
    client_id: String,
    client_secret: String,
    authorization_url: String,
    token_url: String,
    redirect_url: String,
    scope: Option<String>,
    profile: Option<Arc<dyn ProfileFetcher>>,
}

impl OAuth2ProviderBuilder {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            authorization_url: String::new(),
            token_url: String::new(),
            redirect_url: String::new(),
            scope: None,
            profile: None,
        }
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = client_secret.into();
        self
    }

    pub fn authorization_url(mut self, url: impl Into<String>) -> Self {
        self.authorization_url = url.into();
        self
    }

    pub fn token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = url.into();
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn profile_fetcher(mut self, fetcher: Arc<dyn ProfileFetcher>) -> Self {
        self.profile = Some(fetcher);
        self
    }

    /// # Panics
    ///
    /// Panics if no profile fetcher was supplied; a provider cannot resolve
    /// identities without one.
    pub fn build(self) -> OAuth2Provider {
        OAuth2Provider {
            provider: self.provider,
            client_id: self.client_id,
            client_secret: self.client_secret,
            authorization_url: self.authorization_url,
            token_url: self.token_url,
            redirect_url: self.redirect_url,
            scope: self.scope,
            profile: self.profile.expect("profile fetcher is required"),
            http: reqwest::Client::new(),
        }
    }
}

impl OAuth2Provider {
    pub fn builder(provider: &str) -> OAuth2ProviderBuilder {
        OAuth2ProviderBuilder::new(provider)
    }

    /// The cookie key the CSRF state nonce is stored under.
    pub fn state_cookie_key(&self, app_name: &str) -> String {
        format!("{app_name}-guardbox-oauth2-state")
    }

    /// Build the provider authorization URL and stash a fresh CSRF state
    /// nonce in the facade's cookie transport. Redirect the user here.
    pub async fn authorization_url<U, S, C>(
        &self,
        auth: &Guardbox<U, S, C>,
    ) -> Result<String, OAuthError>
    where
        U: UserAdapter,
        S: SessionAdapter,
        C: CookieJar,
    {
        let state = generate_opaque_token(16);
        auth.set_cookie(
            &self.state_cookie_key(auth.app_name()),
            &state,
            Default::default(),
        )
        .await
        .map_err(OAuthError::Core)?;

        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_url.as_str()),
            ("state", state.as_str()),
        ];
        if let Some(scope) = &self.scope {
            params.push(("scope", scope.as_str()));
        }

        let url = Url::parse_with_params(&self.authorization_url, &params)
            .map_err(|e| OAuthError::InvalidUrl(e.to_string()))?;
        Ok(url.into())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// The stored CSRF state cookie is read and deleted first; a mismatch
    /// returns `Ok(None)` before any network I/O. Provider-side rejections
    /// also resolve to `Ok(None)`.
    pub async fn exchange_code<U, S, C>(
        &self,
        auth: &Guardbox<U, S, C>,
        code: &str,
        state: &str,
    ) -> Result<Option<OAuth2Tokens>, OAuthError>
    where
        U: UserAdapter,
        S: SessionAdapter,
        C: CookieJar,
    {
        let key = self.state_cookie_key(auth.app_name());
        let saved_state = auth.get_cookie(&key).await.map_err(OAuthError::Core)?;
        auth.delete_cookie(&key, Default::default())
            .await
            .map_err(OAuthError::Core)?;

        if saved_state.as_deref() != Some(state) {
            warn!(provider = %self.provider, "oauth2 state mismatch, rejecting callback");
            return Ok(None);
        }

        let params = [
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_url.as_str()),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
        ];

        let response = match self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "token endpoint unreachable");
                return Ok(None);
            }
        };
        if !response.status().is_success() {
            warn!(
                provider = %self.provider,
                status = %response.status(),
                "token exchange rejected"
            );
            return Ok(None);
        }

        match response.json::<OAuth2Tokens>().await {
            Ok(tokens) => Ok(Some(tokens)),
            Err(e) => {
                warn!(provider = %self.provider, error = %e, "malformed token response");
                Ok(None)
            }
        }
    }

    /// Complete the callback: exchange the code, fetch the profile, resolve
    /// the user (existing account link, or create-and-link), and create a
    /// session. The caller is responsible for `set_session`.
    ///
    /// Returns `Ok(None)` when any step fails as an authentication failure:
    /// state mismatch, rejected exchange, unfetchable profile, an orphaned
    /// account link, or a sign-up refused by the email-claiming policy.
    pub async fn authenticate<U, S, C>(
        &self,
        auth: &Guardbox<U, S, C>,
        code: &str,
        state: &str,
    ) -> Result<Option<Session>, OAuthError>
    where
        U: UserAdapter,
        S: SessionAdapter,
        C: CookieJar,
    {
        let Some(tokens) = self.exchange_code(auth, code, state).await? else {
            return Ok(None);
        };
        let Some(profile) = self.profile.fetch(&tokens).await else {
            warn!(provider = %self.provider, "profile fetch failed");
            return Ok(None);
        };

        let user = match auth
            .get_account(&self.provider, &profile.sub)
            .await
            .map_err(OAuthError::Core)?
        {
            Some(account) => {
                match auth
                    .get_user_by_id(&account.user_id)
                    .await
                    .map_err(OAuthError::Core)?
                {
                    Some(user) => user,
                    None => {
                        warn!(
                            provider = %self.provider,
                            user_id = %account.user_id,
                            "account link points at a missing user"
                        );
                        return Ok(None);
                    }
                }
            }
            None => {
                let value = UserCreate::new(profile.email.clone(), profile.email_verified);
                let account =
                    NewAccount::new(&self.provider, &profile.sub).with_metadata(profile.raw);
                match auth
                    .create_user(value, Some(account))
                    .await
                    .map_err(OAuthError::Core)?
                {
                    Some(user) => user,
                    None => {
                        debug!(provider = %self.provider, "sign-up refused by email policy");
                        return Ok(None);
                    }
                }
            }
        };

        let session = auth
            .create_session(&user.id)
            .await
            .map_err(OAuthError::Core)?;
        Ok(Some(session))
    }
}
