//! Provider presets
//!
//! Ready-made [`OAuth2Provider`] configurations for Google and GitHub, with
//! profile fetchers that normalize each provider's userinfo payload into an
//! [`OAuth2Profile`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::{OAuth2Profile, OAuth2Provider, OAuth2Tokens, ProfileFetcher};

const GOOGLE_AUTHORIZATION_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

const GITHUB_AUTHORIZATION_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";
const GITHUB_EMAILS_URL: &str = "https://api.github.com/user/emails";

impl OAuth2Provider {
    /// Preset for Google sign-in (`email profile` scope, OIDC userinfo
    /// endpoint).
    pub fn google(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self::builder("google")
            .client_id(client_id)
            .client_secret(client_secret)
            .redirect_url(redirect_url)
            .authorization_url(GOOGLE_AUTHORIZATION_URL)
            .token_url(GOOGLE_TOKEN_URL)
            .scope("email profile")
            .profile_fetcher(Arc::new(GoogleProfileFetcher::default()))
            .build()
    }

    /// Preset for GitHub sign-in (`read:user user:email` scope; resolves the
    /// primary email through the emails endpoint).
    pub fn github(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self::builder("github")
            .client_id(client_id)
            .client_secret(client_secret)
            .redirect_url(redirect_url)
            .authorization_url(GITHUB_AUTHORIZATION_URL)
            .token_url(GITHUB_TOKEN_URL)
            .scope("read:user user:email")
            .profile_fetcher(Arc::new(GitHubProfileFetcher::default()))
            .build()
    }
}

/// Fetches the OIDC userinfo document from Google.
#[derive(Default)]
pub struct GoogleProfileFetcher {
    http: reqwest::Client,
}

#[async_trait]
impl ProfileFetcher for GoogleProfileFetcher {
    async fn fetch(&self, tokens: &OAuth2Tokens) -> Option<OAuth2Profile> {
        let raw: serde_json::Value = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&tokens.access_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .inspect_err(|e| warn!(error = %e, "google userinfo request failed"))
            .ok()?
            .json()
            .await
            .inspect_err(|e| warn!(error = %e, "google userinfo response malformed"))
            .ok()?;

        Some(OAuth2Profile {
            sub: raw.get("sub")?.as_str()?.to_string(),
            email: raw
                .get("email")
                .and_then(|email| email.as_str())
                .map(String::from),
            email_verified: raw
                .get("email_verified")
                .and_then(|verified| verified.as_bool())
                .unwrap_or(false),
            raw,
        })
    }
}

/// Fetches the authenticated GitHub user plus their primary email.
///
/// GitHub does not expose the email on the user document when it is private,
/// so a second request to the emails endpoint resolves the primary address
/// and its verification status.
#[derive(Default)]
pub struct GitHubProfileFetcher {
    http: reqwest::Client,
}

impl GitHubProfileFetcher {
    async fn get_json(&self, url: &str, access_token: &str) -> Option<serde_json::Value> {
        self.http
            .get(url)
            .bearer_auth(access_token)
            // GitHub's API rejects requests without a User-Agent.
            .header(reqwest::header::USER_AGENT, "guardbox")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .inspect_err(|e| warn!(url, error = %e, "github api request failed"))
            .ok()?
            .json()
            .await
            .inspect_err(|e| warn!(url, error = %e, "github api response malformed"))
            .ok()
    }
}

#[async_trait]
impl ProfileFetcher for GitHubProfileFetcher {
    async fn fetch(&self, tokens: &OAuth2Tokens) -> Option<OAuth2Profile> {
        let mut user = self.get_json(GITHUB_USER_URL, &tokens.access_token).await?;
        let emails = self
            .get_json(GITHUB_EMAILS_URL, &tokens.access_token)
            .await?;

        let sub = user.get("id")?.as_i64()?.to_string();
        let primary = emails.as_array()?.iter().find(|email| {
            email
                .get("primary")
                .and_then(|primary| primary.as_bool())
                .unwrap_or(false)
        });

        let email = primary
            .and_then(|email| email.get("email"))
            .and_then(|email| email.as_str())
            .map(String::from);
        let email_verified = primary
            .and_then(|email| email.get("verified"))
            .and_then(|verified| verified.as_bool())
            .unwrap_or(false);

        // Keep the emails alongside the user document in the stored metadata.
        user.as_object_mut()?
            .insert("emails".to_string(), emails);

        Some(OAuth2Profile {
            sub,
            email,
            email_verified,
            raw: user,
        })
    }
}
