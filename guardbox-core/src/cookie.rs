//! Cookie transport contract
//!
//! The core never speaks HTTP. The host application supplies a [`CookieJar`]
//! bound to the current request/response pair, and the facade reads and
//! writes the session cookie (and protocol adapters their transient state)
//! through it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Attributes attached when writing or clearing a cookie.
///
/// Every field is optional so option sets can be layered: unset fields fall
/// through to the next layer via [`CookieOptions::merged_over`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CookieOptions {
    pub domain: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub http_only: Option<bool>,
    pub max_age: Option<i64>,
    pub path: Option<String>,
    pub secure: Option<bool>,
    pub same_site: Option<SameSite>,
    pub partitioned: Option<bool>,
}

impl CookieOptions {
    /// The defaults applied beneath every cookie write:
    /// `path=/; HttpOnly; Secure; SameSite=Lax`.
    pub fn core_defaults() -> Self {
        Self {
            path: Some("/".to_string()),
            http_only: Some(true),
            secure: Some(true),
            same_site: Some(SameSite::Lax),
            ..Default::default()
        }
    }

    /// Layer this option set over `fallback`: fields set here win, unset
    /// fields take the fallback's value.
    pub fn merged_over(self, fallback: &CookieOptions) -> CookieOptions {
        CookieOptions {
            domain: self.domain.or_else(|| fallback.domain.clone()),
            expires: self.expires.or(fallback.expires),
            http_only: self.http_only.or(fallback.http_only),
            max_age: self.max_age.or(fallback.max_age),
            path: self.path.or_else(|| fallback.path.clone()),
            secure: self.secure.or(fallback.secure),
            same_site: self.same_site.or(fallback.same_site),
            partitioned: self.partitioned.or(fallback.partitioned),
        }
    }
}

/// Host-supplied cookie transport.
///
/// Implementations get/set/delete a named string value on the current
/// request; attribute handling is entirely theirs. Both reads and writes may
/// be asynchronous I/O.
#[async_trait]
pub trait CookieJar: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn set(&self, key: &str, value: &str, options: CookieOptions) -> Result<(), Error>;

    async fn delete(&self, key: &str, options: CookieOptions) -> Result<(), Error>;
}
