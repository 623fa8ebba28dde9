//! Opaque id generation
//!
//! Users, sessions, and one-time tokens are identified by prefixed opaque
//! ids (`usr_`, `sess_`, `otp_`) carrying at least 96 bits of CSPRNG
//! entropy, base64 URL-safe encoded without padding. The prefix makes ids
//! self-describing in logs; the entropy makes them unguessable, which is a
//! hard requirement for session and OTP ids.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

pub const USER_ID_PREFIX: &str = "usr";
pub const SESSION_ID_PREFIX: &str = "sess";
pub const OTP_ID_PREFIX: &str = "otp";

/// Generate a `{prefix}_{random}` id with 96 bits of entropy.
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    OsRng.try_fill_bytes(&mut bytes).unwrap();

    format!("{prefix}_{}", BASE64_URL_SAFE_NO_PAD.encode(bytes))
}

/// Generate an unprefixed random token of `bytes` bytes of entropy.
///
/// Used for transient values that are not record ids, such as the OAuth2
/// CSRF state.
pub fn generate_opaque_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    OsRng.try_fill_bytes(&mut buf).unwrap();

    BASE64_URL_SAFE_NO_PAD.encode(buf)
}

/// Check that `id` is `{expected_prefix}_` followed by at least 96 bits of
/// valid base64 URL-safe data.
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}
