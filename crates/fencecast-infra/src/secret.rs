//! Upstream API key resolution.
//!
//! The key is read from the environment only and wrapped in
//! [`SecretString`] immediately; it is exposed solely when building the
//! `Authorization` header.

use secrecy::SecretString;

/// Environment variable holding the upstream bearer token.
pub const API_KEY_ENV: &str = "UPSTREAM_API_KEY";

/// Read the upstream API key from [`API_KEY_ENV`].
pub fn api_key_from_env() -> Option<SecretString> {
    api_key_from_var(API_KEY_ENV)
}

fn api_key_from_var(name: &str) -> Option<SecretString> {
    match std::env::var(name) {
        Ok(val) if !val.trim().is_empty() => Some(SecretString::from(val.trim().to_string())),
        Ok(_) => None,
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            // Present but unusable as a header value.
            tracing::warn!("{name} is not valid unicode, ignoring it");
            None
        }
    }
}
