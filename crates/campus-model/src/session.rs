use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque session identifier issued by the portal after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a login attempt did not produce a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    /// The portal answered with its login page again.
    #[error("invalid username or password")]
    BadCredentials,

    /// The login looked successful but no session cookie was issued.
    #[error("login succeeded but no session cookie named '{cookie_key}' was issued")]
    NoSessionToken { cookie_key: String },
}
