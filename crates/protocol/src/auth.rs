use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `POST /connect-auth/v1/account/login`
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharing_key: Option<&'a str>,
}

/// Body of `POST /connect-auth/v1/account/refresh-token`
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
    pub access_token: &'a str,
}

/// Token pair returned by both login and refresh.
#[derive(Clone, PartialEq, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: u64,
    /// Lifetime of the refresh token in seconds
    #[serde(default)]
    pub refresh_expires_in: u64,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_expires_in", &self.refresh_expires_in)
            .finish()
    }
}
