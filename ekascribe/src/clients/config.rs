use std::fmt;
use std::time::Duration;

use secrecy::SecretString;

pub const DEFAULT_BASE_URL: &str = "https://api.eka.care";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// HTTP settings shared by the API client and the storage client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the transcription API, without a trailing slash
    pub base_url: String,
    /// Sent on every request; the service's CDN blocks requests without one
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: default_user_agent(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("ekascribe-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Client credentials, supplied once and immutable for a session
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: SecretString,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
