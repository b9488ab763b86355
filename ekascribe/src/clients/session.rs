use std::fmt;
use std::sync::{PoisonError, RwLock};

use ekascribe_protocol::Token;
use reqwest::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

/// Bearer token state for one login.
///
/// Every authenticated operation takes a `&Session` explicitly. A session can
/// be shared by concurrent tasks of the same workflow; refreshing it with
/// [`Session::replace`] only affects requests built afterwards.
pub struct Session {
    state: RwLock<SessionToken>,
}

struct SessionToken {
    access_token: SecretString,
    refresh_token: SecretString,
    token_type: Option<String>,
    expires_in: u64,
    refresh_expires_in: u64,
}

impl From<Token> for SessionToken {
    fn from(token: Token) -> Self {
        Self {
            access_token: SecretString::from(token.access_token),
            refresh_token: SecretString::from(token.refresh_token),
            token_type: token.token_type,
            expires_in: token.expires_in,
            refresh_expires_in: token.refresh_expires_in,
        }
    }
}

impl Session {
    pub fn new(token: Token) -> Self {
        Self {
            state: RwLock::new(token.into()),
        }
    }

    /// Session for an access token obtained elsewhere, e.g. passed in by a caller.
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self::new(Token {
            access_token: access_token.into(),
            refresh_token: String::new(),
            token_type: None,
            expires_in: 0,
            refresh_expires_in: 0,
        })
    }

    /// Install a new token pair, typically the result of a refresh.
    pub fn replace(&self, token: Token) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = token.into();
    }

    /// Run `f` with the current access and refresh tokens.
    pub fn with_tokens<R>(&self, f: impl FnOnce(&str, &str) -> R) -> R {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(
            state.access_token.expose_secret(),
            state.refresh_token.expose_secret(),
        )
    }

    pub fn has_refresh_token(&self) -> bool {
        self.with_tokens(|_, refresh| !refresh.is_empty())
    }

    pub fn token_type(&self) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.token_type.clone()
    }

    /// Lifetimes in seconds of the access and refresh tokens, as issued
    pub fn lifetimes(&self) -> (u64, u64) {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        (state.expires_in, state.refresh_expires_in)
    }

    /// Add the bearer credential to a request
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        self.with_tokens(|access, _| request.bearer_auth(access))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (expires_in, refresh_expires_in) = self.lifetimes();
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &expires_in)
            .field("refresh_expires_in", &refresh_expires_in)
            .finish()
    }
}
