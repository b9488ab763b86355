//! Credential exchange and token refresh.

use ekascribe_protocol::{LoginRequest, RefreshRequest, Token};
use log::{error, info};
use secrecy::ExposeSecret;

use super::client::{error_body, EkaClient};
use super::error::AuthError;
use super::session::Session;

const LOGIN_PATH: &str = "/connect-auth/v1/account/login";
const REFRESH_PATH: &str = "/connect-auth/v1/account/refresh-token";
const CLIENT_ID_HEADER: &str = "Client-Id";

impl EkaClient {
    /// Log in with the client credentials and open a session.
    ///
    /// The returned session's access token is used by every authenticated call
    /// it is passed to, until it is replaced by a refresh.
    pub async fn login(&self, sharing_key: Option<&str>) -> Result<Session, AuthError> {
        let token = self.fetch_token(sharing_key).await?;
        Ok(Session::new(token))
    }

    /// Exchange the client credentials for a token pair
    pub async fn fetch_token(&self, sharing_key: Option<&str>) -> Result<Token, AuthError> {
        let url = self.endpoint(LOGIN_PATH);
        let credentials = self.credentials();
        let body = LoginRequest {
            client_id: &credentials.client_id,
            client_secret: credentials.client_secret.expose_secret(),
            sharing_key,
        };

        let request = self.api.post(&url).json(&body);
        let token = Self::send_token_request(request, url).await?;

        info!(
            "Authenticated client {} (token expires in {}s)",
            credentials.client_id, token.expires_in
        );
        Ok(token)
    }

    /// Exchange a refresh token and its access token for a new token pair.
    ///
    /// # Arguments
    /// * `refresh_token` - Refresh token issued with `access_token`
    /// * `access_token` - Still-known access token, sent as the bearer credential
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
        access_token: &str,
    ) -> Result<Token, AuthError> {
        let request = self.refresh_request(refresh_token, access_token);
        let token = Self::send_token_request(request, self.endpoint(REFRESH_PATH)).await?;
        info!("Refreshed access token (expires in {}s)", token.expires_in);
        Ok(token)
    }

    /// Refresh the session's token pair and install the result in the session.
    ///
    /// Requests already in flight keep the token they were built with. A
    /// session opened with [`Session::from_access_token`] cannot be refreshed.
    pub async fn refresh(&self, session: &Session) -> Result<(), AuthError> {
        if !session.has_refresh_token() {
            return Err(AuthError::MissingRefreshToken);
        }

        let request = session.with_tokens(|access_token, refresh_token| {
            self.refresh_request(refresh_token, access_token)
        });

        let token = Self::send_token_request(request, self.endpoint(REFRESH_PATH)).await?;
        info!("Refreshed session token (expires in {}s)", token.expires_in);
        session.replace(token);
        Ok(())
    }

    fn refresh_request(&self, refresh_token: &str, access_token: &str) -> reqwest::RequestBuilder {
        self.api
            .post(self.endpoint(REFRESH_PATH))
            .bearer_auth(access_token)
            .header(CLIENT_ID_HEADER, self.client_id())
            .json(&RefreshRequest {
                refresh_token,
                access_token,
            })
    }

    async fn send_token_request(
        request: reqwest::RequestBuilder,
        url: String,
    ) -> Result<Token, AuthError> {
        let response = request.send().await.map_err(|e| {
            error!("Authentication request error: {}", e);
            AuthError::Request {
                url: url.clone(),
                source: e,
            }
        })?;

        // Check response status
        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            error!("Authentication failed ({}): {}", status, body);
            return Err(AuthError::Rejected { status, body, url });
        }

        response.json::<Token>().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            AuthError::InvalidResponse(e)
        })
    }
}
