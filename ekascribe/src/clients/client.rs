use reqwest::{Response, StatusCode};

use super::config::{ClientConfig, Credentials};

/// Client for the EkaScribe transcription API.
///
/// Holds two HTTP clients: one for the API itself and one for the presigned
/// storage endpoint. The storage client never carries the bearer token.
/// The client is stateless apart from its configuration; token state lives in
/// [`super::Session`] and is passed to every authenticated call.
pub struct EkaClient {
    pub(crate) api: reqwest::Client,
    pub(crate) storage: reqwest::Client,
    config: ClientConfig,
    credentials: Credentials,
}

impl EkaClient {
    pub fn new(config: ClientConfig, credentials: Credentials) -> Result<Self, reqwest::Error> {
        let api = Self::http_client(&config)?;
        let storage = Self::http_client(&config)?;

        Ok(Self {
            api,
            storage,
            config,
            credentials,
        })
    }

    fn http_client(config: &ClientConfig) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout)
            .build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Absolute URL of an API path
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

/// Read the body of a failed response for diagnosis
pub(crate) async fn error_body(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let config = ClientConfig {
            base_url: "https://api.eka.care/".to_string(),
            ..Default::default()
        };
        let client = EkaClient::new(config, Credentials::new("id", "secret")).unwrap();

        assert_eq!(
            client.endpoint("/v1/file-upload"),
            "https://api.eka.care/v1/file-upload"
        );
        assert_eq!(client.client_id(), "id");
    }
}
