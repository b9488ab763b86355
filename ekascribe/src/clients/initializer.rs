use ekascribe_protocol::{InitResult, TranscriptionRequest};
use log::{debug, error, info};

use super::client::{error_body, EkaClient};
use super::error::InitError;
use super::session::Session;

const INIT_PATH: &str = "/voice/api/v2/transaction/init";

impl EkaClient {
    /// Start processing of an uploaded batch.
    ///
    /// The request is validated first; an invalid request is never sent.
    pub async fn initialize(
        &self,
        session: &Session,
        transaction_id: &str,
        request: &TranscriptionRequest,
    ) -> Result<InitResult, InitError> {
        request.validate()?;

        let url = self.endpoint(&format!("{}/{}", INIT_PATH, transaction_id));
        debug!(
            "Initializing transaction {} with {} file(s) and {} template(s)",
            transaction_id,
            request.file_names.len(),
            request.output_templates.len()
        );

        let response = session
            .authorize(self.api.post(&url).json(request))
            .send()
            .await
            .map_err(|e| {
                error!("Initialize transaction request error: {}", e);
                InitError::Request {
                    url: url.clone(),
                    source: e,
                }
            })?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            error!("Initialize transaction failed ({}): {}", status, body);
            return Err(InitError::Rejected { status, body, url });
        }

        let result: InitResult = response.json().await.map_err(|e| {
            error!("Failed to parse initialize response: {}", e);
            InitError::InvalidResponse {
                url: url.clone(),
                source: e,
            }
        })?;

        info!(
            "Initialized transaction {} (status: {}, batch: {})",
            transaction_id, result.status, result.batch_id
        );
        Ok(result)
    }
}
