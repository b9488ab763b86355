use ekascribe_protocol::{PresignedUploadResponse, UploadTarget};
use log::{error, info};

use super::client::{error_body, EkaClient};
use super::error::NegotiationError;
use super::session::Session;

/// Action tag for EkaScribe batch uploads
pub const DEFAULT_UPLOAD_ACTION: &str = "ekascribe-v2";

const FILE_UPLOAD_PATH: &str = "/v1/file-upload";

impl EkaClient {
    /// Request a presigned upload target for a new transaction.
    ///
    /// A response without an upload descriptor, folder path or transaction id
    /// is a [`NegotiationError::MalformedDescriptor`]; it is not retried.
    pub async fn get_upload_target(
        &self,
        session: &Session,
        action: &str,
    ) -> Result<UploadTarget, NegotiationError> {
        let url = self.endpoint(FILE_UPLOAD_PATH);
        let request = session.authorize(self.api.post(&url).query(&[("action", action)]));

        let response = request.send().await.map_err(|e| {
            error!("Upload negotiation request error: {}", e);
            NegotiationError::Request {
                url: url.clone(),
                source: e,
            }
        })?;

        if !response.status().is_success() {
            let (status, body) = error_body(response).await;
            error!("Upload negotiation failed ({}): {}", status, body);
            return Err(NegotiationError::Rejected { status, body, url });
        }

        let presigned: PresignedUploadResponse = response.json().await.map_err(|e| {
            error!("Failed to parse upload negotiation response: {}", e);
            NegotiationError::InvalidResponse(e)
        })?;

        let target = presigned.into_target()?;
        info!(
            "Negotiated upload target for transaction {} (folder {})",
            target.transaction_id(),
            target.folder_path()
        );
        Ok(target)
    }
}
