//! End-to-end transcription workflow
//!
//! ```text
//! Validation ──> [Login] ──> Negotiation ──> Upload ──> Initialization ──> Polling ──> decode
//! ```
//!
//! Stages run strictly in order for one transaction. The first stage error
//! stops the workflow; status fetch errors and decode errors do not.

mod stage;

use std::future::Future;
use std::path::PathBuf;

use ekascribe_protocol::{
    decode_outputs, AdditionalData, DecodedOutput, InitResult, RequestError,
    TranscriptionRequest, TranscriptionStatus, UploadTarget, UploadedFile,
};
use log::{info, warn};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::clients::{EkaClient, PollConfig, Session, DEFAULT_UPLOAD_ACTION};
use crate::error::Error;

pub use stage::{WorkflowError, WorkflowStage};

/// Input of one workflow run
#[derive(Debug, Clone)]
pub struct WorkflowRequest {
    /// Local audio files, uploaded in this order
    pub files: Vec<PathBuf>,
    /// Upload negotiation action tag
    pub action: String,
    /// Transcription settings. The batch url and file names are filled in
    /// from the upload.
    pub transcription: TranscriptionRequest,
    pub poll: PollConfig,
}

impl WorkflowRequest {
    pub fn new(files: Vec<PathBuf>, transcription: TranscriptionRequest) -> Self {
        Self {
            files,
            action: DEFAULT_UPLOAD_ACTION.to_string(),
            transcription,
            poll: PollConfig::default(),
        }
    }
}

/// Everything a completed workflow produced
#[derive(Debug, Serialize)]
pub struct WorkflowResult {
    pub transaction_id: String,
    pub batch_id: String,
    pub target: UploadTarget,
    pub uploaded: Vec<UploadedFile>,
    pub init: InitResult,
    /// Raw final snapshot; `outputs` holds its decoded form
    #[serde(skip)]
    pub status: TranscriptionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
    pub outputs: Vec<DecodedOutput>,
}

pub struct Workflow {
    client: EkaClient,
}

impl Workflow {
    pub fn new(client: EkaClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &EkaClient {
        &self.client
    }

    /// Log in, then [`Workflow::run`] with the new session.
    pub async fn login_and_run(
        &self,
        sharing_key: Option<&str>,
        request: &WorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        validate(request)?;

        let session = run_stage(
            WorkflowStage::Login,
            None,
            cancel,
            self.client.login(sharing_key),
        )
        .await?;

        self.run(&session, request, cancel).await
    }

    /// Upload `request.files` as one transaction and wait for its outputs.
    ///
    /// The request is checked before any remote call. Cancellation is
    /// honoured between stages and while a request is in flight; files
    /// uploaded before a cancellation stay in
    /// [`WorkflowError::completed_uploads`].
    pub async fn run(
        &self,
        session: &Session,
        request: &WorkflowRequest,
        cancel: &CancellationToken,
    ) -> Result<WorkflowResult, WorkflowError> {
        validate(request)?;

        let target = run_stage(
            WorkflowStage::Negotiation,
            None,
            cancel,
            self.client.get_upload_target(session, &request.action),
        )
        .await?;
        let transaction_id = target.transaction_id().to_string();
        let txn = Some(transaction_id.as_str());

        let uploaded = self
            .client
            .upload_files_until(&target, &request.files, cancel)
            .await
            .map_err(|e| WorkflowError::new(WorkflowStage::Upload, txn, e))?;

        let transcription = TranscriptionRequest {
            batch_source_url: target.batch_source_url(),
            file_names: uploaded.iter().map(|f| f.file_name.clone()).collect(),
            ..request.transcription.clone()
        };
        let init = run_stage(
            WorkflowStage::Initialization,
            txn,
            cancel,
            self.client.initialize(session, &transaction_id, &transcription),
        )
        .await?;
        if !init.transaction_id.is_empty() && init.transaction_id != transaction_id {
            warn!(
                "Initialization answered for transaction {} instead of {}",
                init.transaction_id, transaction_id
            );
        }

        let (status, outputs) = self
            .poll_and_decode(session, &transaction_id, &request.poll, cancel)
            .await?;

        Ok(WorkflowResult {
            batch_id: init.batch_id.clone(),
            transaction_id,
            target,
            uploaded,
            init,
            additional_data: status.additional_data.clone(),
            status,
            outputs,
        })
    }

    /// Wait for an initialized transaction and decode its outputs.
    ///
    /// Used by [`Workflow::run`], and to resume a transaction whose polling
    /// timed out.
    pub async fn poll_and_decode(
        &self,
        session: &Session,
        transaction_id: &str,
        poll: &PollConfig,
        cancel: &CancellationToken,
    ) -> Result<(TranscriptionStatus, Vec<DecodedOutput>), WorkflowError> {
        let status = self
            .client
            .poll_for_completion(session, transaction_id, poll, cancel)
            .await
            .map_err(|e| WorkflowError::new(WorkflowStage::Polling, Some(transaction_id), e))?;

        let outputs = decode_outputs(&status.outputs);
        let decoded = outputs.iter().filter(|o| o.is_decoded()).count();
        info!(
            "Transaction {} finished: {} of {} output(s) decoded",
            transaction_id,
            decoded,
            outputs.len()
        );
        Ok((status, outputs))
    }
}

/// Reject a request that would fail initialization, before anything is
/// negotiated or uploaded
fn validate(request: &WorkflowRequest) -> Result<(), WorkflowError> {
    let result = if request.files.is_empty() {
        Err(RequestError::NoFiles)
    } else {
        request.transcription.validate_settings()
    };

    result.map_err(|e| WorkflowError::new(WorkflowStage::Validation, None, e))
}

/// Run one stage unless `cancel` fires first
async fn run_stage<T, E>(
    stage: WorkflowStage,
    transaction_id: Option<&str>,
    cancel: &CancellationToken,
    operation: impl Future<Output = Result<T, E>>,
) -> Result<T, WorkflowError>
where
    E: Into<Error>,
{
    if cancel.is_cancelled() {
        return Err(WorkflowError::new(stage, transaction_id, Error::Cancelled));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkflowError::new(stage, transaction_id, Error::Cancelled)),
        result = operation => result.map_err(|e| WorkflowError::new(stage, transaction_id, e)),
    }
}
