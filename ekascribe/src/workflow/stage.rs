use ekascribe_protocol::UploadedFile;

use crate::error::Error;

/// Stages of a workflow, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum WorkflowStage {
    /// Local checks of the request, before any remote call
    Validation,
    Login,
    Negotiation,
    Upload,
    Initialization,
    Polling,
}

/// A workflow stopped at `stage`.
///
/// `transaction_id` is known from negotiation onwards; with it a caller can
/// resume polling after a timeout.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct WorkflowError {
    pub stage: WorkflowStage,
    pub transaction_id: Option<String>,
    #[source]
    pub source: Error,
}

impl WorkflowError {
    pub(crate) fn new(
        stage: WorkflowStage,
        transaction_id: Option<&str>,
        source: impl Into<Error>,
    ) -> Self {
        Self {
            stage,
            transaction_id: transaction_id.map(str::to_string),
            source: source.into(),
        }
    }

    pub fn is_timed_out(&self) -> bool {
        self.source.is_timed_out()
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.source.is_unauthorized()
    }

    /// Files uploaded before an upload failure
    pub fn completed_uploads(&self) -> &[UploadedFile] {
        match &self.source {
            Error::Upload(e) => &e.completed,
            _ => &[],
        }
    }
}
