use std::path::PathBuf;
use std::time::Duration;

use ekascribe_protocol::{DescriptorError, RequestError, UploadedFile};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authentication request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Authentication failed with status {status}. Response: {body}. Request URL: {url}")]
    Rejected {
        status: StatusCode,
        body: String,
        url: String,
    },
    #[error("Failed to parse token response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
    #[error("Session has no refresh token; log in again")]
    MissingRefreshToken,
}

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("Upload negotiation request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upload negotiation failed with status {status}. Response: {body}. Request URL: {url}")]
    Rejected {
        status: StatusCode,
        body: String,
        url: String,
    },
    #[error("Failed to parse upload negotiation response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
    #[error("Malformed upload descriptor: {0}")]
    MalformedDescriptor(#[from] DescriptorError),
}

/// Failure uploading a single file
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("File has no usable name: {}", .0.display())]
    InvalidFileName(PathBuf),
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Upload request for {file_name} failed: {source}")]
    Request {
        file_name: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Upload failed for {file_name}: {status} - {body}")]
    Rejected {
        file_name: String,
        status: StatusCode,
        body: String,
    },
    #[error("Upload cancelled")]
    Cancelled,
}

/// Failure of a batch upload.
///
/// Uploads stop at the first failing file; files uploaded before it are kept
/// in `completed`.
#[derive(Debug, thiserror::Error)]
#[error("{error} ({} file(s) uploaded before the failure)", .completed.len())]
pub struct BatchUploadError {
    pub completed: Vec<UploadedFile>,
    #[source]
    pub error: UploadError,
}

impl BatchUploadError {
    pub fn is_file_not_found(&self) -> bool {
        matches!(self.error, UploadError::FileNotFound(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, UploadError::Cancelled)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Invalid transcription request: {0}")]
    InvalidRequest(#[from] RequestError),
    #[error("Initialize transaction request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Initialize transaction failed with status {status}. Response: {body}. Request URL: {url}")]
    Rejected {
        status: StatusCode,
        body: String,
        url: String,
    },
    #[error("Failed to parse initialize response from {url}: {source}")]
    InvalidResponse {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A single failed status fetch. Tolerated while polling.
#[derive(Debug, thiserror::Error)]
pub enum StatusFetchError {
    #[error("Status request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("Status request returned {status}: {body}")]
    Rejected { status: StatusCode, body: String },
    #[error("Failed to parse status response: {0}")]
    InvalidResponse(#[source] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Polling timeout after {:.1} seconds ({attempts} attempts)", .elapsed.as_secs_f64())]
    TimedOut {
        elapsed: Duration,
        attempts: u32,
        /// Most recent status fetch failure, if any
        last_error: Option<String>,
    },
    #[error("Polling cancelled after {:.1} seconds ({attempts} attempts)", .elapsed.as_secs_f64())]
    Cancelled { elapsed: Duration, attempts: u32 },
}

macro_rules! http_status {
    ($ty:ty { $($variant:ident),* }) => {
        impl $ty {
            /// HTTP status of a rejected request, if the service answered
            pub fn status(&self) -> Option<StatusCode> {
                match self {
                    $(Self::$variant { status, .. } => Some(*status),)*
                    _ => None,
                }
            }

            /// True when the service rejected the bearer token or credentials
            pub fn is_unauthorized(&self) -> bool {
                self.status() == Some(StatusCode::UNAUTHORIZED)
            }
        }
    };
}

http_status!(AuthError { Rejected });
http_status!(NegotiationError { Rejected });
http_status!(UploadError { Rejected });
http_status!(InitError { Rejected });
http_status!(StatusFetchError { Rejected });
