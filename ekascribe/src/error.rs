use derive_more::{Display, From};
use ekascribe_protocol::RequestError;

use crate::clients::{AuthError, BatchUploadError, InitError, NegotiationError, PollError};

/// Failure of one workflow stage
#[derive(Debug, Display, From)]
pub enum Error {
    #[from]
    Request(RequestError),

    #[from]
    Auth(AuthError),

    #[from]
    Negotiation(NegotiationError),

    #[from]
    Upload(BatchUploadError),

    #[from]
    Init(InitError),

    #[from]
    Poll(PollError),

    #[display("Workflow cancelled")]
    Cancelled,
}

impl std::error::Error for Error {
    // Display renders the stage error itself
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Request(e) => std::error::Error::source(e),
            Error::Auth(e) => std::error::Error::source(e),
            Error::Negotiation(e) => std::error::Error::source(e),
            Error::Upload(e) => std::error::Error::source(e),
            Error::Init(e) => std::error::Error::source(e),
            Error::Poll(e) => std::error::Error::source(e),
            Error::Cancelled => None,
        }
    }
}

impl Error {
    /// True when the service rejected the bearer token or the credentials.
    ///
    /// The caller can refresh the session and retry the stage.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Auth(e) => e.is_unauthorized(),
            Error::Negotiation(e) => e.is_unauthorized(),
            Error::Upload(e) => e.error.is_unauthorized(),
            Error::Init(e) => e.is_unauthorized(),
            Error::Request(_) | Error::Poll(_) | Error::Cancelled => false,
        }
    }

    /// True when polling ran out of time; the transaction may still complete
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Error::Poll(PollError::TimedOut { .. }))
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled | Error::Poll(PollError::Cancelled { .. }) => true,
            Error::Upload(e) => e.is_cancelled(),
            _ => false,
        }
    }

    pub fn is_file_not_found(&self) -> bool {
        matches!(self, Error::Upload(e) if e.is_file_not_found())
    }
}
