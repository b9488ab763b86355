mod auth;
mod client;
mod config;
mod error;
mod initializer;
mod negotiator;
mod poller;
mod session;
mod uploader;

pub use client::EkaClient;
pub use config::{
    default_user_agent, ClientConfig, Credentials, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT,
};
pub use error::{
    AuthError, BatchUploadError, InitError, NegotiationError, PollError, StatusFetchError,
    UploadError,
};
pub use negotiator::DEFAULT_UPLOAD_ACTION;
pub use poller::{
    poll_for_completion, PollConfig, PollState, StatusEndpoint, StatusSource,
    DEFAULT_MAX_POLL_DURATION, DEFAULT_POLL_INTERVAL,
};
pub use session::Session;
pub use uploader::{FormPart, FormValue, UploadForm};
