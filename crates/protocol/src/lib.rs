//! Wire types and result decoding for the EkaScribe medical transcription API.
//!
//! This crate has no I/O. It describes every request and response body the
//! transcription workflow exchanges with the service, the per-output status
//! taxonomy, and the decoder that turns a finished output's base64 payload
//! into a JSON document.
//!
//! # Example
//!
//! ```
//! use ekascribe_protocol::{decode_output, Output};
//!
//! let output = Output {
//!     template_id: "transcript_template".to_string(),
//!     status: "success".to_string(),
//!     encoded_value: "eyJhIjoxfQ==".to_string(),
//!     ..Default::default()
//! };
//!
//! let decoded = decode_output(&output);
//! assert_eq!(decoded.document, Some(serde_json::json!({ "a": 1 })));
//! ```

mod auth;
mod decode;
mod serde_util;
mod status;
mod transaction;
mod upload;

pub use auth::{LoginRequest, RefreshRequest, Token};
pub use decode::{
    decode_output, decode_outputs, decode_value, preview, DecodeError, DecodeFailure,
    DecodedOutput, PREVIEW_CHARS,
};
pub use status::{Output, OutputStatus, StatusData, StatusResponse, TranscriptionStatus};
pub use transaction::{
    AdditionalData, InitResult, OutputTemplate, RequestError, TranscriptionRequest,
};
pub use upload::{
    DescriptorError, PresignedUploadResponse, UploadData, UploadTarget, UploadedFile,
};
