//! Result decoding for finished outputs.
//!
//! A successful output carries its document as standard base64 over UTF-8 JSON
//! text. Decoding failures are reported per output and never abort the batch.

use base64::{engine::general_purpose, Engine as _};
use log::warn;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::status::{Output, OutputStatus};

/// Number of characters of the raw value kept for diagnosis
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("value is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded bytes are not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("decoded text is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A decode error together with a truncated preview of the raw value
#[derive(Debug)]
pub struct DecodeFailure {
    pub error: DecodeError,
    pub preview: String,
}

impl Serialize for DecodeFailure {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("DecodeFailure", 2)?;
        state.serialize_field("error", &self.error.to_string())?;
        state.serialize_field("preview", &self.preview)?;
        state.end()
    }
}

/// A terminal output with its payload decoded.
///
/// `errors` and `warnings` are copied verbatim from the service.
#[derive(Debug, Serialize)]
pub struct DecodedOutput {
    pub template_id: String,
    #[serde(rename = "type")]
    pub output_type: String,
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decode_error: Option<DecodeFailure>,
    pub errors: Vec<Value>,
    pub warnings: Vec<Value>,
}

impl DecodedOutput {
    pub fn is_decoded(&self) -> bool {
        self.document.is_some()
    }
}

/// Decode a base64 payload into a JSON document.
///
/// Whitespace inside the payload (line-wrapped base64) is ignored.
pub fn decode_value(encoded: &str) -> Result<Value, DecodeError> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    let text = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&text)?)
}

/// First [`PREVIEW_CHARS`] characters of a raw value, marked when truncated.
pub fn preview(raw: &str) -> String {
    let mut chars = raw.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// Decode one output.
///
/// Only outputs with status `success` and a non-empty payload are decoded;
/// every other output is passed through with no document.
pub fn decode_output(output: &Output) -> DecodedOutput {
    let mut document = None;
    let mut decode_error = None;

    if output.status_kind() == OutputStatus::Success && !output.encoded_value.is_empty() {
        match decode_value(&output.encoded_value) {
            Ok(value) => document = Some(value),
            Err(error) => {
                warn!(
                    "Could not decode output '{}': {}",
                    output.template_id, error
                );
                decode_error = Some(DecodeFailure {
                    error,
                    preview: preview(&output.encoded_value),
                });
            }
        }
    }

    DecodedOutput {
        template_id: output.template_id.clone(),
        output_type: output.output_type.clone(),
        name: output.name.clone(),
        status: output.status.clone(),
        document,
        decode_error,
        errors: output.errors.clone(),
        warnings: output.warnings.clone(),
    }
}

/// Decode every output of a snapshot, preserving order.
pub fn decode_outputs(outputs: &[Output]) -> Vec<DecodedOutput> {
    outputs.iter().map(decode_output).collect()
}
