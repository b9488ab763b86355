use std::fmt;

use serde::{Deserialize, Serialize};

use crate::serde_util::null_as_default;
use crate::transaction::AdditionalData;

/// Response of `GET /voice/api/v3/status/{txn_id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub data: Option<StatusData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub output: Vec<Output>,
    #[serde(default)]
    pub additional_data: Option<AdditionalData>,
}

/// One requested output within a status snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, deserialize_with = "null_as_default")]
    pub template_id: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub output_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    /// Base64 encoded UTF-8 JSON document, present once the output succeeded
    #[serde(rename = "value", default, deserialize_with = "null_as_default")]
    pub encoded_value: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: Vec<serde_json::Value>,
}

impl Output {
    pub fn status_kind(&self) -> OutputStatus {
        OutputStatus::parse(&self.status)
    }

    pub fn is_terminal(&self) -> bool {
        self.status_kind().is_terminal()
    }
}

/// Per-output status reported by the service.
///
/// Only `success` and `failed` are terminal. The service's set of in-progress
/// values is open, so anything unrecognised is kept as [`OutputStatus::Other`]
/// and treated as still running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputStatus {
    Success,
    Failed,
    Pending,
    Other(String),
}

impl OutputStatus {
    /// Parse a raw status value, ignoring ASCII case.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("success") {
            Self::Success
        } else if raw.eq_ignore_ascii_case("failed") {
            Self::Failed
        } else if raw.eq_ignore_ascii_case("pending") {
            Self::Pending
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

impl fmt::Display for OutputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failed => f.write_str("failed"),
            Self::Pending => f.write_str("pending"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Snapshot of a transaction's outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranscriptionStatus {
    pub outputs: Vec<Output>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
}

impl TranscriptionStatus {
    /// True when the snapshot has outputs and every one of them is terminal.
    pub fn is_complete(&self) -> bool {
        !self.outputs.is_empty() && self.outputs.iter().all(Output::is_terminal)
    }

    /// Number of outputs that have not reached a terminal status
    pub fn pending_count(&self) -> usize {
        self.outputs.iter().filter(|o| !o.is_terminal()).count()
    }
}

impl From<StatusResponse> for TranscriptionStatus {
    fn from(response: StatusResponse) -> Self {
        let data = response.data.unwrap_or_default();
        Self {
            outputs: data.output,
            additional_data: data.additional_data,
        }
    }
}
