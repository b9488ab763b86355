use serde::{Deserialize, Serialize};

use crate::upload::{UploadTarget, UploadedFile};

/// Caller-supplied data attached to a transcription request.
///
/// Passed through unmodified and in insertion order.
pub type AdditionalData = serde_json::Map<String, serde_json::Value>;

const DEFAULT_MODE: &str = "dictation";
const DEFAULT_TRANSFER: &str = "non-vaded";
const DEFAULT_MODEL_TYPE: &str = "pro";
const DEFAULT_LANGUAGE: &str = "en-IN";

/// Body of `POST /voice/api/v2/transaction/init/{txn_id}`
///
/// Unset optional fields are omitted from the JSON body rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptionRequest {
    pub mode: String,
    pub transfer: String,
    #[serde(rename = "batch_s3_url")]
    pub batch_source_url: String,
    /// Uploaded file names, in upload order
    #[serde(rename = "client_generated_files")]
    pub file_names: Vec<String>,
    pub model_type: String,
    #[serde(rename = "input_language")]
    pub input_languages: Vec<String>,
    pub output_language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speciality: Option<String>,
    #[serde(rename = "output_format_template")]
    pub output_templates: Vec<OutputTemplate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
}

impl Default for TranscriptionRequest {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.to_string(),
            transfer: DEFAULT_TRANSFER.to_string(),
            batch_source_url: String::new(),
            file_names: Vec::new(),
            model_type: DEFAULT_MODEL_TYPE.to_string(),
            input_languages: vec![DEFAULT_LANGUAGE.to_string()],
            output_language: DEFAULT_LANGUAGE.to_string(),
            speciality: None,
            output_templates: Vec::new(),
            additional_data: None,
        }
    }
}

impl TranscriptionRequest {
    /// Create a request for an uploaded batch with default settings.
    ///
    /// The batch url and file names are derived from the same upload target the
    /// files were uploaded to, so the service can locate them.
    pub fn for_batch(target: &UploadTarget, uploaded: &[UploadedFile]) -> Self {
        Self {
            batch_source_url: target.batch_source_url(),
            file_names: uploaded.iter().map(|f| f.file_name.clone()).collect(),
            ..Default::default()
        }
    }

    /// Check the request before it is sent.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.batch_source_url.trim().is_empty() {
            return Err(RequestError::MissingBatchUrl);
        }
        if self.file_names.is_empty() {
            return Err(RequestError::NoFiles);
        }
        self.validate_settings()
    }

    /// Check everything except the batch location and file names, which are
    /// only known after upload.
    pub fn validate_settings(&self) -> Result<(), RequestError> {
        if self.input_languages.iter().all(|l| l.trim().is_empty()) {
            return Err(RequestError::NoInputLanguages);
        }
        if self.output_templates.is_empty() {
            return Err(RequestError::NoOutputTemplates);
        }
        if let Some(template) = self
            .output_templates
            .iter()
            .find(|t| t.template_id.trim().is_empty())
        {
            return Err(RequestError::BlankTemplateId {
                template_name: template.template_name.clone(),
            });
        }
        Ok(())
    }
}

/// Requested output artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTemplate {
    pub template_id: String,
    #[serde(default)]
    pub codification_needed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

impl OutputTemplate {
    pub fn new(template_id: impl Into<String>) -> Self {
        Self {
            template_id: template_id.into(),
            codification_needed: false,
            template_type: None,
            template_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("batch source url is empty")]
    MissingBatchUrl,
    #[error("request names no uploaded files")]
    NoFiles,
    #[error("at least one input language is required")]
    NoInputLanguages,
    #[error("at least one output template is required")]
    NoOutputTemplates,
    #[error("output template {template_name:?} has a blank template id")]
    BlankTemplateId { template_name: Option<String> },
}

/// Response of transaction initialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "txn_id", default)]
    pub transaction_id: String,
    #[serde(rename = "b_id", default)]
    pub batch_id: String,
}
