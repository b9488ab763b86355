use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Form field the uploader computes per file; never taken from the descriptor.
const KEY_FIELD: &str = "key";

/// Response of `POST /v1/file-upload?action=<tag>`
#[derive(Debug, Clone, Deserialize)]
pub struct PresignedUploadResponse {
    #[serde(rename = "uploadData")]
    pub upload_data: Option<UploadData>,
    #[serde(rename = "folderPath")]
    pub folder_path: Option<String>,
    pub txn_id: Option<String>,
}

/// Presigned storage descriptor nested in the negotiation response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadData {
    pub url: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// Reasons a negotiation response cannot be turned into an [`UploadTarget`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("response has no uploadData descriptor")]
    MissingDescriptor,
    #[error("uploadData has no url")]
    MissingUrl,
    #[error("response has no folderPath")]
    MissingFolderPath,
    #[error("response has no txn_id")]
    MissingTransactionId,
}

impl PresignedUploadResponse {
    /// Validate the response and build the upload target for this transaction.
    pub fn into_target(self) -> Result<UploadTarget, DescriptorError> {
        let upload_data = self.upload_data.ok_or(DescriptorError::MissingDescriptor)?;
        let url = non_blank(upload_data.url).ok_or(DescriptorError::MissingUrl)?;
        let folder_path = non_blank(self.folder_path).ok_or(DescriptorError::MissingFolderPath)?;
        let transaction_id = non_blank(self.txn_id).ok_or(DescriptorError::MissingTransactionId)?;

        Ok(UploadTarget::new(
            url,
            upload_data.fields,
            folder_path,
            transaction_id,
        ))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Where the files of one transaction are uploaded.
///
/// Created once per transaction by upload negotiation and read-only afterward.
/// `fields` never contains `key`: the object key is computed per file with
/// [`UploadTarget::object_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTarget {
    url: String,
    fields: BTreeMap<String, String>,
    folder_path: String,
    transaction_id: String,
}

impl UploadTarget {
    pub fn new(
        url: impl Into<String>,
        mut fields: BTreeMap<String, String>,
        folder_path: impl Into<String>,
        transaction_id: impl Into<String>,
    ) -> Self {
        fields.remove(KEY_FIELD);
        Self {
            url: url.into(),
            fields,
            folder_path: folder_path.into(),
            transaction_id: transaction_id.into(),
        }
    }

    /// Storage endpoint the multipart form is posted to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Presigned form fields, excluding `key`
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Object key of an uploaded file: `folder_path + file_name`.
    pub fn object_key(&self, file_name: &str) -> String {
        format!("{}{}", self.folder_path, file_name)
    }

    /// Location of the whole uploaded batch: `url + folder_path`.
    ///
    /// Shares its root with [`UploadTarget::object_key`], which is how the
    /// service finds the files named in the transaction request.
    pub fn batch_source_url(&self) -> String {
        format!("{}{}", self.url, self.folder_path)
    }
}

/// Record of one successfully uploaded local file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub key: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub success: bool,
}
