//! Multipart upload of local audio files to a presigned storage target.

use std::io::ErrorKind;
use std::path::Path;

use ekascribe_protocol::{UploadTarget, UploadedFile};
use log::{debug, error, info};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use super::client::{error_body, EkaClient};
use super::error::{BatchUploadError, UploadError};

const KEY_FIELD: &str = "key";
const FILE_FIELD: &str = "file";

/// Value of one multipart field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File { file_name: String, bytes: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

/// Ordered multipart form for one file upload.
///
/// The storage endpoint requires `key` first and the file content last, with
/// the presigned fields in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    parts: Vec<FormPart>,
}

impl UploadForm {
    pub fn build(target: &UploadTarget, file_name: &str, bytes: Vec<u8>) -> Self {
        let mut parts = Vec::with_capacity(target.fields().len() + 2);

        parts.push(FormPart {
            name: KEY_FIELD.to_string(),
            value: FormValue::Text(target.object_key(file_name)),
        });

        for (name, value) in target.fields() {
            // Skip key as we already added it
            if name == KEY_FIELD {
                continue;
            }
            parts.push(FormPart {
                name: name.clone(),
                value: FormValue::Text(value.clone()),
            });
        }

        // The file MUST be last
        parts.push(FormPart {
            name: FILE_FIELD.to_string(),
            value: FormValue::File {
                file_name: file_name.to_string(),
                bytes,
            },
        });

        Self { parts }
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn into_multipart(self) -> Form {
        self.parts
            .into_iter()
            .fold(Form::new(), |form, part| match part.value {
                FormValue::Text(value) => form.text(part.name, value),
                FormValue::File { file_name, bytes } => {
                    form.part(part.name, Part::bytes(bytes).file_name(file_name))
                }
            })
    }
}

impl EkaClient {
    /// Upload local files to the target, in input order.
    ///
    /// Stops at the first file that is missing or rejected. Files uploaded
    /// before the failure are returned in [`BatchUploadError::completed`].
    pub async fn upload_files<P: AsRef<Path>>(
        &self,
        target: &UploadTarget,
        paths: &[P],
    ) -> Result<Vec<UploadedFile>, BatchUploadError> {
        self.upload_files_until(target, paths, &CancellationToken::new())
            .await
    }

    /// [`EkaClient::upload_files`] that stops when `cancel` fires.
    ///
    /// The file in flight at cancellation is abandoned and not recorded;
    /// files finished before it stay in [`BatchUploadError::completed`].
    pub async fn upload_files_until<P: AsRef<Path>>(
        &self,
        target: &UploadTarget,
        paths: &[P],
        cancel: &CancellationToken,
    ) -> Result<Vec<UploadedFile>, BatchUploadError> {
        let mut uploaded = Vec::with_capacity(paths.len());

        for path in paths {
            let result = if cancel.is_cancelled() {
                Err(UploadError::Cancelled)
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(UploadError::Cancelled),
                    result = self.upload_file(target, path.as_ref()) => result,
                }
            };

            match result {
                Ok(file) => uploaded.push(file),
                Err(error) => {
                    if matches!(error, UploadError::Cancelled) {
                        info!("Upload cancelled after {} file(s)", uploaded.len());
                    }
                    return Err(BatchUploadError {
                        completed: uploaded,
                        error,
                    });
                }
            }
        }

        info!(
            "Uploaded {} file(s) for transaction {}",
            uploaded.len(),
            target.transaction_id()
        );
        Ok(uploaded)
    }

    /// Upload a single file to the target
    pub async fn upload_file(
        &self,
        target: &UploadTarget,
        path: &Path,
    ) -> Result<UploadedFile, UploadError> {
        // Validate file before any request is made for it
        match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                error!("Not a file: {:?}", path);
                return Err(UploadError::FileNotFound(path.to_path_buf()));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("File not found: {:?}", path);
                return Err(UploadError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => {
                error!("Cannot access {:?}: {}", path, e);
                return Err(UploadError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| UploadError::InvalidFileName(path.to_path_buf()))?
            .to_string();

        let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let size_bytes = bytes.len() as u64;
        let key = target.object_key(&file_name);

        debug!("Uploading {} ({} bytes) as {}", file_name, size_bytes, key);

        let form = UploadForm::build(target, &file_name, bytes).into_multipart();
        let response = self
            .storage
            .post(target.url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Upload request error for {}: {}", file_name, e);
                UploadError::Request {
                    file_name: file_name.clone(),
                    source: e,
                }
            })?;

        if !matches!(response.status(), StatusCode::OK | StatusCode::NO_CONTENT) {
            let (status, body) = error_body(response).await;
            error!("Upload failed for {} ({}): {}", file_name, status, body);
            return Err(UploadError::Rejected {
                file_name,
                status,
                body,
            });
        }

        Ok(UploadedFile {
            key,
            file_name,
            size_bytes,
            success: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn target(fields: &[(&str, &str)]) -> UploadTarget {
        let fields: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        UploadTarget::new("https://bucket.s3.amazonaws.com", fields, "/txn123/", "txn123")
    }

    #[test]
    fn test_form_puts_key_first_and_file_last() {
        let test_cases = vec![
            ("no presigned fields", vec![]),
            ("one field", vec![("policy", "p")]),
            (
                "many fields with a stale key",
                vec![
                    ("key", "stale/${filename}"),
                    ("policy", "p"),
                    ("x-amz-algorithm", "AWS4-HMAC-SHA256"),
                    ("x-amz-credential", "c"),
                    ("x-amz-date", "d"),
                    ("x-amz-signature", "s"),
                ],
            ),
        ];

        for (description, fields) in test_cases {
            let form = UploadForm::build(&target(&fields), "a.mp3", b"audio".to_vec());
            let names = form.field_names();

            assert_eq!(names.first(), Some(&"key"), "{}", description);
            assert_eq!(names.last(), Some(&"file"), "{}", description);
            assert_eq!(
                names.iter().filter(|n| **n == "key").count(),
                1,
                "{}: key must not be duplicated",
                description
            );
        }
    }

    #[test]
    fn test_form_key_is_folder_path_plus_file_name() {
        let form = UploadForm::build(&target(&[("policy", "p")]), "b.mp3", vec![1, 2, 3]);

        assert_eq!(
            form.parts()[0].value,
            FormValue::Text("/txn123/b.mp3".to_string())
        );
        assert_eq!(form.field_names(), vec!["key", "policy", "file"]);
        assert_eq!(
            form.parts()[2].value,
            FormValue::File {
                file_name: "b.mp3".to_string(),
                bytes: vec![1, 2, 3],
            }
        );
    }

    fn client() -> EkaClient {
        EkaClient::new(
            crate::clients::ClientConfig::default(),
            crate::clients::Credentials::new("id", "secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unusable_paths_fail_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let regular = dir.path().join("a.mp3");
        std::fs::write(&regular, b"audio").unwrap();

        let test_cases = vec![
            ("missing file", dir.path().join("missing.mp3"), "not found"),
            ("directory", dir.path().to_path_buf(), "not found"),
            ("path below a regular file", regular.join("b.mp3"), "io"),
        ];

        let target = target(&[("policy", "p")]);
        for (description, path, expected) in test_cases {
            let err = client().upload_file(&target, &path).await.unwrap_err();
            let kind = match err {
                UploadError::FileNotFound(_) => "not found",
                UploadError::Io { .. } => "io",
                other => panic!("{}: unexpected error {:?}", description, other),
            };
            assert_eq!(kind, expected, "{}", description);
        }
    }

    #[tokio::test]
    async fn test_cancelled_batch_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.mp3");
        std::fs::write(&path, b"audio").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client()
            .upload_files_until(&target(&[]), &[path], &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(err.completed.is_empty());
    }
}
