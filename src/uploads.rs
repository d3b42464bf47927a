use std::collections::HashMap;

use axum::extract::{Multipart, multipart::MultipartError};
use bytes::Bytes;

use crate::{
    AppState,
    models::REQUIRED_MESSAGE,
    response::{ApiError, FieldErrors, upload_error},
    storage::object_key,
    validation::{UploadCandidate, UploadPolicy, validate_upload},
};

/// UploadedFile
///
/// A file part of a multipart form, buffered in memory. `filename` is the raw client value.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Bytes,
}

/// MultipartForm
///
/// A multipart body split into text fields and file parts. A later part with the same
/// name replaces an earlier one.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// collect
    ///
    /// Drains the request body. Parts carrying a filename are files, everything else is text.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let bytes = field.bytes().await.map_err(malformed)?;
                    form.files.insert(name, UploadedFile { filename, bytes });
                }
                None => {
                    let text = field.text().await.map_err(malformed)?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    /// Trimmed, non-empty text value.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Text value that must be present; records a field error otherwise.
    pub fn required(&self, name: &str, errors: &mut FieldErrors) -> String {
        match self.text(name) {
            Some(value) => value.to_string(),
            None => {
                push_error(errors, name, REQUIRED_MESSAGE);
                String::new()
            }
        }
    }

    /// Removes and returns a file part. Parts with an empty filename count as absent.
    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name).filter(|file| !file.filename.is_empty())
    }
}

fn malformed(err: MultipartError) -> ApiError {
    ApiError::BadRequest(vec![err.body_text()])
}

/// Appends `message` to the error list of `field`.
pub fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

/// Turns collected field errors into a validation failure, if there are any.
pub fn check(errors: FieldErrors) -> Result<(), ApiError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

/// store_upload
///
/// Validates `file` against `policy` and stores it under `prefix`. Returns the storage key.
/// Validation failures are reported against the form field `field`.
pub async fn store_upload(
    state: &AppState,
    field: &str,
    file: UploadedFile,
    policy: &UploadPolicy,
    prefix: &str,
) -> Result<String, ApiError> {
    let mut candidate = UploadCandidate::from_bytes(&file.filename, file.bytes);

    let validated = validate_upload(&mut candidate, policy, state.config.mime_mode).map_err(|e| {
        tracing::warn!(field, filename = %candidate.filename, error = %e, "Upload rejected");
        upload_error(field, e)
    })?;

    let key = object_key(prefix, &validated.filename);
    state
        .storage
        .put_object(&key, candidate.content.into_inner(), validated.content_type)
        .await
        .map_err(|e| ApiError::Internal(format!("storing {key}: {e}")))?;

    tracing::info!(
        field,
        key = %key,
        size = validated.size,
        content_type = validated.content_type,
        "Upload stored"
    );
    Ok(key)
}
