use std::{any::Any, collections::BTreeMap};

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

use crate::repository::RepositoryError;
use crate::validation::UploadError;

/// Field name → ordered list of messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key used when an error is not tied to a particular field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const VALIDATION_FAILED_MESSAGE: &str = "Validation failed. Please check the errors below.";
pub const UNEXPECTED_ERROR_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Envelope
///
/// The uniform body of every API response:
///
/// ```json
/// { "status": "success" | "error", "message": "...", "data": ..., "errors": {...} }
/// ```
///
/// At most one of `data` and `errors` is present. Absent members are omitted rather than
/// serialized as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

/// ApiResponse
///
/// An envelope paired with the HTTP status it is sent with.
#[derive(Debug)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub envelope: Envelope<T>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

/// success
///
/// Builds a success envelope. `data` is omitted from the body when it is `None`.
pub fn success<T>(data: Option<T>, message: impl Into<String>, status: StatusCode) -> ApiResponse<T> {
    ApiResponse {
        status,
        envelope: Envelope {
            status: ResponseStatus::Success,
            message: message.into(),
            data,
            errors: None,
        },
    }
}

/// Shorthand for a `200 OK` success envelope carrying `data`.
pub fn ok<T>(data: T) -> ApiResponse<T> {
    success(Some(data), "Success", StatusCode::OK)
}

/// error
///
/// Builds an error envelope. Empty or missing field errors are omitted.
pub fn error(
    message: impl Into<String>,
    errors: Option<FieldErrors>,
    status: StatusCode,
) -> ApiResponse<()> {
    ApiResponse {
        status,
        envelope: Envelope {
            status: ResponseStatus::Error,
            message: message.into(),
            data: None,
            errors: errors.filter(|errors| !errors.is_empty()),
        },
    }
}

/// ErrorDetail
///
/// Shape of the detail attached to a failure before it is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorDetail {
    /// Field-level validation errors.
    Fields(FieldErrors),
    /// Errors not tied to a field. The first one becomes the message.
    List(Vec<String>),
    /// A single human-readable message.
    Message(String),
    /// Nothing beyond the status code.
    Empty,
}

/// default_message
///
/// Fallback message chosen purely from the status code.
pub fn default_message(status: StatusCode) -> &'static str {
    match status.as_u16() {
        400 => "Bad request. Please check your input.",
        401 => "Authentication required.",
        403 => "You don't have permission to perform this action.",
        404 => "Resource not found.",
        405 => "Method not allowed.",
        429 => "Too many requests. Please slow down.",
        code if code >= 500 => "Server error. Please try again later.",
        _ => "An error occurred.",
    }
}

/// translate
///
/// Maps an error detail and status onto the error envelope:
///
/// * field errors keep their mapping and get the generic validation message;
/// * list errors collapse into `non_field_errors` with the first entry promoted to `message`;
/// * a plain message is used as is;
/// * whatever is still missing falls back to [`default_message`].
pub fn translate(status: StatusCode, detail: ErrorDetail) -> ApiResponse<()> {
    let (message, errors) = match detail {
        ErrorDetail::Fields(fields) => (Some(VALIDATION_FAILED_MESSAGE.to_string()), Some(fields)),
        ErrorDetail::List(list) => {
            let first = list.first().cloned();
            let errors = FieldErrors::from([(NON_FIELD_ERRORS.to_string(), list)]);
            (first, Some(errors))
        }
        ErrorDetail::Message(message) => (Some(message), None),
        ErrorDetail::Empty => (None, None),
    };

    let message = message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| default_message(status).to_string());

    error(message, errors, status)
}

/// ApiError
///
/// The single error type handlers return. Converting it into a response is the global
/// translation point: internal failures are logged here and replaced by a generic 500 so
/// that no internal detail reaches the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("bad request: {0:?}")]
    BadRequest(Vec<String>),

    #[error("authentication required")]
    Unauthorized,

    #[error("permission denied")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("throttled for {retry_after}s")]
    TooManyRequests { retry_after: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// A validation failure on a single field.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::Validation(FieldErrors::from([(field.into(), vec![message.into()])]))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(self) -> ErrorDetail {
        match self {
            ApiError::Validation(fields) => ErrorDetail::Fields(fields),
            ApiError::BadRequest(list) => ErrorDetail::List(list),
            ApiError::Internal(_) => ErrorDetail::Message(UNEXPECTED_ERROR_MESSAGE.to_string()),
            ApiError::TooManyRequests { retry_after } => ErrorDetail::Message(format!(
                "Request was throttled. Expected available in {retry_after} seconds."
            )),
            _ => ErrorDetail::Empty,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Unhandled error");
        }
        let retry_after = match &self {
            ApiError::TooManyRequests { retry_after } => Some(*retry_after),
            _ => None,
        };
        let status = self.status_code();
        let mut response = translate(status, self.detail()).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Request members whose wire name differs from the Rust field name.
fn wire_name(field: &str) -> &str {
    match field {
        "youtube_url" => "youtubeUrl",
        other => other,
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, failures) in errors.field_errors() {
            let messages = failures.iter().map(|failure| match &failure.message {
                Some(message) => message.to_string(),
                None => failure.code.to_string(),
            });
            fields
                .entry(wire_name(&field).to_string())
                .or_default()
                .extend(messages);
        }
        ApiError::Validation(fields)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(vec![rejection.body_text()])
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(vec![rejection.body_text()])
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::BadRequest(vec![rejection.body_text()])
    }
}

/// Attaches an upload failure to the form field it came from.
pub fn upload_error(field: &str, err: UploadError) -> ApiError {
    match err {
        UploadError::Io(e) => ApiError::Internal(format!("reading upload field {field}: {e}")),
        other => ApiError::field(field, other.to_string()),
    }
}

/// ApiJson
///
/// `Json` whose rejection is rendered as an error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// ApiPath
///
/// `Path` whose rejection is rendered as an error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Router fallback for unknown routes.
pub async fn not_found_fallback() -> ApiError {
    ApiError::NotFound
}

/// Router fallback for known routes called with the wrong method.
pub async fn method_not_allowed_fallback() -> ApiError {
    ApiError::MethodNotAllowed
}

/// handle_panic
///
/// Used by `CatchPanicLayer`: logs the panic payload and answers with the generic 500.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
