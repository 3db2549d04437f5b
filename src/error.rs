use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::ErrorBody;

/// ConfigError
///
/// Raised while the route table is being assembled. Every variant is fatal:
/// the process must not start serving with a half-built table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid route path `{path}`: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid router prefix `{prefix}`: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("route `{path}` has an empty handler chain")]
    EmptyChain { path: String },

    #[error("route `{path}` does not end with a controller")]
    MissingController { path: String },

    #[error("route `{path}`: controller `{link}` must be the last link of the chain")]
    ControllerNotLast { path: String, link: &'static str },

    #[error("method `{0}` cannot be routed")]
    UnsupportedMethod(Method),

    #[error("route {method} {path} is already registered")]
    DuplicateRoute { method: Method, path: String },
}

/// UploadError
///
/// Failures of the image upload controller, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("no image found in field `file`")]
    MissingFile,

    #[error("uploaded image is empty")]
    EmptyFile,

    #[error("unsupported image type `{0}`")]
    UnsupportedType(String),

    #[error("image exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("storage backend rejected the upload")]
    Storage(String),

    #[error("failed to record the uploaded image")]
    Persistence(String),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::Multipart(_) | UploadError::MissingFile | UploadError::EmptyFile => {
                StatusCode::BAD_REQUEST
            }
            UploadError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Storage(_) => StatusCode::BAD_GATEWAY,
            UploadError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            // Backend details stay in the logs.
            UploadError::Storage(detail) | UploadError::Persistence(detail) => {
                tracing::error!(status = %status, detail = %detail, "{}", self);
            }
            _ => tracing::warn!(status = %status, "{}", self),
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}
