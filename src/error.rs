use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;

use crate::models::RequestStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("User idea cannot be empty")] Empty,
    #[error("User idea is too long (max {max} characters)")] TooLong { max: usize },
    #[error("Expanded prompt cannot be empty")] EmptyPrompt,
    #[error("Expanded prompt is too long (max {max} characters)")] PromptTooLong { max: usize },
    #[error("Inconsistent request: {0}")] Inconsistent(String),
}

/// Failure of a single image generation attempt. Never retried by the caller.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid expanded prompt: {0}")] InvalidPrompt(#[from] ValidationError),
    #[error("HTTP error: {0}")] Http(String),
    #[error("no image data in response")] MissingImage,
    #[error("Other: {0}")] Other(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("generation request {id} not found")] NotFound { id: i64 },
    #[error("storage unavailable: {0}")] Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)] Validation(#[from] ValidationError),
    #[error(transparent)] Generation(#[from] GenerationError),
    #[error("generation request {id} not found")] NotFound { id: i64 },
    #[error("cannot move request from {from} to {to}")] InvalidTransition { from: RequestStatus, to: RequestStatus },
    #[error("storage error: {0}")] Storage(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ServiceError::NotFound { id },
            StoreError::Unavailable(msg) => ServiceError::Storage(msg),
        }
    }
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Generation(GenerationError::InvalidPrompt(_)) => StatusCode::BAD_REQUEST,
            ServiceError::Generation(_) => StatusCode::BAD_GATEWAY,
            ServiceError::NotFound { .. } => StatusCode::NOT_FOUND,
            ServiceError::InvalidTransition { .. } => StatusCode::CONFLICT,
            ServiceError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ {}", self);
        } else {
            tracing::warn!("⚠️ {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
