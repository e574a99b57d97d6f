//! Mapping from domain errors to HTTP responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use itemflow_core::{ProcessError, RepoError};
use log::error;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    /// Request body failed to parse or validate.
    BadRequest(Vec<String>),
    NotFound,
    Internal(String),
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::BadRequest(vec![err.to_string()]),
            RepoError::NotFound(_) => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ProcessError> for ApiError {
    fn from(value: ProcessError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(vec![value.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            Self::NotFound => StatusCode::NOT_FOUND.into_response(),
            Self::Internal(message) => {
                error!("event=http_request module=server status=error error={message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
