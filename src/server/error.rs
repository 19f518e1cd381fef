//! HTTP error bodies: `{"error": "...", "kind": "..."}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pipeline::{ErrorKind, PipelineError};

/// Status used when the caller went away before the run finished.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug)]
pub enum ApiError {
    /// A pipeline run ended in failure.
    Pipeline(PipelineError),
    /// The request body was not a valid speech request.
    BadBody(String),
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Pipeline(err) => status_for(err.kind()),
            ApiError::BadBody(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            ApiError::Pipeline(err) => err.kind().label(),
            ApiError::BadBody(_) => ErrorKind::Validation.label(),
            ApiError::NotFound => "not_found",
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Pipeline(err)
    }
}

/// Status code for each pipeline error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Configuration => StatusCode::BAD_REQUEST,
        ErrorKind::TranslationFailure | ErrorKind::SynthesisFailure | ErrorKind::Encoding => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorKind::Cancelled => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind_label();
        let message = match self {
            ApiError::Pipeline(err) => err.to_string(),
            ApiError::BadBody(message) => message,
            ApiError::NotFound => "Not found".to_string(),
        };

        (
            status,
            Json(json!({
                "error": message,
                "kind": kind,
            })),
        )
            .into_response()
    }
}
