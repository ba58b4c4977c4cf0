//! Mapping of orchestrator errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use tunefetch_core::OrchestratorError;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// An orchestrator error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(kind = self.0.kind(), "Request failed: {}", self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// HTTP status for each error kind.
pub fn status_for(error: &OrchestratorError) -> StatusCode {
    match error {
        OrchestratorError::NoMatchFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        OrchestratorError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::ExecutorClosed => StatusCode::SERVICE_UNAVAILABLE,
        OrchestratorError::DownloadFailed(_) => StatusCode::BAD_GATEWAY,
        OrchestratorError::FileNotProduced => StatusCode::INTERNAL_SERVER_ERROR,
        OrchestratorError::ConfigurationConflict { .. } => StatusCode::CONFLICT,
        OrchestratorError::InvalidSettings(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::Cancelled => StatusCode::GONE,
        OrchestratorError::Search(_) => StatusCode::FAILED_DEPENDENCY,
        OrchestratorError::SearcherUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}
