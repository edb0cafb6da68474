//! Mapping of orchestrator errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use atus_core::{upload::UploadError, OrchestratorError, StoreError};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An [`OrchestratorError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OrchestratorError::ReleaseNotFound(_)
            | OrchestratorError::AgentNotFound(_)
            | OrchestratorError::SourceNotFound(_)
            | OrchestratorError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            OrchestratorError::InvalidState { .. }
            | OrchestratorError::AgentInUse(_)
            | OrchestratorError::Store(StoreError::Conflict(_)) => StatusCode::CONFLICT,
            OrchestratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::Upload(UploadError::NotConfigured) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OrchestratorError::Upload(_) | OrchestratorError::Agent(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::Store(_) | OrchestratorError::Intake(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
