use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use storeops_core::DomainError;
use storeops_infra::WorkflowError;

/// Failure of one request, rendered as `{"error": code, "message": text}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("{0}")]
    BadRequest(String),

    /// The blocking worker running the workflow died.
    #[error("request worker failed: {0}")]
    Worker(String),
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Workflow(WorkflowError::Domain(value))
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            ApiError::Worker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ApiError::Workflow(err) => workflow_status(err),
        }
    }
}

fn workflow_status(err: &WorkflowError) -> (StatusCode, &'static str) {
    match err {
        WorkflowError::Domain(domain) => domain_status(domain),
        WorkflowError::ConcurrencyConflict(_) => (StatusCode::CONFLICT, "concurrency_conflict"),
        WorkflowError::PersistenceFailure(_) => (StatusCode::SERVICE_UNAVAILABLE, "persistence_failure"),
        WorkflowError::CorruptStream { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_stream"),
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, "validation_error"),
        DomainError::InvariantViolation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation"),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
        DomainError::InvalidStateTransition { .. } => (StatusCode::BAD_REQUEST, "invalid_state_transition"),
        DomainError::InsufficientStock { .. } => (StatusCode::BAD_REQUEST, "insufficient_stock"),
        DomainError::InsufficientLoyaltyPoints { .. } => {
            (StatusCode::BAD_REQUEST, "insufficient_loyalty_points")
        }
        DomainError::OverReceipt { .. } => (StatusCode::BAD_REQUEST, "over_receipt"),
        DomainError::NoInventoryToAudit(_) => (StatusCode::BAD_REQUEST, "no_inventory_to_audit"),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, code, "request failed");
        } else {
            warn!(error = %self, code, "request rejected");
        }
        json_error(status, code, self.to_string())
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
