//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coordinator::{ExternalCallError, StepFailure, UpdateError};
use domain::DomainError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Two-phase update error.
    Update(UpdateError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, error_body(msg)),
            ApiError::Domain(err) => (domain_error_status(&err), error_body(err.to_string())),
            ApiError::Update(err) => update_error_to_response(err),
        };

        (status, axum::Json(body)).into_response()
    }
}

fn error_body(message: String) -> serde_json::Value {
    serde_json::json!({ "error": message })
}

fn store_error_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::ConcurrencyConflict { .. } => StatusCode::CONFLICT,
        e if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn domain_error_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::UserNotFound(_) => StatusCode::NOT_FOUND,
        DomainError::UserAlreadyExists(_) => StatusCode::CONFLICT,
        DomainError::User(_) => StatusCode::UNPROCESSABLE_ENTITY,
        DomainError::Store(e) => store_error_status(e),
    }
}

fn update_error_status(err: &UpdateError) -> StatusCode {
    match err {
        UpdateError::NotFound(_) => StatusCode::NOT_FOUND,
        UpdateError::Step1Failed(failure) => match failure {
            StepFailure::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StepFailure::Missing(_) => StatusCode::NOT_FOUND,
            StepFailure::Superseded { .. } => StatusCode::CONFLICT,
            StepFailure::Store(e) => store_error_status(e),
        },
        UpdateError::ExternalCallFailed(ExternalCallError::Timeout(_)) => {
            StatusCode::GATEWAY_TIMEOUT
        }
        UpdateError::ExternalCallFailed(_) => StatusCode::BAD_GATEWAY,
        UpdateError::Step2Failed { .. } | UpdateError::CompensationFailed { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn update_error_to_response(err: UpdateError) -> (StatusCode, serde_json::Value) {
    let status = update_error_status(&err);
    if err.requires_manual_intervention() {
        tracing::error!(error = %err, "update requires manual intervention");
    }

    let compensated = matches!(
        err,
        UpdateError::Step2Failed {
            compensated: true,
            ..
        }
    );
    let body = serde_json::json!({
        "error": err.to_string(),
        "kind": err.kind(),
        "partial": err.is_partial(),
        "compensated": compensated,
        "manual_intervention_required": err.requires_manual_intervention(),
    });
    (status, body)
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        ApiError::Update(err)
    }
}
