//! # Error Types
//!
//! [`ServiceError`] is what the certificate service and expiry monitor
//! return. [`AppError`] is the HTTP face of it: it implements
//! `axum::response::IntoResponse`, picks the status code, and renders the
//! `{"error": {"code", "message"}}` body. Internal details are logged and
//! never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use holdcert_core::ValidationError;
use holdcert_state::{RegistryError, TransitionError};
use holdcert_storage::StorageError;

/// Errors from certificate and monitor operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// A certificate or linked record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A uniqueness invariant would be violated.
    #[error("{0}")]
    Conflict(String),

    /// The lifecycle operation is not permitted in the current state.
    #[error(transparent)]
    InvalidTransition(TransitionError),

    /// The storage backend failed.
    #[error(transparent)]
    Storage(StorageError),

    /// The certificate record could not be written durably.
    #[error("{0}")]
    Persistence(String),
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => Self::NotFound(format!("certificate {id} not found")),
            RegistryError::Conflict(msg) => Self::Conflict(msg),
            RegistryError::Transition(TransitionError::Validation(v)) => Self::Validation(v),
            RegistryError::Transition(t) => Self::InvalidTransition(t),
            RegistryError::Validation(v) => Self::Validation(v),
            RegistryError::Persistence(msg) => Self::Persistence(msg),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => Self::NotFound(format!("artifact {key} not found")),
            other => Self::Storage(other),
        }
    }
}

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error detail.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code (`NOT_FOUND`, `CONFLICT`, ...).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => Self::NotFound(msg),
            ServiceError::Validation(v) => Self::Validation(v.to_string()),
            ServiceError::Conflict(msg) => Self::Conflict(msg),
            ServiceError::InvalidTransition(t) => Self::Conflict(t.to_string()),
            ServiceError::Storage(s) => Self::Internal(s.to_string()),
            ServiceError::Persistence(msg) => Self::Internal(msg),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdcert_core::CertificateId;
    use holdcert_state::{CertificateStatus, TransitionKind};

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[test]
    fn registry_errors_map_through_service_errors() {
        let id = CertificateId::new();
        let nf: AppError = ServiceError::from(RegistryError::NotFound(id)).into();
        assert!(matches!(nf, AppError::NotFound(_)));

        let bad: AppError = ServiceError::from(RegistryError::Transition(
            TransitionError::InvalidTransition {
                operation: TransitionKind::Renew,
                from: CertificateStatus::Pending,
                to: CertificateStatus::Active,
            },
        ))
        .into();
        assert!(matches!(bad, AppError::Conflict(_)));

        let zero: AppError = ServiceError::from(RegistryError::Transition(
            TransitionError::Validation(ValidationError::InvalidField {
                field: "extension_months",
                reason: "must be at least 1".into(),
            }),
        ))
        .into();
        assert!(matches!(zero, AppError::Validation(_)));
    }

    #[test]
    fn storage_not_found_is_not_found() {
        let err: AppError = ServiceError::from(StorageError::NotFound("k".into())).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
