use axum::{Json, http::StatusCode, response::IntoResponse};
use caresync_domain::error::DomainError;
use caresync_domain::tenant::TenantError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    /// Message is the underlying failure, passed through to the caller.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Identity(err) => ApiError::Unauthorized(err.to_string()),
            DomainError::Tenant(TenantError::NoTenantAssigned) => {
                ApiError::Unauthorized(TenantError::NoTenantAssigned.to_string())
            }
            DomainError::Tenant(err @ TenantError::LookupFailed(_)) => {
                ApiError::Internal(err.to_string())
            }
            DomainError::ValidationFailed(errors) => ApiError::BadRequest(errors.to_string()),
            DomainError::Conflict => ApiError::Conflict("conflict".to_string()),
            DomainError::NotFound => ApiError::Internal("record not found".to_string()),
            err @ (DomainError::CrossTenantWrite | DomainError::PersistenceFailed(_)) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
