use thiserror::Error;

use crate::identity::IdentityError;
use crate::schema::ValidationErrors;
use crate::tenant::TenantError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error("validation failed: {0}")]
    ValidationFailed(ValidationErrors),
    #[error("record tenant does not match the resolved tenant")]
    CrossTenantWrite,
    #[error("{0}")]
    PersistenceFailed(String),
    #[error("not found")]
    NotFound,
    #[error("conflict")]
    Conflict,
}
