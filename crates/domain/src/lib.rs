pub mod access;
pub mod audit;
pub mod entities;
pub mod error;
pub mod idempotency;
pub mod identity;
pub mod patient_actions;
pub mod ports;
pub mod schema;
pub mod shifts;
pub mod tenant;
pub mod upsert;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
