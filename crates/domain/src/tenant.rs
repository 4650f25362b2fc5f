use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque tenant identifier resolved once per request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    #[error("no tenant assigned to this account")]
    NoTenantAssigned,
    #[error("tenant lookup failed: {0}")]
    LookupFailed(String),
}
