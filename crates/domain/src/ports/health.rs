use serde::Serialize;

use super::BoxFuture;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub backend: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthReport {
    pub fn healthy(backend: &'static str) -> Self {
        Self {
            backend,
            healthy: true,
            detail: None,
        }
    }

    pub fn unhealthy(backend: &'static str, detail: impl Into<String>) -> Self {
        Self {
            backend,
            healthy: false,
            detail: Some(detail.into()),
        }
    }
}

pub trait HealthProbe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, HealthReport>;
}
