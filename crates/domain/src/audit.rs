use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DomainResult;
use crate::error::DomainError;
use crate::ports::audit::AuditLogRepository;
use crate::tenant::TenantId;
use crate::util::{new_event_id, now_rfc3339};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Checkin,
    CreatePost,
    UpdateStatus,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Checkin => "CHECKIN",
            Self::CreatePost => "CREATE_POST",
            Self::UpdateStatus => "UPDATE_STATUS",
        }
    }
}

/// One immutable row of `audit_logs`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub tenant_id: TenantId,
    pub entity: String,
    pub entity_id: String,
    pub action: String,
    pub actor_id: String,
    pub payload: Value,
    pub created_at: String,
}

/// Appends audit entries after a mutation has committed.
///
/// Audit is a side channel: a failed append is logged and swallowed, the
/// mutation that triggered it stays committed.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditRecorder {
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    pub async fn record(
        &self,
        entity: &str,
        entity_id: &str,
        action: AuditAction,
        actor_id: &str,
        tenant: &TenantId,
        payload: Value,
    ) {
        let entry = AuditLogEntry {
            id: new_event_id(),
            tenant_id: tenant.clone(),
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            action: action.as_str().to_string(),
            actor_id: actor_id.to_string(),
            payload,
            created_at: now_rfc3339(),
        };

        match self.repository.append(&entry).await {
            Ok(()) => tracing::debug!(
                entity,
                entity_id,
                action = action.as_str(),
                audit_id = %entry.id,
                "audit entry appended"
            ),
            Err(err) => tracing::warn!(
                error = %err,
                entity,
                entity_id,
                action = action.as_str(),
                actor_id,
                tenant_id = %tenant,
                "audit write failed; mutation stays committed"
            ),
        }
    }

    pub async fn history(
        &self,
        tenant: &TenantId,
        entity: &str,
        entity_id: &str,
    ) -> DomainResult<Vec<AuditLogEntry>> {
        self.repository
            .list_for_entity(tenant, entity, entity_id)
            .await
            .map_err(|err| DomainError::PersistenceFailed(err.to_string()))
    }
}
