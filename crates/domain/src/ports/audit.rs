use crate::audit::AuditLogEntry;
use crate::tenant::TenantId;

use super::BoxFuture;
use super::records::StoreError;

pub trait AuditLogRepository: Send + Sync {
    fn append(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<(), StoreError>>;

    fn list_for_entity(
        &self,
        tenant: &TenantId,
        entity: &str,
        entity_id: &str,
    ) -> BoxFuture<'_, Result<Vec<AuditLogEntry>, StoreError>>;
}
