//! Tenant-scoped record upsert pipeline.
//!
//! Every write goes through the same steps: force the resolved tenant onto
//! the payload, validate it against the entity schema, stamp the timestamp
//! for the create or update branch, then hand a single upsert to the store.
//! The pipeline never audits; callers do that once the write has returned.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::DomainResult;
use crate::audit::AuditAction;
use crate::error::DomainError;
use crate::ports::records::{RecordStore, Row};
use crate::schema::RecordSchema;
use crate::tenant::TenantId;
use crate::util::now_rfc3339;

const TENANT_COLUMN: &str = "tenant_id";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOperation {
    Created,
    Updated,
}

impl WriteOperation {
    pub fn audit_action(self) -> AuditAction {
        match self {
            Self::Created => AuditAction::Create,
            Self::Updated => AuditAction::Update,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PersistedRecord {
    pub operation: WriteOperation,
    pub row: Row,
}

impl PersistedRecord {
    pub fn id(&self) -> Option<&str> {
        self.row.get("id").and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.row)
    }
}

/// Validated row ready for the store, plus the branch it took.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedWrite {
    pub operation: WriteOperation,
    pub row: Row,
}

/// Steps 1 and 2 of the pipeline, without touching storage.
pub fn prepare_write(
    schema: &RecordSchema,
    raw_payload: Value,
    tenant: &TenantId,
) -> DomainResult<PreparedWrite> {
    let mut payload = match raw_payload {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(
        TENANT_COLUMN.to_string(),
        Value::String(tenant.as_str().to_string()),
    );

    let mut row = schema
        .validate(&payload)
        .map_err(DomainError::ValidationFailed)?;
    ensure_tenant_scope(&row, tenant)?;

    let now = Value::String(now_rfc3339());
    let has_id = row.get("id").is_some_and(|id| !id.is_null());
    let operation = if has_id {
        row.remove("created_at");
        row.insert("updated_at".to_string(), now);
        WriteOperation::Updated
    } else {
        row.remove("id");
        row.remove("updated_at");
        row.insert("created_at".to_string(), now);
        WriteOperation::Created
    };

    Ok(PreparedWrite { operation, row })
}

/// Rejects any row whose tenant differs from the one resolved for the request.
pub fn ensure_tenant_scope(row: &Row, tenant: &TenantId) -> DomainResult<()> {
    match row.get(TENANT_COLUMN).and_then(Value::as_str) {
        Some(value) if value == tenant.as_str() => Ok(()),
        _ => Err(DomainError::CrossTenantWrite),
    }
}

#[derive(Clone)]
pub struct RecordUpsertPipeline {
    store: Arc<dyn RecordStore>,
}

impl RecordUpsertPipeline {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(
        &self,
        schema: &RecordSchema,
        raw_payload: Value,
        tenant: &TenantId,
    ) -> DomainResult<PersistedRecord> {
        let prepared = prepare_write(schema, raw_payload, tenant)?;

        let row = self
            .store
            .upsert(schema.table, schema.conflict_key, &prepared.row)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, table = schema.table, "record upsert failed");
                DomainError::PersistenceFailed(err.to_string())
            })?;
        ensure_tenant_scope(&row, tenant)?;

        tracing::debug!(
            table = schema.table,
            operation = ?prepared.operation,
            "record persisted"
        );
        Ok(PersistedRecord {
            operation: prepared.operation,
            row,
        })
    }

    /// Partial update of an existing row, filtered by id and tenant.
    pub async fn update_by_id(
        &self,
        schema: &RecordSchema,
        id: &str,
        patch: Map<String, Value>,
        tenant: &TenantId,
    ) -> DomainResult<Row> {
        let mut patch = schema
            .validate_patch(&patch)
            .map_err(DomainError::ValidationFailed)?;
        patch.remove(TENANT_COLUMN);
        patch.remove("id");
        patch.insert("updated_at".to_string(), Value::String(now_rfc3339()));

        let row = self
            .store
            .update(schema.table, tenant, id, &patch)
            .await
            .map_err(|err| DomainError::PersistenceFailed(err.to_string()))?
            .ok_or(DomainError::NotFound)?;
        ensure_tenant_scope(&row, tenant)?;
        Ok(row)
    }

    pub async fn delete(
        &self,
        schema: &RecordSchema,
        id: &str,
        tenant: &TenantId,
    ) -> DomainResult<Row> {
        self.store
            .delete(schema.table, tenant, id)
            .await
            .map_err(|err| DomainError::PersistenceFailed(err.to_string()))?
            .ok_or(DomainError::NotFound)
    }
}
