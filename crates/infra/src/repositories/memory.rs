use std::collections::HashMap;
use std::sync::Arc;

use caresync_domain::audit::AuditLogEntry;
use caresync_domain::identity::Actor;
use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::audit::AuditLogRepository;
use caresync_domain::ports::records::{RecordStore, Row, StoreError};
use caresync_domain::ports::tenant::TenantResolver;
use caresync_domain::tenant::{TenantError, TenantId};
use caresync_domain::util::new_record_id;
use serde_json::Value;
use tokio::sync::RwLock;

/// Table-per-`Vec` row store mirroring PostgREST upsert semantics.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<RwLock<HashMap<String, Vec<Row>>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent write fails with `message` until cleared.
    pub async fn fail_writes(&self, message: Option<&str>) {
        *self.failure.write().await = message.map(str::to_string);
    }

    /// Inserts a row as-is, bypassing the upsert rules.
    pub async fn seed(&self, table: &str, row: Row) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn total_rows(&self) -> usize {
        self.tables.read().await.values().map(Vec::len).sum()
    }

    async fn check_failure(&self) -> Result<(), StoreError> {
        match self.failure.read().await.as_ref() {
            Some(message) => Err(StoreError::Rejected(message.clone())),
            None => Ok(()),
        }
    }
}

fn same_value(row: &Row, other: &Row, column: &str) -> bool {
    match (row.get(column), other.get(column)) {
        (Some(left), Some(right)) => !left.is_null() && left == right,
        _ => false,
    }
}

fn matches_scope(row: &Row, tenant: &TenantId, id: &str) -> bool {
    row.get("id").and_then(Value::as_str) == Some(id)
        && row.get("tenant_id").and_then(Value::as_str) == Some(tenant.as_str())
}

fn rls_violation(table: &str) -> StoreError {
    StoreError::Rejected(format!(
        "new row violates row-level security policy for table \"{table}\""
    ))
}

impl RecordStore for InMemoryRecordStore {
    fn upsert(
        &self,
        table: &str,
        conflict_key: &[&str],
        row: &Row,
    ) -> BoxFuture<'_, Result<Row, StoreError>> {
        let table = table.to_string();
        let conflict_key: Vec<String> = conflict_key.iter().map(|key| key.to_string()).collect();
        let row = row.clone();
        Box::pin(async move {
            self.check_failure().await?;
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.clone()).or_default();

            let existing = rows.iter_mut().find(|candidate| {
                !conflict_key.is_empty()
                    && conflict_key
                        .iter()
                        .all(|column| same_value(candidate, &row, column))
            });

            if let Some(existing) = existing {
                if !same_value(existing, &row, "tenant_id") {
                    return Err(rls_violation(&table));
                }
                for (column, value) in row {
                    existing.insert(column, value);
                }
                return Ok(existing.clone());
            }

            // Ids are unique per table regardless of the declared conflict key.
            if let Some(id) = row.get("id").and_then(Value::as_str) {
                if rows
                    .iter()
                    .any(|candidate| candidate.get("id").and_then(Value::as_str) == Some(id))
                {
                    return Err(StoreError::Rejected(format!(
                        "duplicate key value violates unique constraint \"{table}_pkey\""
                    )));
                }
            }

            let mut stored = row;
            if stored.get("id").is_none_or(Value::is_null) {
                stored.insert("id".to_string(), Value::String(new_record_id()));
            }
            rows.push(stored.clone());
            Ok(stored)
        })
    }

    fn update(
        &self,
        table: &str,
        tenant: &TenantId,
        id: &str,
        patch: &Row,
    ) -> BoxFuture<'_, Result<Option<Row>, StoreError>> {
        let table = table.to_string();
        let tenant = tenant.clone();
        let id = id.to_string();
        let patch = patch.clone();
        Box::pin(async move {
            self.check_failure().await?;
            let mut tables = self.tables.write().await;
            let Some(row) = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|row| matches_scope(row, &tenant, &id)))
            else {
                return Ok(None);
            };
            for (column, value) in patch {
                row.insert(column, value);
            }
            Ok(Some(row.clone()))
        })
    }

    fn delete(
        &self,
        table: &str,
        tenant: &TenantId,
        id: &str,
    ) -> BoxFuture<'_, Result<Option<Row>, StoreError>> {
        let table = table.to_string();
        let tenant = tenant.clone();
        let id = id.to_string();
        Box::pin(async move {
            self.check_failure().await?;
            let mut tables = self.tables.write().await;
            let Some(rows) = tables.get_mut(&table) else {
                return Ok(None);
            };
            let position = rows.iter().position(|row| matches_scope(row, &tenant, &id));
            Ok(position.map(|index| rows.remove(index)))
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<RwLock<Vec<AuditLogEntry>>>,
    unavailable: bool,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An audit log whose appends always fail.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub async fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.read().await.clone()
    }
}

impl AuditLogRepository for InMemoryAuditLog {
    fn append(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<(), StoreError>> {
        let entry = entry.clone();
        Box::pin(async move {
            if self.unavailable {
                return Err(StoreError::Unavailable("audit log offline".to_string()));
            }
            self.entries.write().await.push(entry);
            Ok(())
        })
    }

    fn list_for_entity(
        &self,
        tenant: &TenantId,
        entity: &str,
        entity_id: &str,
    ) -> BoxFuture<'_, Result<Vec<AuditLogEntry>, StoreError>> {
        let tenant = tenant.clone();
        let entity = entity.to_string();
        let entity_id = entity_id.to_string();
        Box::pin(async move {
            let entries = self.entries.read().await;
            Ok(entries
                .iter()
                .filter(|entry| {
                    entry.tenant_id == tenant
                        && entry.entity == entity
                        && entry.entity_id == entity_id
                })
                .cloned()
                .collect())
        })
    }
}

/// User-to-tenant assignments held in process, with an optional fallback tenant.
#[derive(Clone, Default)]
pub struct InMemoryTenantDirectory {
    assignments: Arc<RwLock<HashMap<String, TenantId>>>,
    fallback: Option<TenantId>,
}

impl InMemoryTenantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(tenant: TenantId) -> Self {
        Self {
            fallback: Some(tenant),
            ..Self::default()
        }
    }

    pub async fn assign(&self, user_id: impl Into<String>, tenant: TenantId) {
        self.assignments.write().await.insert(user_id.into(), tenant);
    }
}

impl TenantResolver for InMemoryTenantDirectory {
    fn resolve_tenant(&self, actor: &Actor) -> BoxFuture<'_, Result<TenantId, TenantError>> {
        let user_id = actor.id.clone();
        Box::pin(async move {
            self.assignments
                .read()
                .await
                .get(&user_id)
                .cloned()
                .or_else(|| self.fallback.clone())
                .ok_or(TenantError::NoTenantAssigned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn composite_key_upsert_merges_into_existing_row() {
        let store = InMemoryRecordStore::new();
        let key = ["shift_id", "user_id"];
        let first = store
            .upsert(
                "shift_presence",
                &key,
                &row(json!({
                    "tenant_id": "t1",
                    "shift_id": "s1",
                    "user_id": "u1",
                    "state": "online",
                })),
            )
            .await
            .unwrap();
        let second = store
            .upsert(
                "shift_presence",
                &key,
                &row(json!({
                    "tenant_id": "t1",
                    "shift_id": "s1",
                    "user_id": "u1",
                    "state": "on_break",
                })),
            )
            .await
            .unwrap();

        assert_eq!(first.get("id"), second.get("id"));
        assert_eq!(second.get("state"), Some(&json!("on_break")));
        assert_eq!(store.rows("shift_presence").await.len(), 1);
    }

    #[tokio::test]
    async fn conflicting_row_of_another_tenant_is_rejected() {
        let store = InMemoryRecordStore::new();
        let key = ["id"];
        store
            .upsert("patients", &key, &row(json!({ "id": "p1", "tenant_id": "t1" })))
            .await
            .unwrap();
        let err = store
            .upsert("patients", &key, &row(json!({ "id": "p1", "tenant_id": "t2" })))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("row-level security"));
    }

    #[tokio::test]
    async fn update_and_delete_are_tenant_filtered() {
        let store = InMemoryRecordStore::new();
        store
            .seed("shifts", row(json!({ "id": "s1", "tenant_id": "t1", "status": "scheduled" })))
            .await;
        let patch = row(json!({ "status": "published" }));

        let foreign = store
            .update("shifts", &TenantId::new("t2"), "s1", &patch)
            .await
            .unwrap();
        assert!(foreign.is_none());

        let updated = store
            .update("shifts", &TenantId::new("t1"), "s1", &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.get("status"), Some(&json!("published")));

        assert!(
            store
                .delete("shifts", &TenantId::new("t2"), "s1")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            store
                .delete("shifts", &TenantId::new("t1"), "s1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn directory_falls_back_to_default_tenant() {
        let directory = InMemoryTenantDirectory::with_fallback(TenantId::new("dev"));
        directory.assign("u1", TenantId::new("t1")).await;
        let assigned = directory
            .resolve_tenant(&Actor::new("u1", "u1@caresync.test", true))
            .await
            .unwrap();
        let fallback = directory
            .resolve_tenant(&Actor::new("u9", "u9@caresync.test", true))
            .await
            .unwrap();
        assert_eq!(assigned, TenantId::new("t1"));
        assert_eq!(fallback, TenantId::new("dev"));

        let strict = InMemoryTenantDirectory::new();
        let err = strict
            .resolve_tenant(&Actor::new("u9", "u9@caresync.test", true))
            .await
            .unwrap_err();
        assert_eq!(err, TenantError::NoTenantAssigned);
    }
}
