use caresync_domain::audit::AuditLogEntry;
use caresync_domain::identity::Actor;
use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::audit::AuditLogRepository;
use caresync_domain::ports::records::{RecordStore, Row, StoreError};
use caresync_domain::ports::tenant::TenantResolver;
use caresync_domain::tenant::{TenantError, TenantId};
use serde_json::{Value, json};

use super::{KeyRole, SupabaseClient, SupabaseError};

const AUDIT_TABLE: &str = "audit_logs";
const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=representation";
const PREFER_REPRESENTATION: &str = "return=representation";
const PREFER_MINIMAL: &str = "return=minimal";

fn store_error(err: SupabaseError) -> StoreError {
    match err {
        SupabaseError::Transport(message) | SupabaseError::Configuration(message) => {
            StoreError::Unavailable(message)
        }
        SupabaseError::InvalidResponse(message) => StoreError::InvalidResponse(message),
        SupabaseError::Status { message, .. } => StoreError::Rejected(message),
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// PostgREST answers `return=representation` writes with an array of rows.
fn first_row(value: Value) -> Result<Option<Row>, StoreError> {
    match value {
        Value::Array(rows) => match rows.into_iter().next() {
            Some(Value::Object(row)) => Ok(Some(row)),
            Some(other) => Err(StoreError::InvalidResponse(format!(
                "expected row object, got {other}"
            ))),
            None => Ok(None),
        },
        Value::Object(row) => Ok(Some(row)),
        Value::Null => Ok(None),
        other => Err(StoreError::InvalidResponse(format!(
            "expected row array, got {other}"
        ))),
    }
}

/// Row writes through PostgREST, signed with the service-role key.
#[derive(Clone)]
pub struct PostgrestRecordStore {
    client: SupabaseClient,
}

impl PostgrestRecordStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    async fn write(
        &self,
        request: reqwest::RequestBuilder,
        table: &str,
    ) -> Result<Option<Row>, StoreError> {
        let request = self
            .client
            .sign(request, KeyRole::ServiceRole, None)
            .map_err(store_error)?;
        let body = self.client.send_json(request).await.map_err(|err| {
            tracing::warn!(table, error = %err, "postgrest write failed");
            store_error(err)
        })?;
        first_row(body)
    }
}

impl RecordStore for PostgrestRecordStore {
    fn upsert(
        &self,
        table: &str,
        conflict_key: &[&str],
        row: &Row,
    ) -> BoxFuture<'_, Result<Row, StoreError>> {
        let table = table.to_string();
        let on_conflict = conflict_key.join(",");
        let body = Value::Array(vec![Value::Object(row.clone())]);
        Box::pin(async move {
            let request = self
                .client
                .http()
                .post(self.client.rest_url(&table))
                .query(&[("on_conflict", on_conflict.as_str())])
                .header("Prefer", PREFER_UPSERT)
                .json(&body);
            self.write(request, &table).await?.ok_or_else(|| {
                StoreError::InvalidResponse(format!("upsert into {table} returned no row"))
            })
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
        let filters = [("id", eq(id)), ("tenant_id", eq(tenant.as_str()))];
        let body = Value::Object(patch.clone());
        Box::pin(async move {
            let request = self
                .client
                .http()
                .patch(self.client.rest_url(&table))
                .query(&filters)
                .header("Prefer", PREFER_REPRESENTATION)
                .json(&body);
            self.write(request, &table).await
        })
    }

    fn delete(
        &self,
        table: &str,
        tenant: &TenantId,
        id: &str,
    ) -> BoxFuture<'_, Result<Option<Row>, StoreError>> {
        let table = table.to_string();
        let filters = [("id", eq(id)), ("tenant_id", eq(tenant.as_str()))];
        Box::pin(async move {
            let request = self
                .client
                .http()
                .delete(self.client.rest_url(&table))
                .query(&filters)
                .header("Prefer", PREFER_REPRESENTATION);
            self.write(request, &table).await
        })
    }
}

#[derive(Clone)]
pub struct PostgrestAuditLog {
    client: SupabaseClient,
}

impl PostgrestAuditLog {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }
}

impl AuditLogRepository for PostgrestAuditLog {
    fn append(&self, entry: &AuditLogEntry) -> BoxFuture<'_, Result<(), StoreError>> {
        let body = serde_json::to_value(entry);
        Box::pin(async move {
            let body = body.map_err(|err| StoreError::InvalidResponse(err.to_string()))?;
            let request = self
                .client
                .http()
                .post(self.client.rest_url(AUDIT_TABLE))
                .header("Prefer", PREFER_MINIMAL)
                .json(&body);
            let request = self
                .client
                .sign(request, KeyRole::ServiceRole, None)
                .map_err(store_error)?;
            self.client.send(request).await.map_err(store_error)?;
            Ok(())
        })
    }

    fn list_for_entity(
        &self,
        tenant: &TenantId,
        entity: &str,
        entity_id: &str,
    ) -> BoxFuture<'_, Result<Vec<AuditLogEntry>, StoreError>> {
        let filters = [
            ("tenant_id", eq(tenant.as_str())),
            ("entity", eq(entity)),
            ("entity_id", eq(entity_id)),
            ("order", "created_at.asc".to_string()),
        ];
        Box::pin(async move {
            let request = self
                .client
                .http()
                .get(self.client.rest_url(AUDIT_TABLE))
                .query(&filters);
            let request = self
                .client
                .sign(request, KeyRole::ServiceRole, None)
                .map_err(store_error)?;
            let body = self.client.send_json(request).await.map_err(store_error)?;
            serde_json::from_value(body).map_err(|err| StoreError::InvalidResponse(err.to_string()))
        })
    }
}

/// Resolves the actor's tenant through a PostgREST RPC taking `p_user_id`.
#[derive(Clone)]
pub struct SupabaseTenantResolver {
    client: SupabaseClient,
    function: String,
}

impl SupabaseTenantResolver {
    pub fn new(client: SupabaseClient, function: impl Into<String>) -> Self {
        Self {
            client,
            function: function.into(),
        }
    }
}

fn tenant_from_rpc(value: &Value) -> Option<TenantId> {
    let raw = match value {
        Value::String(tenant) => Some(tenant.as_str()),
        Value::Array(items) => return items.first().and_then(tenant_from_rpc),
        Value::Object(row) => row.get("tenant_id").and_then(Value::as_str),
        _ => None,
    }?;
    let raw = raw.trim();
    (!raw.is_empty()).then(|| TenantId::new(raw))
}

impl TenantResolver for SupabaseTenantResolver {
    fn resolve_tenant(&self, actor: &Actor) -> BoxFuture<'_, Result<TenantId, TenantError>> {
        let body = json!({ "p_user_id": actor.id });
        Box::pin(async move {
            let request = self
                .client
                .http()
                .post(self.client.rest_url(&format!("rpc/{}", self.function)))
                .json(&body);
            let request = self
                .client
                .sign(request, KeyRole::ServiceRole, None)
                .map_err(|err| TenantError::LookupFailed(err.to_string()))?;
            let value = self
                .client
                .send_json(request)
                .await
                .map_err(|err| TenantError::LookupFailed(err.message()))?;
            tenant_from_rpc(&value).ok_or(TenantError::NoTenantAssigned)
        })
    }
}
