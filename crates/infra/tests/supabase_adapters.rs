use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use caresync_domain::audit::AuditLogEntry;
use caresync_domain::identity::{Actor, Credential, IdentityError};
use caresync_domain::ports::audit::AuditLogRepository;
use caresync_domain::ports::identity::IdentityResolver;
use caresync_domain::ports::records::{RecordStore, Row, StoreError};
use caresync_domain::ports::tenant::TenantResolver;
use caresync_domain::tenant::{TenantError, TenantId};
use caresync_infra::config::AppConfig;
use caresync_infra::supabase::{
    AdminUserOutcome, PostgrestAuditLog, PostgrestRecordStore, SupabaseAdmin, SupabaseClient,
    SupabaseIdentityResolver, SupabaseTenantResolver,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const ANON_KEY: &str = "anon-key";
const SERVICE_KEY: &str = "service-role-key";

#[derive(Clone, Default)]
struct StubState {
    audit_rows: Arc<Mutex<Vec<Value>>>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

fn service_signed(headers: &HeaderMap) -> bool {
    header(headers, "apikey") == SERVICE_KEY
        && header(headers, "authorization") == format!("Bearer {SERVICE_KEY}")
}

fn reject(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn upsert_rows(
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !service_signed(&headers) {
        return reject(StatusCode::UNAUTHORIZED, json!({ "message": "bad key" }));
    }
    if table == "locked" {
        return reject(
            StatusCode::FORBIDDEN,
            json!({
                "code": "42501",
                "message": "new row violates row-level security policy for table \"locked\"",
            }),
        );
    }
    if header(&headers, "prefer") != "resolution=merge-duplicates,return=representation" {
        return reject(StatusCode::BAD_REQUEST, json!({ "message": "missing prefer" }));
    }
    let Some(on_conflict) = query.get("on_conflict") else {
        return reject(StatusCode::BAD_REQUEST, json!({ "message": "missing on_conflict" }));
    };
    let mut row = body
        .as_array()
        .and_then(|rows| rows.first())
        .cloned()
        .unwrap_or(Value::Null);
    row["id"] = json!("generated-id");
    row["on_conflict_seen"] = json!(on_conflict);
    Json(json!([row])).into_response()
}

async fn patch_rows(
    Path(table): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(patch): Json<Value>,
) -> Response {
    if !service_signed(&headers) {
        return reject(StatusCode::UNAUTHORIZED, json!({ "message": "bad key" }));
    }
    let visible = query.get("id").map(String::as_str) == Some("eq.s1")
        && query.get("tenant_id").map(String::as_str) == Some("eq.t1");
    if !visible {
        return Json(json!([])).into_response();
    }
    let mut row = json!({ "id": "s1", "tenant_id": "t1", "table": table });
    if let (Some(row), Some(patch)) = (row.as_object_mut(), patch.as_object()) {
        row.extend(patch.clone());
    }
    Json(json!([row])).into_response()
}

async fn tenant_rpc(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !service_signed(&headers) {
        return reject(StatusCode::UNAUTHORIZED, json!({ "message": "bad key" }));
    }
    match body["p_user_id"].as_str() {
        Some("u1") => Json(json!("t1")).into_response(),
        Some("u2") => Json(Value::Null).into_response(),
        _ => reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "message": "function crashed" }),
        ),
    }
}

async fn auth_user(headers: HeaderMap) -> Response {
    if header(&headers, "apikey") != ANON_KEY {
        return reject(StatusCode::UNAUTHORIZED, json!({ "msg": "no apikey" }));
    }
    match header(&headers, "authorization") {
        "Bearer good" => Json(json!({
            "id": "u1",
            "email": "nurse@caresync.test",
            "email_confirmed_at": "2025-01-01T00:00:00Z",
        }))
        .into_response(),
        "Bearer banned" => Json(json!({
            "id": "u2",
            "email": "banned@caresync.test",
            "banned_until": "2999-01-01T00:00:00Z",
        }))
        .into_response(),
        "Bearer boom" => reject(StatusCode::BAD_GATEWAY, json!({ "msg": "upstream down" })),
        _ => reject(StatusCode::UNAUTHORIZED, json!({ "code": 401, "msg": "invalid JWT" })),
    }
}

async fn append_audit(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(entry): Json<Value>,
) -> Response {
    if !service_signed(&headers) {
        return reject(StatusCode::UNAUTHORIZED, json!({ "message": "bad key" }));
    }
    if let Ok(mut rows) = state.audit_rows.lock() {
        rows.push(entry);
    }
    StatusCode::CREATED.into_response()
}

async fn list_audit(
    State(state): State<StubState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let rows = state.audit_rows.lock().map(|rows| rows.clone()).unwrap_or_default();
    let wanted = query.get("entity_id").cloned().unwrap_or_default();
    let filtered: Vec<Value> = rows
        .into_iter()
        .filter(|row| format!("eq.{}", row["entity_id"].as_str().unwrap_or_default()) == wanted)
        .collect();
    Json(Value::Array(filtered)).into_response()
}

async fn admin_users(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !service_signed(&headers) {
        return reject(StatusCode::UNAUTHORIZED, json!({ "msg": "bad key" }));
    }
    if body["email_confirm"] != json!(true) {
        return reject(StatusCode::BAD_REQUEST, json!({ "msg": "unconfirmed" }));
    }
    match body["email"].as_str() {
        Some("new-admin@caresync.test") => {
            Json(json!({ "id": "admin-1", "email": "new-admin@caresync.test" })).into_response()
        }
        _ => reject(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "code": 422,
                "error_code": "email_exists",
                "msg": "A user with this email address has already been registered",
            }),
        ),
    }
}

async fn spawn_supabase_stub() -> String {
    let app = Router::new()
        .route("/rest/v1/rpc/get_user_tenant_id", post(tenant_rpc))
        .route("/rest/v1/audit_logs", post(append_audit).get(list_audit))
        .route("/rest/v1/:table", post(upsert_rows).patch(patch_rows))
        .route("/auth/v1/user", get(auth_user))
        .route("/auth/v1/admin/users", post(admin_users))
        .with_state(StubState::default());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind supabase stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve supabase stub");
    });
    format!("http://{addr}")
}

fn config_for(base_url: String) -> AppConfig {
    AppConfig {
        app_env: "test".to_string(),
        port: 0,
        log_level: "info".to_string(),
        data_backend: "supabase".to_string(),
        identity_backend: "supabase".to_string(),
        idempotency_backend: "memory".to_string(),
        supabase_url: base_url,
        supabase_anon_key: ANON_KEY.to_string(),
        supabase_service_role_key: SERVICE_KEY.to_string(),
        supabase_jwt_secret: "unused".to_string(),
        tenant_rpc: "get_user_tenant_id".to_string(),
        dev_default_tenant_id: String::new(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        http_timeout_ms: 2_000,
        seed_admin_email: String::new(),
        seed_admin_password: String::new(),
    }
}

async fn client() -> SupabaseClient {
    let base_url = spawn_supabase_stub().await;
    SupabaseClient::from_config(&config_for(base_url)).expect("client")
}

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn postgrest_upsert_sends_conflict_key_and_returns_stored_row() {
    let store = PostgrestRecordStore::new(client().await);
    let stored = store
        .upsert(
            "shift_presence",
            &["shift_id", "user_id"],
            &row(json!({ "shift_id": "s1", "user_id": "u1", "tenant_id": "t1" })),
        )
        .await
        .expect("upsert");
    assert_eq!(stored["id"], json!("generated-id"));
    assert_eq!(stored["on_conflict_seen"], json!("shift_id,user_id"));
    assert_eq!(stored["tenant_id"], json!("t1"));
}

#[tokio::test]
async fn postgrest_rejection_message_passes_through() {
    let store = PostgrestRecordStore::new(client().await);
    let err = store
        .upsert("locked", &["id"], &row(json!({ "tenant_id": "t1" })))
        .await
        .unwrap_err();
    match err {
        StoreError::Rejected(message) => assert_eq!(
            message,
            "new row violates row-level security policy for table \"locked\""
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn postgrest_update_filters_by_id_and_tenant() {
    let store = PostgrestRecordStore::new(client().await);
    let patch = row(json!({ "status": "in_progress" }));
    let updated = store
        .update("shifts", &TenantId::new("t1"), "s1", &patch)
        .await
        .expect("update")
        .expect("visible row");
    assert_eq!(updated["status"], json!("in_progress"));

    let hidden = store
        .update("shifts", &TenantId::new("t2"), "s1", &patch)
        .await
        .expect("update");
    assert!(hidden.is_none());
}

#[tokio::test]
async fn unreachable_store_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = SupabaseClient::from_config(&config_for(format!("http://{addr}"))).unwrap();
    let err = PostgrestRecordStore::new(client)
        .upsert("patients", &["id"], &row(json!({})))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[tokio::test]
async fn tenant_rpc_results_are_classified() {
    let resolver = SupabaseTenantResolver::new(client().await, "get_user_tenant_id");
    let tenant = resolver
        .resolve_tenant(&Actor::new("u1", "u1@caresync.test", true))
        .await
        .unwrap();
    assert_eq!(tenant, TenantId::new("t1"));

    let unassigned = resolver
        .resolve_tenant(&Actor::new("u2", "u2@caresync.test", true))
        .await
        .unwrap_err();
    assert_eq!(unassigned, TenantError::NoTenantAssigned);

    let failed = resolver
        .resolve_tenant(&Actor::new("u3", "u3@caresync.test", true))
        .await
        .unwrap_err();
    assert_eq!(failed, TenantError::LookupFailed("function crashed".to_string()));
}

#[tokio::test]
async fn gotrue_identity_errors_are_classified() {
    let resolver = SupabaseIdentityResolver::new(client().await);

    let actor = resolver.resolve(&Credential::bearer("good")).await.unwrap();
    assert_eq!(actor, Actor::new("u1", "nurse@caresync.test", true));

    let cookie = Credential::session_cookie(json!({ "access_token": "good" }).to_string());
    assert_eq!(resolver.resolve(&cookie).await.unwrap().id, "u1");

    for (token, expected) in [
        ("garbage", IdentityError::InvalidCredential),
        ("banned", IdentityError::AccountDisabled),
        ("boom", IdentityError::InvalidCredential),
    ] {
        let err = resolver.resolve(&Credential::bearer(token)).await.unwrap_err();
        assert_eq!(err, expected, "token {token}");
    }
}

#[tokio::test]
async fn audit_entries_round_trip_through_postgrest() {
    let log = PostgrestAuditLog::new(client().await);
    let entry = AuditLogEntry {
        id: "0190a0b4-0000-7000-8000-000000000001".to_string(),
        tenant_id: TenantId::new("t1"),
        entity: "shift_presence".to_string(),
        entity_id: "presence-1".to_string(),
        action: "CHECKIN".to_string(),
        actor_id: "u1".to_string(),
        payload: json!({ "state": "online" }),
        created_at: "2026-01-01T00:00:00Z".to_string(),
    };
    log.append(&entry).await.expect("append");

    let history = log
        .list_for_entity(&TenantId::new("t1"), "shift_presence", "presence-1")
        .await
        .expect("list");
    assert_eq!(history, vec![entry]);
}

#[tokio::test]
async fn admin_seeding_is_create_once() {
    let admin = SupabaseAdmin::new(client().await);
    let created = admin
        .ensure_user("new-admin@caresync.test", "s3cret-pass")
        .await
        .unwrap();
    assert_eq!(
        created,
        AdminUserOutcome::Created {
            user_id: "admin-1".to_string()
        }
    );

    let existing = admin
        .ensure_user("admin@caresync.test", "s3cret-pass")
        .await
        .unwrap();
    assert_eq!(existing, AdminUserOutcome::AlreadyExists);
}
