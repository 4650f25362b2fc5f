//! Shift edge actions: `POST /checkin`, `POST /post_to_shift` and `POST /shift_status`.

use std::future::Future;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use caresync_domain::access::RequestScope;
use caresync_domain::error::DomainError;
use caresync_domain::identity::Credential;
use caresync_domain::idempotency::Admission;
use caresync_domain::ports::idempotency::{IdempotencyKey, StoredResponse};
use caresync_domain::ports::records::Row;
use caresync_domain::shifts::{
    CheckinInput, PresenceState, ShiftActionService, ShiftPostInput, ShiftStatus,
    ShiftStatusInput,
};
use caresync_domain::DomainResult;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::{self as app_middleware, ClientRequestId};
use crate::observability;
use crate::state::AppState;
use crate::validation;

struct EdgeAction {
    name: &'static str,
    required: &'static [&'static str],
    missing_message: &'static str,
    success: StatusCode,
    field: &'static str,
}

const CHECKIN: EdgeAction = EdgeAction {
    name: "checkin",
    required: &["shiftId"],
    missing_message: "shiftId is required",
    success: StatusCode::OK,
    field: "presence",
};

const POST_TO_SHIFT: EdgeAction = EdgeAction {
    name: "post_to_shift",
    required: &["shiftId", "content"],
    missing_message: "shiftId and content are required",
    success: StatusCode::CREATED,
    field: "post",
};

const SHIFT_STATUS: EdgeAction = EdgeAction {
    name: "shift_status",
    required: &["shiftId", "status"],
    missing_message: "shiftId and status are required",
    success: StatusCode::OK,
    field: "shift",
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CheckinRequest {
    #[validate(length(min = 1, max = 128))]
    shift_id: String,
    state: Option<PresenceState>,
    meta: Option<Value>,
}

impl From<CheckinRequest> for CheckinInput {
    fn from(request: CheckinRequest) -> Self {
        Self {
            shift_id: request.shift_id,
            state: request.state.unwrap_or_default(),
            meta: request.meta,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostToShiftRequest {
    #[validate(length(min = 1, max = 128))]
    shift_id: String,
    #[validate(length(min = 1, max = 4000))]
    content: String,
    pinned: Option<bool>,
    #[validate(length(max = 10))]
    attachments: Option<Vec<Value>>,
}

impl From<PostToShiftRequest> for ShiftPostInput {
    fn from(request: PostToShiftRequest) -> Self {
        Self {
            shift_id: request.shift_id,
            content: request.content,
            pinned: request.pinned.unwrap_or(false),
            attachments: request.attachments.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ShiftStatusRequest {
    #[validate(length(min = 1, max = 128))]
    shift_id: String,
    status: ShiftStatus,
    meta: Option<Value>,
}

impl From<ShiftStatusRequest> for ShiftStatusInput {
    fn from(request: ShiftStatusRequest) -> Self {
        Self {
            shift_id: request.shift_id,
            status: request.status,
            meta: request.meta,
        }
    }
}

pub(crate) async fn checkin(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    request_id: Option<Extension<ClientRequestId>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    run_edge_action(
        &state,
        &method,
        &headers,
        client_request_id(&request_id),
        &body,
        &CHECKIN,
        |shifts, scope, request: CheckinRequest| async move {
            shifts.check_in(&scope, request.into()).await
        },
    )
    .await
}

pub(crate) async fn post_to_shift(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    request_id: Option<Extension<ClientRequestId>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    run_edge_action(
        &state,
        &method,
        &headers,
        client_request_id(&request_id),
        &body,
        &POST_TO_SHIFT,
        |shifts, scope, request: PostToShiftRequest| async move {
            shifts.post_to_shift(&scope, request.into()).await
        },
    )
    .await
}

pub(crate) async fn shift_status(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    request_id: Option<Extension<ClientRequestId>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    run_edge_action(
        &state,
        &method,
        &headers,
        client_request_id(&request_id),
        &body,
        &SHIFT_STATUS,
        |shifts, scope, request: ShiftStatusRequest| async move {
            shifts.update_status(&scope, request.into()).await
        },
    )
    .await
}

fn client_request_id(request_id: &Option<Extension<ClientRequestId>>) -> Option<&str> {
    request_id
        .as_ref()
        .map(|Extension(ClientRequestId(id))| id.as_str())
}

/// Hex SHA-256 of the parsed body; object keys serialize in sorted order.
fn body_fingerprint(body: &Value) -> String {
    hex::encode(Sha256::digest(body.to_string().as_bytes()))
}

/// Only ids sent by the caller arm the replay guard.
async fn run_edge_action<T, F, Fut>(
    state: &AppState,
    method: &Method,
    headers: &HeaderMap,
    request_id: Option<&str>,
    body: &Bytes,
    action: &EdgeAction,
    write: F,
) -> Result<Response, ApiError>
where
    T: DeserializeOwned + Validate,
    F: FnOnce(ShiftActionService, RequestScope, T) -> Fut,
    Fut: Future<Output = DomainResult<Row>>,
{
    if method != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }
    let token = app_middleware::bearer_token(headers).ok_or_else(|| {
        ApiError::Unauthorized("missing or malformed bearer token".to_string())
    })?;
    let credential = Credential::bearer(token);

    let body: Value = serde_json::from_slice(body)
        .map_err(|_| ApiError::BadRequest("invalid JSON body".to_string()))?;
    validation::require_fields(&body, action.required, action.missing_message)?;
    let fingerprint = body_fingerprint(&body);
    let request: T = validation::decode(body)?;

    let actor = state
        .access
        .authenticate(&credential)
        .await
        .map_err(DomainError::from)?;
    let tenant = state
        .access
        .tenant_for(&actor)
        .await
        .map_err(DomainError::from)?;
    let scope = RequestScope { actor, tenant };

    let key = request_id
        .map(|request_id| IdempotencyKey::new(action.name, scope.actor.id.clone(), request_id));
    if let Some(key) = &key {
        let admission = state
            .idempotency
            .admit(key, &fingerprint)
            .await
            .map_err(|err| {
                tracing::error!(error = %err, action = action.name, "replay guard unavailable");
                ApiError::Internal(err.to_string())
            })?;
        match admission {
            Admission::Proceed => {}
            Admission::Duplicate => {
                observability::register_edge_action(action.name, "duplicate");
                return Err(ApiError::Conflict("request already in progress".to_string()));
            }
            Admission::Replay(stored) => {
                observability::register_edge_action(action.name, "replayed");
                tracing::debug!(action = action.name, "replaying stored response");
                return Ok(to_response(stored));
            }
            Admission::Mismatch => {
                observability::register_edge_action(action.name, "duplicate");
                return Err(ApiError::Conflict(
                    "request id already used with a different body".to_string(),
                ));
            }
        }
    }

    let actor_id = scope.actor.id.clone();
    match write(state.shifts.clone(), scope, request).await {
        Ok(row) => {
            let mut body = Map::new();
            body.insert("ok".to_string(), Value::Bool(true));
            body.insert(action.field.to_string(), Value::Object(row));
            let stored = StoredResponse {
                status_code: action.success.as_u16(),
                body: Value::Object(body),
                fingerprint,
            };
            if let Some(key) = &key {
                if let Err(err) = state.idempotency.complete(key, &stored).await {
                    tracing::warn!(
                        error = %err,
                        action = action.name,
                        "failed to store response for replay"
                    );
                }
            }
            observability::register_edge_action(action.name, "committed");
            tracing::info!(action = action.name, actor_id = %actor_id, "edge action committed");
            Ok(to_response(stored))
        }
        Err(err) => {
            if let Some(key) = &key {
                if let Err(release) = state.idempotency.abandon(key).await {
                    tracing::warn!(
                        error = %release,
                        action = action.name,
                        "failed to release replay key"
                    );
                }
            }
            observability::register_edge_action(action.name, "failed");
            Err(err.into())
        }
    }
}

fn to_response(stored: StoredResponse) -> Response {
    let status = StatusCode::from_u16(stored.status_code).unwrap_or(StatusCode::OK);
    (status, Json(stored.body)).into_response()
}
