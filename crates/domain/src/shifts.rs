//! Shift edge actions: presence check-in, feed posts and status changes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::DomainResult;
use crate::access::RequestScope;
use crate::audit::{AuditAction, AuditRecorder};
use crate::entities::{SHIFT, SHIFT_POST, SHIFT_PRESENCE};
use crate::ports::records::Row;
use crate::upsert::RecordUpsertPipeline;
use crate::util::now_rfc3339;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Offline,
    #[default]
    Online,
    OnBreak,
    Unresponsive,
}

impl PresenceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::OnBreak => "on_break",
            Self::Unresponsive => "unresponsive",
        }
    }
}

/// Any status may follow any other; no transition table is enforced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Scheduled,
    Published,
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CheckinInput {
    pub shift_id: String,
    pub state: PresenceState,
    pub meta: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShiftPostInput {
    pub shift_id: String,
    pub content: String,
    pub pinned: bool,
    pub attachments: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ShiftStatusInput {
    pub shift_id: String,
    pub status: ShiftStatus,
    pub meta: Option<Value>,
}

#[derive(Clone)]
pub struct ShiftActionService {
    pipeline: RecordUpsertPipeline,
    audit: AuditRecorder,
}

impl ShiftActionService {
    pub fn new(pipeline: RecordUpsertPipeline, audit: AuditRecorder) -> Self {
        Self { pipeline, audit }
    }

    /// Upserts the caller's presence row for the shift, keyed by `(shift_id, user_id)`.
    pub async fn check_in(&self, scope: &RequestScope, input: CheckinInput) -> DomainResult<Row> {
        let payload = json!({
            "shift_id": input.shift_id,
            "user_id": scope.actor.id,
            "state": input.state.as_str(),
            "meta": input.meta,
            "last_seen_at": now_rfc3339(),
        });
        let persisted = self
            .pipeline
            .upsert(&SHIFT_PRESENCE, payload, &scope.tenant)
            .await?;

        let entity_id = entity_id_of(&persisted.row, &input.shift_id);
        self.audit
            .record(
                SHIFT_PRESENCE.table,
                &entity_id,
                AuditAction::Checkin,
                &scope.actor.id,
                &scope.tenant,
                json!({ "shift_id": input.shift_id, "state": input.state.as_str() }),
            )
            .await;
        Ok(persisted.row)
    }

    pub async fn post_to_shift(
        &self,
        scope: &RequestScope,
        input: ShiftPostInput,
    ) -> DomainResult<Row> {
        let payload = json!({
            "shift_id": input.shift_id,
            "author_id": scope.actor.id,
            "content": input.content,
            "pinned": input.pinned,
            "attachments": input.attachments,
        });
        let persisted = self.pipeline.upsert(&SHIFT_POST, payload, &scope.tenant).await?;

        let entity_id = entity_id_of(&persisted.row, &input.shift_id);
        self.audit
            .record(
                SHIFT_POST.table,
                &entity_id,
                AuditAction::CreatePost,
                &scope.actor.id,
                &scope.tenant,
                json!({ "shift_id": input.shift_id, "pinned": input.pinned }),
            )
            .await;
        Ok(persisted.row)
    }

    pub async fn update_status(
        &self,
        scope: &RequestScope,
        input: ShiftStatusInput,
    ) -> DomainResult<Row> {
        let mut patch = Map::new();
        patch.insert("status".into(), Value::String(input.status.as_str().into()));
        if let Some(meta) = input.meta.clone() {
            patch.insert("meta".into(), meta);
        }
        let row = self
            .pipeline
            .update_by_id(&SHIFT, &input.shift_id, patch, &scope.tenant)
            .await?;

        self.audit
            .record(
                SHIFT.table,
                &input.shift_id,
                AuditAction::UpdateStatus,
                &scope.actor.id,
                &scope.tenant,
                json!({ "status": input.status.as_str(), "meta": input.meta }),
            )
            .await;
        Ok(row)
    }
}

fn entity_id_of(row: &Row, fallback: &str) -> String {
    row.get("id")
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}
