use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::BoxFuture;

/// Identifies one logical mutation attempt: which action, by whom, under which request id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub action: String,
    pub actor_id: String,
    pub request_id: String,
}

impl IdempotencyKey {
    pub fn new(
        action: impl Into<String>,
        actor_id: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            actor_id: actor_id.into(),
            request_id: request_id.into(),
        }
    }

    pub fn storage_key(&self, namespace: &str) -> String {
        format!(
            "{namespace}:{}:{}:{}",
            self.action, self.actor_id, self.request_id
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
    /// Digest of the request that produced this response.
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum KeyState {
    Pending,
    Done { response: StoredResponse },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClaimOutcome {
    Claimed,
    AlreadyHeld(KeyState),
}

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("idempotency store unavailable: {0}")]
    Unavailable(String),
    #[error("idempotency state could not be encoded: {0}")]
    Encoding(String),
    #[error("idempotency store error: {0}")]
    Store(String),
}

pub trait IdempotencyStore: Send + Sync {
    /// Atomically marks the key `Pending` unless some state already exists.
    fn claim(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<ClaimOutcome, IdempotencyError>>;

    fn finish(
        &self,
        key: &IdempotencyKey,
        response: &StoredResponse,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), IdempotencyError>>;

    /// Drops whatever state the key holds so a later attempt starts fresh.
    fn release(&self, key: &IdempotencyKey) -> BoxFuture<'_, Result<(), IdempotencyError>>;
}
