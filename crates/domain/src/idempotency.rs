use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::ports::BoxFuture;
use crate::ports::idempotency::{
    ClaimOutcome, IdempotencyError, IdempotencyKey, IdempotencyStore, KeyState, StoredResponse,
};

#[derive(Clone, Debug)]
pub struct IdempotencyConfig {
    /// How long a claimed-but-unfinished key blocks duplicates.
    pub pending_ttl: Duration,
    /// How long a finished response stays replayable.
    pub replay_ttl: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            pending_ttl: Duration::from_secs(60),
            replay_ttl: Duration::from_secs(60 * 60 * 24),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
    /// First attempt for this key; the caller must `complete` or `abandon` it.
    Proceed,
    /// Another attempt with the same key is still running.
    Duplicate,
    Replay(StoredResponse),
    /// The key already completed for a request with a different fingerprint.
    Mismatch,
}

#[derive(Clone)]
pub struct IdempotencyService {
    store: Arc<dyn IdempotencyStore>,
    config: IdempotencyConfig,
}

impl IdempotencyService {
    pub fn new(store: Arc<dyn IdempotencyStore>, config: IdempotencyConfig) -> Self {
        Self { store, config }
    }

    /// `fingerprint` identifies the request body; a finished key only replays for the same one.
    pub async fn admit(
        &self,
        key: &IdempotencyKey,
        fingerprint: &str,
    ) -> Result<Admission, IdempotencyError> {
        let outcome = self.store.claim(key, self.config.pending_ttl).await?;
        Ok(match outcome {
            ClaimOutcome::Claimed => Admission::Proceed,
            ClaimOutcome::AlreadyHeld(KeyState::Pending) => Admission::Duplicate,
            ClaimOutcome::AlreadyHeld(KeyState::Done { response })
                if response.fingerprint == fingerprint =>
            {
                Admission::Replay(response)
            }
            ClaimOutcome::AlreadyHeld(KeyState::Done { .. }) => Admission::Mismatch,
        })
    }

    pub async fn complete(
        &self,
        key: &IdempotencyKey,
        response: &StoredResponse,
    ) -> Result<(), IdempotencyError> {
        self.store
            .finish(key, response, self.config.replay_ttl)
            .await
    }

    /// Called when the guarded mutation failed, so a retry is not reported as a duplicate.
    pub async fn abandon(&self, key: &IdempotencyKey) -> Result<(), IdempotencyError> {
        self.store.release(key).await
    }
}

/// Process-local store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<Mutex<HashMap<IdempotencyKey, (KeyState, Instant)>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently held, expired ones included until the next claim sweeps them.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl IdempotencyStore for InMemoryIdempotencyStore {
    fn claim(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<ClaimOutcome, IdempotencyError>> {
        let key = key.clone();
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let now = Instant::now();
            entries.retain(|_, (_, expires_at)| *expires_at > now);
            if let Some((state, _)) = entries.get(&key) {
                return Ok(ClaimOutcome::AlreadyHeld(state.clone()));
            }
            entries.insert(key, (KeyState::Pending, now + ttl));
            Ok(ClaimOutcome::Claimed)
        })
    }

    fn finish(
        &self,
        key: &IdempotencyKey,
        response: &StoredResponse,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), IdempotencyError>> {
        let key = key.clone();
        let state = KeyState::Done {
            response: response.clone(),
        };
        Box::pin(async move {
            self.entries
                .lock()
                .await
                .insert(key, (state, Instant::now() + ttl));
            Ok(())
        })
    }

    fn release(&self, key: &IdempotencyKey) -> BoxFuture<'_, Result<(), IdempotencyError>> {
        let key = key.clone();
        Box::pin(async move {
            self.entries.lock().await.remove(&key);
            Ok(())
        })
    }
}
