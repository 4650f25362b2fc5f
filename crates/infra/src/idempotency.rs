use std::time::Duration;

use caresync_domain::ports::BoxFuture;
use caresync_domain::ports::idempotency::{
    ClaimOutcome, IdempotencyError, IdempotencyKey, IdempotencyStore, KeyState, StoredResponse,
};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

const DEFAULT_PREFIX: &str = "caresync:idemp";
const CLAIM_RETRY_LIMIT: usize = 2;

#[derive(Clone)]
pub struct RedisIdempotencyStore {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisIdempotencyStore {
    pub async fn connect(redis_url: &str) -> Result<Self, IdempotencyError> {
        Self::connect_with_prefix(redis_url, DEFAULT_PREFIX).await
    }

    pub async fn connect_with_prefix(
        redis_url: &str,
        prefix: impl Into<String>,
    ) -> Result<Self, IdempotencyError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| IdempotencyError::Unavailable(err.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| IdempotencyError::Unavailable(err.to_string()))?;
        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }

    fn storage_key(&self, key: &IdempotencyKey) -> String {
        key.storage_key(&self.prefix)
    }
}

fn ttl_ms(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

fn encode(state: &KeyState) -> Result<String, IdempotencyError> {
    serde_json::to_string(state).map_err(|err| IdempotencyError::Encoding(err.to_string()))
}

fn decode(value: &str) -> Result<KeyState, IdempotencyError> {
    serde_json::from_str(value).map_err(|err| IdempotencyError::Encoding(err.to_string()))
}

fn store_error(err: redis::RedisError) -> IdempotencyError {
    IdempotencyError::Store(err.to_string())
}

impl IdempotencyStore for RedisIdempotencyStore {
    fn claim(
        &self,
        key: &IdempotencyKey,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<ClaimOutcome, IdempotencyError>> {
        let storage_key = self.storage_key(key);
        Box::pin(async move {
            let pending = encode(&KeyState::Pending)?;
            for _ in 0..CLAIM_RETRY_LIMIT {
                let mut conn = self.manager.clone();
                let stored: Option<String> = redis::cmd("SET")
                    .arg(&storage_key)
                    .arg(&pending)
                    .arg("NX")
                    .arg("PX")
                    .arg(ttl_ms(ttl))
                    .query_async(&mut conn)
                    .await
                    .map_err(store_error)?;
                if stored.is_some() {
                    return Ok(ClaimOutcome::Claimed);
                }

                // The holder may expire between SET NX and GET; retry the claim then.
                let existing: Option<String> = conn.get(&storage_key).await.map_err(store_error)?;
                if let Some(existing) = existing {
                    return Ok(ClaimOutcome::AlreadyHeld(decode(&existing)?));
                }
            }
            Err(IdempotencyError::Store(
                "failed to claim idempotency key".into(),
            ))
        })
    }

    fn finish(
        &self,
        key: &IdempotencyKey,
        response: &StoredResponse,
        ttl: Duration,
    ) -> BoxFuture<'_, Result<(), IdempotencyError>> {
        let storage_key = self.storage_key(key);
        let state = KeyState::Done {
            response: response.clone(),
        };
        Box::pin(async move {
            let payload = encode(&state)?;
            let mut conn = self.manager.clone();
            let _: () = redis::cmd("SET")
                .arg(&storage_key)
                .arg(payload)
                .arg("PX")
                .arg(ttl_ms(ttl))
                .query_async(&mut conn)
                .await
                .map_err(store_error)?;
            Ok(())
        })
    }

    fn release(&self, key: &IdempotencyKey) -> BoxFuture<'_, Result<(), IdempotencyError>> {
        let storage_key = self.storage_key(key);
        Box::pin(async move {
            let mut conn = self.manager.clone();
            let _: () = conn.del(&storage_key).await.map_err(store_error)?;
            Ok(())
        })
    }
}
