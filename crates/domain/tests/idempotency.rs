use std::sync::Arc;
use std::time::Duration;

use caresync_domain::idempotency::{
    Admission, IdempotencyConfig, IdempotencyService, InMemoryIdempotencyStore,
};
use caresync_domain::ports::idempotency::{IdempotencyKey, StoredResponse};
use serde_json::json;

const BODY: &str = "9c1185a5c5e9fc54612808977ee8f548b2258d31";

fn service(pending_ttl: Duration) -> IdempotencyService {
    IdempotencyService::new(
        Arc::new(InMemoryIdempotencyStore::new()),
        IdempotencyConfig {
            pending_ttl,
            replay_ttl: Duration::from_secs(60),
        },
    )
}

#[tokio::test]
async fn replay_returns_prior_response() {
    let service = service(Duration::from_secs(60));
    let key = IdempotencyKey::new("checkin", "u1", "req-1");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);

    let response = StoredResponse {
        status_code: 200,
        body: json!({ "ok": true, "presence": { "shift_id": "s1" } }),
        fingerprint: BODY.to_string(),
    };
    service.complete(&key, &response).await.unwrap();

    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Replay(response));
}

#[tokio::test]
async fn concurrent_attempt_is_reported_as_duplicate() {
    let service = service(Duration::from_secs(60));
    let key = IdempotencyKey::new("post_to_shift", "u1", "req-2");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Duplicate);
}

#[tokio::test]
async fn abandoned_attempt_can_be_retried() {
    let service = service(Duration::from_secs(60));
    let key = IdempotencyKey::new("shift_status", "u1", "req-3");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    service.abandon(&key).await.unwrap();
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
}

#[tokio::test]
async fn keys_are_scoped_per_actor_and_action() {
    let service = service(Duration::from_secs(60));
    let first = IdempotencyKey::new("checkin", "u1", "req-4");
    assert_eq!(service.admit(&first, BODY).await.unwrap(), Admission::Proceed);

    let other_actor = IdempotencyKey::new("checkin", "u2", "req-4");
    let other_action = IdempotencyKey::new("post_to_shift", "u1", "req-4");
    assert_eq!(service.admit(&other_actor, BODY).await.unwrap(), Admission::Proceed);
    assert_eq!(service.admit(&other_action, BODY).await.unwrap(), Admission::Proceed);
}

#[tokio::test]
async fn stale_pending_claim_expires() {
    let service = service(Duration::from_millis(20));
    let key = IdempotencyKey::new("checkin", "u1", "req-5");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
}

#[tokio::test]
async fn finished_key_with_different_body_is_a_mismatch() {
    let service = service(Duration::from_secs(60));
    let key = IdempotencyKey::new("shift_status", "u1", "req-6");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    let response = StoredResponse {
        status_code: 200,
        body: json!({ "ok": true }),
        fingerprint: BODY.to_string(),
    };
    service.complete(&key, &response).await.unwrap();

    assert_eq!(
        service.admit(&key, "another-body").await.unwrap(),
        Admission::Mismatch
    );
    assert_eq!(
        service.admit(&key, BODY).await.unwrap(),
        Admission::Replay(response)
    );
}

#[tokio::test]
async fn expired_keys_are_evicted_on_claim() {
    let store = InMemoryIdempotencyStore::new();
    let service = IdempotencyService::new(
        Arc::new(store.clone()),
        IdempotencyConfig {
            pending_ttl: Duration::from_millis(1),
            replay_ttl: Duration::from_millis(1),
        },
    );
    for n in 0..100 {
        let key = IdempotencyKey::new("checkin", "u1", format!("req-{n}"));
        assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    }
    assert_eq!(store.len().await, 100);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let key = IdempotencyKey::new("checkin", "u1", "req-fresh");
    assert_eq!(service.admit(&key, BODY).await.unwrap(), Admission::Proceed);
    assert_eq!(store.len().await, 1);
}
