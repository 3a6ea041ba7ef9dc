//! Duplicate guard: cache fast path, durable fallback, TTL eviction.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use replyflow_db::models::event::NewEvent;
use replyflow_engine::DuplicateGuard;

use common::InMemoryStore;

fn guard_over(store: &Arc<InMemoryStore>, ttl: chrono::Duration) -> DuplicateGuard {
    DuplicateGuard::new(Arc::clone(store) as _, ttl)
}

#[tokio::test]
async fn record_then_check_is_duplicate() {
    let store = Arc::new(InMemoryStore::default());
    let guard = guard_over(&store, chrono::Duration::hours(24));

    assert!(!guard.is_duplicate(1, "u_alice").await);
    guard.record(1, "u_alice").await;
    assert!(guard.is_duplicate(1, "u_alice").await);

    // Scoped per workflow and per recipient.
    assert!(!guard.is_duplicate(2, "u_alice").await);
    assert!(!guard.is_duplicate(1, "u_bob").await);
}

#[tokio::test]
async fn durable_dm_sent_event_populates_the_cache() {
    let store = Arc::new(InMemoryStore::default());
    store
        .events
        .lock()
        .await
        .push(NewEvent::dm_sent(1, "c1", "alice", "u_alice", "price", "dm_1"));

    let guard = guard_over(&store, chrono::Duration::hours(24));
    assert!(guard.is_duplicate(1, "u_alice").await);
    assert_eq!(guard.cache_size().await, 1);

    // Second check is answered from the cache even if the store now fails.
    store.fail_dm_lookup.store(true, Ordering::SeqCst);
    assert!(guard.is_duplicate(1, "u_alice").await);
}

#[tokio::test]
async fn detection_events_do_not_count_as_sends() {
    let store = Arc::new(InMemoryStore::default());
    store.events.lock().await.push(NewEvent::comment_detected(
        1, "c1", "alice", "u_alice", "price?", "price",
    ));

    let guard = guard_over(&store, chrono::Duration::hours(24));
    assert!(!guard.is_duplicate(1, "u_alice").await);
}

#[tokio::test]
async fn store_failure_fails_open() {
    let store = Arc::new(InMemoryStore::default());
    store
        .events
        .lock()
        .await
        .push(NewEvent::dm_sent(1, "c1", "alice", "u_alice", "price", "dm_1"));
    store.fail_dm_lookup.store(true, Ordering::SeqCst);

    let guard = guard_over(&store, chrono::Duration::hours(24));
    assert!(!guard.is_duplicate(1, "u_alice").await);
}

#[tokio::test]
async fn expired_entries_are_evicted_and_durable_store_answers() {
    let store = Arc::new(InMemoryStore::default());
    // Zero TTL: every entry is stale by the next cleanup pass.
    let guard = guard_over(&store, chrono::Duration::zero());

    guard.record(1, "u_alice").await;
    assert_eq!(guard.cache_size().await, 1);

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    guard.evict_expired().await;
    assert_eq!(guard.cache_size().await, 0);

    // Nothing durable for this pair, so the recipient is sendable again;
    // the audit trail, not the cache, is the source of truth.
    assert!(!guard.is_duplicate(1, "u_alice").await);
}

#[tokio::test]
async fn purge_workflow_only_clears_that_workflow() {
    let store = Arc::new(InMemoryStore::default());
    let guard = guard_over(&store, chrono::Duration::hours(24));

    guard.record(1, "u_alice").await;
    guard.record(2, "u_alice").await;
    guard.purge_workflow(1).await;

    assert!(!guard.is_duplicate(1, "u_alice").await);
    assert!(guard.is_duplicate(2, "u_alice").await);
}
