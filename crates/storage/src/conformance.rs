//! Conformance test suite for [`StorageBackend`] implementations.
//!
//! This module provides async check functions that validate whether a
//! [`StorageBackend`] implementation satisfies the cache contract the ticket
//! registry relies on. A wire-client backend (memcached, Redis, ...) can run
//! the same suite as [`MemoryBackend`](crate::MemoryBackend).
//!
//! # Usage
//!
//! Enable the `testutil` feature and call each conformance function with
//! a fresh backend instance:
//!
//! ```no_run
//! use ticketry_storage::conformance;
//! use ticketry_storage::MemoryBackend;
//!
//! #[tokio::test]
//! async fn crud_get_returns_none_for_missing_key() {
//!     conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
//! }
//! ```
//!
//! # Test Categories
//!
//! | Prefix | Contract aspect |
//! |--------|-----------------|
//! | `crud_` | get/set/delete semantics |
//! | `ttl_` | entry lifetimes |
//! | `conditional_` | `add` / `replace` preconditions |
//! | `concurrent_` | shared use across tasks |
//! | (others) | absence is not an error, health |

use std::{sync::Arc, time::Duration};

use bytes::Bytes;

use crate::backend::StorageBackend;

// ============================================================================
// CRUD: plain get/set/delete
// ============================================================================

/// Reading a key that was never written yields `Ok(None)`.
pub async fn crud_get_returns_none_for_missing_key<B: StorageBackend>(backend: &B) {
    match backend.get(b"TGT-never-issued").await {
        Ok(value) => assert_eq!(value, None, "an unknown ticket must read as absent"),
        Err(err) => panic!("absent keys are not an error: {err}"),
    }
}

/// A written value reads back byte for byte.
pub async fn crud_set_then_get_returns_value<B: StorageBackend>(backend: &B) {
    let ticket = br#"{"type":"service","id":"ST-1"}"#;
    backend.set(b"ST-1".to_vec(), ticket.to_vec()).await.expect("set");
    let stored = backend.get(b"ST-1").await.expect("get");
    assert_eq!(stored.as_deref(), Some(&ticket[..]));
}

/// A second `set` replaces the first value.
pub async fn crud_set_overwrites_existing<B: StorageBackend>(backend: &B) {
    for uses in 0..3u8 {
        let value = format!("count_of_uses={uses}").into_bytes();
        backend.set(b"TGT-overwrite".to_vec(), value).await.expect("set");
    }
    let stored = backend.get(b"TGT-overwrite").await.expect("get");
    assert_eq!(stored, Some(Bytes::from_static(b"count_of_uses=2")), "last write wins");
}

/// Deleting an unknown key succeeds and reports that nothing was removed.
pub async fn crud_delete_nonexistent_is_noop<B: StorageBackend>(backend: &B) {
    match backend.delete(b"PGT-never-issued").await {
        Ok(removed) => assert!(!removed, "nothing should be reported as removed"),
        Err(err) => panic!("deleting an absent key is not an error: {err}"),
    }
}

/// Deleting a stored key removes it and reports the removal.
pub async fn crud_delete_removes_key<B: StorageBackend>(backend: &B) {
    backend.set(b"ST-revoked".to_vec(), b"{}".to_vec()).await.expect("set");
    assert!(backend.delete(b"ST-revoked").await.expect("delete"), "live key must be removed");
    assert!(backend.get(b"ST-revoked").await.expect("get").is_none());
}

/// A session with many granted tickets serializes to a large value; it
/// must survive a round trip intact.
pub async fn crud_large_value_roundtrip<B: StorageBackend>(backend: &B) {
    let session: Vec<u8> = (0..400 * 1024).map(|i| b'a' + (i % 26) as u8).collect();
    backend.set(b"TGT-large".to_vec(), session.clone()).await.expect("set");
    let stored = backend.get(b"TGT-large").await.expect("get").expect("value present");
    assert_eq!(stored.len(), session.len());
    assert_eq!(stored, Bytes::from(session));
}

// ============================================================================
// TTL: entries written with a lifetime
// ============================================================================

/// An entry is readable until its TTL elapses and absent afterwards.
pub async fn ttl_key_expires<B: StorageBackend>(backend: &B) {
    backend
        .set_with_ttl(b"ST-short".to_vec(), b"{}".to_vec(), Duration::from_millis(60))
        .await
        .expect("set_with_ttl");
    assert!(backend.get(b"ST-short").await.expect("get").is_some(), "readable before TTL");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(backend.get(b"ST-short").await.expect("get").is_none(), "absent after TTL");
}

/// A zero TTL writes an entry that is already expired.
pub async fn ttl_zero_is_immediately_expired<B: StorageBackend>(backend: &B) {
    backend
        .set_with_ttl(b"ST-zero".to_vec(), b"{}".to_vec(), Duration::ZERO)
        .await
        .expect("set_with_ttl");
    assert!(backend.get(b"ST-zero").await.expect("get").is_none());
}

/// A plain `set` over an expiring entry makes it permanent.
pub async fn ttl_overwrite_clears_ttl<B: StorageBackend>(backend: &B) {
    backend
        .set_with_ttl(b"TGT-pinned".to_vec(), b"expiring".to_vec(), Duration::from_millis(60))
        .await
        .expect("set_with_ttl");
    backend.set(b"TGT-pinned".to_vec(), b"pinned".to_vec()).await.expect("set");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(
        backend.get(b"TGT-pinned").await.expect("get"),
        Some(Bytes::from_static(b"pinned")),
        "plain set must drop the earlier TTL"
    );
}

/// `add` with a TTL expires like `set_with_ttl`.
pub async fn ttl_add_with_ttl_expires<B: StorageBackend>(backend: &B) {
    let added = backend
        .add(b"ttl:add".to_vec(), b"v".to_vec(), Some(Duration::from_millis(50)))
        .await
        .expect("add with ttl");
    assert!(added);

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(backend.get(b"ttl:add").await.expect("get"), None);
}

// ============================================================================
// Conditional: add / replace preconditions
// ============================================================================

/// `add` stores a value when the key is absent.
pub async fn conditional_add_inserts_when_absent<B: StorageBackend>(backend: &B) {
    let added = backend.add(b"c:add".to_vec(), b"v".to_vec(), None).await.expect("add");
    assert!(added, "add on an absent key should write");
    assert_eq!(backend.get(b"c:add").await.expect("get"), Some(Bytes::from("v")));
}

/// `add` leaves an existing value untouched.
pub async fn conditional_add_rejects_existing<B: StorageBackend>(backend: &B) {
    backend.set(b"c:taken".to_vec(), b"first".to_vec()).await.expect("set");
    let added = backend.add(b"c:taken".to_vec(), b"second".to_vec(), None).await.expect("add");
    assert!(!added, "add on a taken key must not write");
    assert_eq!(backend.get(b"c:taken").await.expect("get"), Some(Bytes::from("first")));
}

/// `replace` on an absent key does not create it.
pub async fn conditional_replace_does_not_create<B: StorageBackend>(backend: &B) {
    let replaced =
        backend.replace(b"c:none".to_vec(), b"v".to_vec(), None).await.expect("replace");
    assert!(!replaced, "replace on an absent key must not write");
    assert_eq!(backend.get(b"c:none").await.expect("get"), None);
}

/// `replace` overwrites a live key.
pub async fn conditional_replace_overwrites_existing<B: StorageBackend>(backend: &B) {
    backend.set(b"c:rep".to_vec(), b"old".to_vec()).await.expect("set");
    let replaced =
        backend.replace(b"c:rep".to_vec(), b"new".to_vec(), None).await.expect("replace");
    assert!(replaced);
    assert_eq!(backend.get(b"c:rep").await.expect("get"), Some(Bytes::from("new")));
}

/// `replace` after `delete` does not resurrect the key.
pub async fn conditional_replace_after_delete_is_noop<B: StorageBackend>(backend: &B) {
    backend.set(b"c:gone".to_vec(), b"v".to_vec()).await.expect("set");
    backend.delete(b"c:gone").await.expect("delete");
    let replaced =
        backend.replace(b"c:gone".to_vec(), b"v2".to_vec(), None).await.expect("replace");
    assert!(!replaced, "deleted keys must stay deleted");
    assert_eq!(backend.get(b"c:gone").await.expect("get"), None);
}

// ============================================================================
// Concurrent: shared use from many tasks
// ============================================================================

/// Many tasks writing distinct keys at once all land.
///
/// Takes an `Arc` so the backend can be moved into spawned tasks.
pub async fn concurrent_sets_to_different_keys<B: StorageBackend + 'static>(backend: Arc<B>) {
    let writers: Vec<_> = (0u32..40)
        .map(|n| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move {
                let key = format!("ST-{n}-parallel").into_bytes();
                backend.set(key, n.to_be_bytes().to_vec()).await
            })
        })
        .collect();
    for writer in writers {
        writer.await.expect("writer task").expect("parallel set");
    }

    for n in 0u32..40 {
        let key = format!("ST-{n}-parallel");
        let stored = backend.get(key.as_bytes()).await.expect("get");
        assert_eq!(stored.as_deref(), Some(&n.to_be_bytes()[..]), "{key} lost a write");
    }
}

/// Parallel readers of one key all observe the stored value.
pub async fn concurrent_reads_return_consistent_value<B: StorageBackend + 'static>(
    backend: Arc<B>,
) {
    backend.set(b"TGT-shared".to_vec(), b"session".to_vec()).await.expect("set");

    let readers: Vec<_> = (0..40)
        .map(|_| {
            let backend = Arc::clone(&backend);
            tokio::spawn(async move { backend.get(b"TGT-shared").await })
        })
        .collect();
    for reader in readers {
        let stored = reader.await.expect("reader task").expect("parallel get");
        assert_eq!(stored, Some(Bytes::from_static(b"session")));
    }
}

/// Concurrent `add` of the same key: exactly one writer wins.
pub async fn concurrent_add_exactly_one_winner<B: StorageBackend + 'static>(backend: Arc<B>) {
    let mut handles = Vec::new();
    for i in 0u32..10 {
        let backend = Arc::clone(&backend);
        let value = format!("writer-{i}").into_bytes();
        handles.push(tokio::spawn(async move {
            backend.add(b"cadd:k".to_vec(), value, None).await.expect("concurrent add")
        }));
    }

    let mut winners = 0u32;
    for handle in handles {
        if handle.await.expect("task join") {
            winners += 1;
        }
    }

    assert_eq!(winners, 1, "exactly one add should win");
}

// ============================================================================
// Error semantics: absence is never an error
// ============================================================================

/// `health_check` succeeds on a fresh backend.
pub async fn health_check_succeeds<B: StorageBackend>(backend: &B) {
    let result = backend.health_check().await;
    assert!(result.is_ok(), "fresh backend should be healthy: {result:?}");
}

/// A revoked ticket reads as `Ok(None)`, the same as one never issued.
pub async fn get_deleted_key_returns_none_not_error<B: StorageBackend>(backend: &B) {
    backend.set(b"TGT-logout".to_vec(), b"{}".to_vec()).await.expect("set");
    backend.delete(b"TGT-logout").await.expect("delete");
    match backend.get(b"TGT-logout").await {
        Ok(value) => assert!(value.is_none(), "revoked ticket must read as absent"),
        Err(err) => panic!("reading a deleted key is not an error: {err}"),
    }
}

/// Only the first of two deletes reports a removal.
pub async fn idempotent_delete<B: StorageBackend>(backend: &B) {
    backend.set(b"ST-twice".to_vec(), b"{}".to_vec()).await.expect("set");
    let first = backend.delete(b"ST-twice").await.expect("first delete");
    let second = backend.delete(b"ST-twice").await.expect("second delete");
    assert_eq!((first, second), (true, false));
}

// ============================================================================
// Runner
// ============================================================================

/// Run the full conformance suite against the given backend.
///
/// ```no_run
/// use std::sync::Arc;
/// use ticketry_storage::conformance;
/// use ticketry_storage::MemoryBackend;
///
/// #[tokio::test]
/// async fn memory_backend_conformance() {
///     conformance::run_all(Arc::new(MemoryBackend::new())).await;
/// }
/// ```
pub async fn run_all<B: StorageBackend + 'static>(backend: Arc<B>) {
    // CRUD
    crud_get_returns_none_for_missing_key(backend.as_ref()).await;
    crud_set_then_get_returns_value(backend.as_ref()).await;
    crud_set_overwrites_existing(backend.as_ref()).await;
    crud_delete_nonexistent_is_noop(backend.as_ref()).await;
    crud_delete_removes_key(backend.as_ref()).await;
    crud_large_value_roundtrip(backend.as_ref()).await;

    // TTL
    ttl_key_expires(backend.as_ref()).await;
    ttl_zero_is_immediately_expired(backend.as_ref()).await;
    ttl_overwrite_clears_ttl(backend.as_ref()).await;
    ttl_add_with_ttl_expires(backend.as_ref()).await;

    // Conditional
    conditional_add_inserts_when_absent(backend.as_ref()).await;
    conditional_add_rejects_existing(backend.as_ref()).await;
    conditional_replace_does_not_create(backend.as_ref()).await;
    conditional_replace_overwrites_existing(backend.as_ref()).await;
    conditional_replace_after_delete_is_noop(backend.as_ref()).await;

    // Concurrent
    concurrent_sets_to_different_keys(Arc::clone(&backend)).await;
    concurrent_reads_return_consistent_value(Arc::clone(&backend)).await;
    concurrent_add_exactly_one_winner(Arc::clone(&backend)).await;

    // Error semantics
    health_check_succeeds(backend.as_ref()).await;
    get_deleted_key_returns_none_not_error(backend.as_ref()).await;
    idempotent_delete(backend.as_ref()).await;
}
