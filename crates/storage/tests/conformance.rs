//! Conformance test suite for `MemoryBackend`.
//!
//! Each test function corresponds to a single conformance check, providing
//! fine-grained failure reporting. The `run_all` test exercises the full
//! suite as a one-liner to verify no tests are accidentally omitted.

#![allow(clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use ticketry_storage::{MemoryBackend, conformance};

// ============================================================================
// CRUD (6 tests)
// ============================================================================

#[tokio::test]
async fn crud_get_returns_none_for_missing_key() {
    conformance::crud_get_returns_none_for_missing_key(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_set_then_get_returns_value() {
    conformance::crud_set_then_get_returns_value(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_set_overwrites_existing() {
    conformance::crud_set_overwrites_existing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_delete_nonexistent_is_noop() {
    conformance::crud_delete_nonexistent_is_noop(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_delete_removes_key() {
    conformance::crud_delete_removes_key(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn crud_large_value_roundtrip() {
    conformance::crud_large_value_roundtrip(&MemoryBackend::new()).await;
}

// ============================================================================
// TTL (4 tests)
// ============================================================================

#[tokio::test]
async fn ttl_key_expires() {
    conformance::ttl_key_expires(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn ttl_zero_is_immediately_expired() {
    conformance::ttl_zero_is_immediately_expired(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn ttl_overwrite_clears_ttl() {
    conformance::ttl_overwrite_clears_ttl(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn ttl_add_with_ttl_expires() {
    conformance::ttl_add_with_ttl_expires(&MemoryBackend::new()).await;
}

// ============================================================================
// Conditional writes (5 tests)
// ============================================================================

#[tokio::test]
async fn conditional_add_inserts_when_absent() {
    conformance::conditional_add_inserts_when_absent(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn conditional_add_rejects_existing() {
    conformance::conditional_add_rejects_existing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn conditional_replace_does_not_create() {
    conformance::conditional_replace_does_not_create(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn conditional_replace_overwrites_existing() {
    conformance::conditional_replace_overwrites_existing(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn conditional_replace_after_delete_is_noop() {
    conformance::conditional_replace_after_delete_is_noop(&MemoryBackend::new()).await;
}

// ============================================================================
// Concurrent (3 tests)
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sets_to_different_keys() {
    conformance::concurrent_sets_to_different_keys(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_return_consistent_value() {
    conformance::concurrent_reads_return_consistent_value(Arc::new(MemoryBackend::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_add_exactly_one_winner() {
    conformance::concurrent_add_exactly_one_winner(Arc::new(MemoryBackend::new())).await;
}

// ============================================================================
// Error semantics (3 tests)
// ============================================================================

#[tokio::test]
async fn health_check_succeeds() {
    conformance::health_check_succeeds(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn get_deleted_key_returns_none_not_error() {
    conformance::get_deleted_key_returns_none_not_error(&MemoryBackend::new()).await;
}

#[tokio::test]
async fn idempotent_delete() {
    conformance::idempotent_delete(&MemoryBackend::new()).await;
}

// ============================================================================
// Full suite
// ============================================================================

#[tokio::test]
async fn run_all_passes_for_memory_backend() {
    conformance::run_all(Arc::new(MemoryBackend::new())).await;
}
