//! Cache backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, the contract the ticket
//! registry consumes from the distributed cache. Implementations wrap a real
//! cache client (memcached, Redis, ...) or, for tests and development, the
//! in-process [`MemoryBackend`](crate::MemoryBackend).
//!
//! # Design Philosophy
//!
//! The trait mirrors what a distributed cache natively offers:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Per-key expiration**: Every write may carry a time-to-live
//! - **Single-key atomicity only**: `add` and `replace` are conditional on one key; there are no
//!   cross-key transactions and writes are last-write-wins
//! - **Missing keys are normal**: reads return `None`, deletes return `false`
//!
//! Ticket semantics (types, expiration policies, cascading revocation) live in
//! the registry layer built on top of this trait.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageResult;

/// Abstract cache backend for ticket entries.
///
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations. Failures to reach the cache are reported as
/// [`StorageError`](crate::StorageError) and are never retried here.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a value without expiration |
/// | [`set_with_ttl`](StorageBackend::set_with_ttl) | Store with automatic expiration |
/// | [`add`](StorageBackend::add) | Store only if the key is absent |
/// | [`replace`](StorageBackend::replace) | Store only if the key is present |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use bytes::Bytes;
/// use ticketry_storage::{MemoryBackend, StorageBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// assert!(backend.add(b"TGT-1".to_vec(), b"{}".to_vec(), Some(Duration::from_secs(60))).await.unwrap());
/// assert!(!backend.add(b"TGT-1".to_vec(), b"{}".to_vec(), None).await.unwrap());
/// assert_eq!(backend.get(b"TGT-1").await.unwrap(), Some(Bytes::from("{}")));
/// assert!(backend.delete(b"TGT-1").await.unwrap());
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists and has not expired
    /// - `Ok(None)` if the key doesn't exist or its TTL elapsed
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair without expiration.
    ///
    /// If the key already exists, its value is overwritten and any TTL on it
    /// is cleared.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Stores a key-value pair that expires after `ttl`.
    ///
    /// Wire clients round `ttl` to whole seconds at the implementation
    /// boundary.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()>;

    /// Stores a key-value pair only if the key is absent (or expired).
    ///
    /// `ttl: None` stores the entry without expiration.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the entry was written, `Ok(false)` if the key was taken.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn add(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<bool>;

    /// Overwrites a key-value pair only if the key is currently present.
    ///
    /// The entry's TTL is reset to `ttl` (`None` clears it). A key that was
    /// deleted or expired is not recreated.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the entry was replaced, `Ok(false)` if the key was absent.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn replace(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<bool>;

    /// Deletes a key.
    ///
    /// Deleting a missing key is a no-op, so concurrent deletes of the same
    /// key are safe.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a live entry was removed, `Ok(false)` otherwise.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool>;

    /// Checks if the backend is healthy and accepting requests.
    ///
    /// This should be a lightweight check suitable for readiness probes.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
