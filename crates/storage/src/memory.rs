//! In-memory cache backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-process implementation of
//! [`StorageBackend`] that behaves like a single-node distributed cache. It is
//! used by tests and by development deployments that do not run a cache
//! cluster.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **TTL support**: Expired keys are invisible immediately and removed by a background task
//! - **Conditional writes**: `add` / `replace` follow memcached semantics
//! - **Size limits**: Oversized keys and values are rejected like a real cache would
//!
//! # Example
//!
//! ```
//! use ticketry_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - No replication or distributed features
//! - TTL cleanup runs every second, so physical removal is not precise

use std::{
    collections::BTreeMap,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use fail::fail_point;
use parking_lot::RwLock;
use tokio::{select, sync::watch, time::sleep};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    size_limits::{SizeLimits, validate_key_size, validate_sizes},
};

/// Holds the shutdown signal sender. When dropped, the watch channel
/// closes and the cleanup task exits.
struct ShutdownGuard {
    shutdown_tx: watch::Sender<()>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        // Sending is a best-effort signal; the receiver may already be gone.
        let _ = self.shutdown_tx.send(());
    }
}

/// In-memory cache backend using [`BTreeMap`].
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
///
/// # Shutdown
///
/// The background TTL cleanup task stops automatically when all clones of
/// the `MemoryBackend` are dropped. You can also call
/// [`shutdown`](Self::shutdown) to stop the task explicitly.
#[derive(Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    ttl_data: Arc<RwLock<BTreeMap<Vec<u8>, Instant>>>,
    size_limits: SizeLimits,
    shutdown_guard: Arc<ShutdownGuard>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.data.read().len())
            .field("size_limits", &self.size_limits)
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    /// Creates a new in-memory backend with the default [`SizeLimits`].
    ///
    /// This also spawns a background task on the current Tokio runtime that
    /// periodically removes expired keys. The task stops automatically when
    /// all clones of the backend are dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new() -> Self {
        Self::with_size_limits(SizeLimits::default())
    }

    /// Creates a new in-memory backend enforcing the given size limits.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_size_limits(size_limits: SizeLimits) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let backend = Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            ttl_data: Arc::new(RwLock::new(BTreeMap::new())),
            size_limits,
            shutdown_guard: Arc::new(ShutdownGuard { shutdown_tx }),
        };

        // The task holds the maps but not the guard, so dropping every
        // user-held clone closes the channel.
        let data = Arc::clone(&backend.data);
        let ttl_data = Arc::clone(&backend.ttl_data);
        tokio::spawn(async move {
            cleanup_expired_keys(data, ttl_data, shutdown_rx).await;
        });

        backend
    }

    /// Explicitly signals the background TTL cleanup task to stop.
    ///
    /// This is optional; the task also stops when all clones are dropped.
    pub fn shutdown(&self) {
        let _ = self.shutdown_guard.shutdown_tx.send(());
    }

    /// Returns the number of physically stored entries, including entries
    /// whose TTL elapsed but that the cleanup task has not removed yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no entries are physically stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Returns `true` if the key is physically present, ignoring TTL.
    ///
    /// Lets tests observe whether an entry was actually removed rather than
    /// merely hidden by expiration.
    #[must_use]
    pub fn contains_raw(&self, key: &[u8]) -> bool {
        self.data.read().contains_key(key)
    }

    /// Checks if a key has expired.
    fn is_expired(&self, key: &[u8]) -> bool {
        let ttl_guard = self.ttl_data.read();
        ttl_guard.get(key).is_some_and(|expiry| *expiry <= Instant::now())
    }

    /// Computes the absolute expiry for a TTL, rejecting values that would
    /// overflow [`Instant`].
    fn expiry_for(ttl: Duration) -> StorageResult<Instant> {
        Instant::now().checked_add(ttl).ok_or_else(|| {
            StorageError::internal(format!("ttl of {}s overflows the clock", ttl.as_secs()))
        })
    }

    /// Writes an entry under both write locks, always taken in the order
    /// `data` then `ttl_data`.
    fn write_entry(
        data: &mut BTreeMap<Vec<u8>, Bytes>,
        ttl_data: &mut BTreeMap<Vec<u8>, Instant>,
        key: Vec<u8>,
        value: Vec<u8>,
        expiry: Option<Instant>,
    ) {
        match expiry {
            Some(expiry) => {
                ttl_data.insert(key.clone(), expiry);
            },
            None => {
                ttl_data.remove(&key);
            },
        }
        data.insert(key, Bytes::from(value));
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task removing expired keys.
///
/// Runs every second and exits when the shutdown signal is received.
async fn cleanup_expired_keys(
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
    ttl_data: Arc<RwLock<BTreeMap<Vec<u8>, Instant>>>,
    mut shutdown_rx: watch::Receiver<()>,
) {
    loop {
        select! {
            _ = sleep(Duration::from_secs(1)) => {}
            _ = shutdown_rx.changed() => {
                return;
            }
        }

        let now = Instant::now();
        let expired_keys: Vec<Vec<u8>> = {
            let ttl_guard = ttl_data.read();
            ttl_guard
                .iter()
                .filter(|(_, expiry)| **expiry <= now)
                .map(|(key, _)| key.clone())
                .collect()
        };

        if !expired_keys.is_empty() {
            let mut data_guard = data.write();
            let mut ttl_guard = ttl_data.write();
            for key in &expired_keys {
                // A concurrent write may have refreshed the TTL since the scan.
                if ttl_guard.get(key).is_some_and(|expiry| *expiry <= now) {
                    data_guard.remove(key);
                    ttl_guard.remove(key);
                }
            }
            tracing::trace!(count = expired_keys.len(), "Swept expired cache entries");
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(key)))]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        fail_point!("memory-get", |_| Err(StorageError::connection("injected get failure")));
        validate_key_size(key, &self.size_limits)?;

        if self.is_expired(key) {
            return Ok(None);
        }

        let data = self.data.read();
        Ok(data.get(key).cloned())
    }

    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(&key)))]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        fail_point!("memory-set", |_| Err(StorageError::connection("injected set failure")));
        validate_sizes(&key, &value, &self.size_limits)?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        Self::write_entry(&mut data, &mut ttl_data, key, value, None);
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(&key), ttl_secs = ttl.as_secs()))]
    async fn set_with_ttl(&self, key: Vec<u8>, value: Vec<u8>, ttl: Duration) -> StorageResult<()> {
        fail_point!("memory-set", |_| Err(StorageError::connection("injected set failure")));
        validate_sizes(&key, &value, &self.size_limits)?;
        let expiry = Self::expiry_for(ttl)?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();
        Self::write_entry(&mut data, &mut ttl_data, key, value, Some(expiry));
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(&key)))]
    async fn add(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<bool> {
        fail_point!("memory-add", |_| Err(StorageError::connection("injected add failure")));
        validate_sizes(&key, &value, &self.size_limits)?;
        let expiry = ttl.map(Self::expiry_for).transpose()?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();

        let live = data.contains_key(&key)
            && !ttl_data.get(&key).is_some_and(|expiry| *expiry <= Instant::now());
        if live {
            return Ok(false);
        }

        Self::write_entry(&mut data, &mut ttl_data, key, value, expiry);
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(&key)))]
    async fn replace(
        &self,
        key: Vec<u8>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> StorageResult<bool> {
        fail_point!("memory-replace", |_| {
            Err(StorageError::connection("injected replace failure"))
        });
        validate_sizes(&key, &value, &self.size_limits)?;
        let expiry = ttl.map(Self::expiry_for).transpose()?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();

        let live = data.contains_key(&key)
            && !ttl_data.get(&key).is_some_and(|expiry| *expiry <= Instant::now());
        if !live {
            return Ok(false);
        }

        Self::write_entry(&mut data, &mut ttl_data, key, value, expiry);
        Ok(true)
    }

    #[tracing::instrument(skip_all, fields(key = %String::from_utf8_lossy(key)))]
    async fn delete(&self, key: &[u8]) -> StorageResult<bool> {
        fail_point!("memory-delete", |_| {
            Err(StorageError::connection("injected delete failure"))
        });
        validate_key_size(key, &self.size_limits)?;

        let mut data = self.data.write();
        let mut ttl_data = self.ttl_data.write();

        let expired = ttl_data.remove(key).is_some_and(|expiry| expiry <= Instant::now());
        let removed = data.remove(key).is_some();
        Ok(removed && !expired)
    }

    #[tracing::instrument(skip_all)]
    async fn health_check(&self) -> StorageResult<()> {
        fail_point!("health-check", |_| Err(StorageError::connection("injected health failure")));
        // Acquiring the read lock proves we're not deadlocked.
        let _unused = self.data.read();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_is_insert_if_absent() {
        let backend = MemoryBackend::new();
        assert!(backend.add(b"k".to_vec(), b"v1".to_vec(), None).await.unwrap());
        assert!(!backend.add(b"k".to_vec(), b"v2".to_vec(), None).await.unwrap());
        assert_eq!(backend.get(b"k").await.unwrap(), Some(Bytes::from("v1")));
    }

    #[tokio::test]
    async fn test_add_over_expired_entry_succeeds() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"old".to_vec(), Duration::ZERO).await.unwrap();
        assert!(backend.add(b"k".to_vec(), b"new".to_vec(), None).await.unwrap());
        assert_eq!(backend.get(b"k").await.unwrap(), Some(Bytes::from("new")));
    }

    #[tokio::test]
    async fn test_replace_requires_live_entry() {
        let backend = MemoryBackend::new();
        assert!(!backend.replace(b"k".to_vec(), b"v".to_vec(), None).await.unwrap());
        assert!(!backend.contains_raw(b"k"));

        backend.set(b"k".to_vec(), b"v1".to_vec()).await.unwrap();
        assert!(backend.replace(b"k".to_vec(), b"v2".to_vec(), None).await.unwrap());
        assert_eq!(backend.get(b"k").await.unwrap(), Some(Bytes::from("v2")));
    }

    #[tokio::test]
    async fn test_replace_resets_ttl() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v1".to_vec(), Duration::from_secs(60)).await.unwrap();
        assert!(backend.replace(b"k".to_vec(), b"v2".to_vec(), None).await.unwrap());
        assert!(backend.ttl_data.read().get(b"k".as_slice()).is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let backend = MemoryBackend::new();
        backend.set(b"k".to_vec(), b"v".to_vec()).await.unwrap();
        assert!(backend.delete(b"k").await.unwrap());
        assert!(!backend.delete(b"k").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_of_expired_entry_reports_false() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert!(!backend.delete(b"k").await.unwrap());
        assert!(!backend.contains_raw(b"k"));
    }

    #[tokio::test]
    async fn test_oversized_key_rejected() {
        let backend = MemoryBackend::with_size_limits(SizeLimits::new(4, 16).unwrap());
        let err = backend.set(b"too-long".to_vec(), b"v".to_vec()).await.unwrap_err();
        assert!(matches!(err, StorageError::SizeLimitExceeded { kind: "key", .. }));
    }

    #[tokio::test]
    async fn test_overflowing_ttl_is_an_error() {
        let backend = MemoryBackend::new();
        let result = backend.set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::MAX).await;
        assert!(matches!(result, Err(StorageError::Internal { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let backend = MemoryBackend::new();
        backend.set_with_ttl(b"k".to_vec(), b"v".to_vec(), Duration::ZERO).await.unwrap();
        assert!(backend.contains_raw(b"k"));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        tokio::task::yield_now().await;

        assert!(!backend.contains_raw(b"k"));
    }

    #[tokio::test]
    async fn test_health_check() {
        let backend = MemoryBackend::new();
        backend.health_check().await.expect("health check failed");
    }
}
