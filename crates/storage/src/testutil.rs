//! Helpers for tests that drive a cache backend.
//!
//! Compiled only with the `testutil` feature (or under `cfg(test)`), so none
//! of this reaches production builds:
//!
//! ```toml
//! [dev-dependencies]
//! ticketry-storage = { path = "../storage", features = ["testutil"] }
//! ```

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
};

/// Builds a ticket-shaped cache key such as `ST-42-test`.
#[must_use]
pub fn ticket_key(prefix: &str, n: usize) -> Vec<u8> {
    format!("{prefix}-{n}-test").into_bytes()
}

/// A value naming the writer and its sequence number, for example
/// `writer-3:17`, so concurrent tests can tell who wrote last.
#[must_use]
pub fn writer_value(writer: usize, seq: usize) -> Vec<u8> {
    format!("writer-{writer}:{seq}").into_bytes()
}

/// A [`MemoryBackend`] holding `count` entries keyed by [`ticket_key`].
///
/// Each value is a small JSON document carrying the entry's key.
///
/// # Panics
///
/// Panics if a write fails.
pub async fn backend_with_tickets(prefix: &str, count: usize) -> MemoryBackend {
    let backend = MemoryBackend::new();
    for n in 0..count {
        let key = ticket_key(prefix, n);
        let value = format!(r#"{{"id":"{}"}}"#, String::from_utf8_lossy(&key)).into_bytes();
        if let Err(err) = backend.set(key, value).await {
            panic!("seeding {prefix} entries failed: {err}");
        }
    }
    backend
}

/// Asserts that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// ```no_run
/// use ticketry_storage::{StorageError, StorageResult, assert_conflict};
///
/// let result: StorageResult<()> = Err(StorageError::conflict("TGT-1"));
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        $crate::assert_conflict!($result, "write should have been rejected")
    };
    ($result:expr, $msg:expr) => {
        match &$result {
            Err($crate::error::StorageError::Conflict { .. }) => {},
            other => panic!("{}: expected a conflict, got {other:?}", $msg),
        }
    };
}

/// Unwraps an `Ok` [`StorageResult`], panicking with the error otherwise.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        $crate::assert_storage_ok!($result, "storage call failed")
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => panic!("{}: {err:?}", $msg),
        }
    };
}

/// Asserts that a [`StorageResult`] is a [`StorageError::Connection`].
#[macro_export]
macro_rules! assert_connection_error {
    ($result:expr) => {
        match &$result {
            Err($crate::error::StorageError::Connection { .. }) => {},
            other => panic!("expected a connection error, got {other:?}"),
        }
    };
}

/// Whether the call failed with an error worth retrying.
pub fn is_transient<T>(result: &StorageResult<T>) -> bool {
    result.as_ref().err().is_some_and(StorageError::is_transient)
}
