//! Cache backend abstraction for the Ticketry ticket registry.
//!
//! This crate provides the [`StorageBackend`] trait: the narrow contract the
//! registry consumes from a distributed key-value cache with per-entry
//! expiration. Ticket semantics live one layer up in `ticketry-registry`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Protocol handlers (external)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  ticketry-registry                          │
//! │   TicketRegistry: add / get / update / cascade delete       │
//! │   (ticket model, expiration policies, serialization)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  ticketry-storage                           │
//! │              StorageBackend trait                           │
//! │     (get, set, set_with_ttl, add, replace, delete)          │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│      cache wire client (memcached, ...)      │
//! │  (testing)   │            (external)                        │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::time::Duration;
//!
//! use ticketry_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set_with_ttl(b"ST-1".to_vec(), b"{}".to_vec(), Duration::from_secs(10)).await?;
//!     assert!(backend.get(b"ST-1").await?.is_some());
//!
//!     assert!(backend.delete(b"ST-1").await?);
//!     assert!(!backend.delete(b"ST-1").await?);
//!     Ok(())
//! }
//! ```
//!
//! # Implementing a Backend
//!
//! 1. Implement the [`StorageBackend`] trait over the cache client
//! 2. Map client errors to [`StorageError`] (connection drops to `Connection`, deadlines to
//!    `Timeout`)
//! 3. Run the [`conformance`] suite against it
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` and `conformance` modules.
//! - **`failpoints`**: Compiles the fail points in [`MemoryBackend`] (`memory-get`, `memory-set`,
//!   `memory-add`, `memory-replace`, `memory-delete`, `health-check`).

#![deny(unsafe_code)]

pub mod backend;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod conformance;
pub mod error;
pub mod memory;
pub mod size_limits;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use error::{BoxError, ConfigError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use size_limits::{
    DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE, SizeLimits, validate_key_size, validate_sizes,
};
