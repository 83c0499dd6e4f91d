//! Ticket registry for a single-sign-on server.
//!
//! A login produces a **ticket-granting ticket** (TGT). The TGT grants
//! **service tickets** (ST) to relying parties, and a service ticket issued
//! with proxy authorization can be exchanged for a **proxy-granting ticket**
//! (PGT) that lets the service obtain service tickets on the user's behalf.
//! Revoking a ticket revokes everything granted from it.
//!
//! [`TicketRegistry`] stores this graph in any
//! [`StorageBackend`](ticketry_storage::StorageBackend), a key-value cache
//! with per-entry TTLs and no transactions, and enforces it at read time:
//!
//! - a ticket is usable only while its [`Expiration`] policy and those of all
//!   its ancestors allow it
//! - an expired ticket found on read is revoked together with its descendants
//! - a revoked ticket is never written back
//!
//! # Modules
//!
//! - [`ticket`]: the ticket model and the granting operations
//! - [`expiration`]: expiration policies
//! - [`registry`]: the cache-backed registry
//! - [`id`]: ticket IDs and their generator
//! - [`config`]: registry settings
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` fixtures module.
//! - **`failpoints`**: Enables fail points in the in-memory backend.

#![deny(unsafe_code)]

pub mod authentication;
pub mod config;
pub mod error;
pub mod expiration;
pub mod id;
pub mod registry;
#[cfg(any(test, feature = "testutil"))]
pub mod testutil;
pub mod ticket;

pub use authentication::{Attributes, Authentication, Principal, Service};
pub use config::{RegistryConfig, UsageTracking};
pub use error::{TicketError, TicketResult};
pub use expiration::{Expiration, ExpirationPolicy};
pub use id::{TicketId, UniqueTicketIdGenerator};
pub use registry::TicketRegistry;
pub use ticket::{
    AsTicket, ProxyGrantingTicket, ServiceTicket, Ticket, TicketGrantingTicket, TicketKind,
    TicketRef, TicketState,
};
