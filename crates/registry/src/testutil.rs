//! Ticket fixtures for tests.
//!
//! Enabled by the `testutil` feature:
//!
//! ```toml
//! [dev-dependencies]
//! ticketry-registry = { path = "../registry", features = ["testutil"] }
//! ```

use chrono::{DateTime, Utc};
use ticketry_storage::MemoryBackend;

use crate::{
    authentication::{Authentication, Principal, Service},
    config::RegistryConfig,
    expiration::Expiration,
    registry::TicketRegistry,
    ticket::TicketGrantingTicket,
};

/// An authentication for `principal` completed now by a password handler.
#[must_use]
pub fn authentication(principal: &str) -> Authentication {
    Authentication::builder()
        .principal(
            Principal::builder()
                .id(principal)
                .attributes([("mail".to_owned(), vec![format!("{principal}@example.com")])].into())
                .build(),
        )
        .authenticated_at(Utc::now())
        .successes(vec!["password".to_owned()])
        .build()
}

/// A never-expiring session root for `casuser`.
#[must_use]
pub fn tgt(id: &str, now: DateTime<Utc>) -> TicketGrantingTicket {
    TicketGrantingTicket::new(id.into(), authentication("casuser"), Expiration::NeverExpires, now)
}

/// The default relying party.
#[must_use]
pub fn app() -> Service {
    Service::new("https://app.example.com/login")
}

/// A service that requests proxy authorization.
#[must_use]
pub fn proxy_app() -> Service {
    Service::new("https://proxy.example.com/pgtCallback")
}

/// A registry over a fresh [`MemoryBackend`] with default settings.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
#[must_use]
pub fn registry() -> TicketRegistry<MemoryBackend> {
    TicketRegistry::new(MemoryBackend::new())
}

/// A registry over a fresh [`MemoryBackend`] with `config`.
///
/// # Panics
///
/// Panics if called outside of a Tokio runtime.
#[must_use]
pub fn registry_with(config: RegistryConfig) -> TicketRegistry<MemoryBackend> {
    TicketRegistry::with_config(MemoryBackend::new(), config)
}
