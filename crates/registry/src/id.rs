//! Ticket identifiers and their generation.
//!
//! IDs share one namespace in the cache across every ticket type, so the
//! generator combines a per-process monotonic counter with a random segment:
//! `{prefix}-{counter}-{random}[-{suffix}]`.

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};

/// Prefix for ticket-granting ticket IDs.
pub const TICKET_GRANTING_TICKET_PREFIX: &str = "TGT";

/// Prefix for service ticket IDs.
pub const SERVICE_TICKET_PREFIX: &str = "ST";

/// Prefix for proxy-granting ticket IDs.
pub const PROXY_GRANTING_TICKET_PREFIX: &str = "PGT";

/// Default length of the random segment.
pub const DEFAULT_RANDOM_LENGTH: usize = 20;

/// Identifier of a ticket, also its key in the cache.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Creates an ID from an arbitrary string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the cache key for this ID.
    #[must_use]
    pub fn to_key(&self) -> Vec<u8> {
        self.0.as_bytes().to_vec()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for TicketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for TicketId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates unique ticket IDs.
///
/// The counter starts at 1 and is shared by every prefix. An optional suffix
/// (typically a node name) disambiguates IDs minted by different servers.
///
/// # Example
///
/// ```
/// use ticketry_registry::id::{SERVICE_TICKET_PREFIX, UniqueTicketIdGenerator};
///
/// let generator = UniqueTicketIdGenerator::builder().suffix("node1").build();
/// let id = generator.new_ticket_id(SERVICE_TICKET_PREFIX);
/// assert!(id.as_str().starts_with("ST-1-"));
/// assert!(id.as_str().ends_with("-node1"));
/// ```
#[derive(Debug, bon::Builder)]
pub struct UniqueTicketIdGenerator {
    #[builder(default = DEFAULT_RANDOM_LENGTH)]
    random_length: usize,
    #[builder(into)]
    suffix: Option<String>,
    #[builder(skip = AtomicU64::new(1))]
    counter: AtomicU64,
}

impl Default for UniqueTicketIdGenerator {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl UniqueTicketIdGenerator {
    /// Mints a new ID with the given type prefix.
    #[must_use]
    pub fn new_ticket_id(&self, prefix: &str) -> TicketId {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        let random: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.random_length)
            .map(char::from)
            .collect();

        let id = match &self.suffix {
            Some(suffix) => format!("{prefix}-{count}-{random}-{suffix}"),
            None => format!("{prefix}-{count}-{random}"),
        };
        TicketId(id)
    }
}
