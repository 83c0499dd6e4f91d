//! Ticket data model.
//!
//! Two stored shapes exist:
//!
//! - [`TicketGrantingTicket`]: the root of a login session. With `proxied_by`
//!   set the same shape is a [`ProxyGrantingTicket`], obtained by a service
//!   acting on the user's behalf.
//! - [`ServiceTicket`]: a credential for one service, granted from a TGT or PGT.
//!
//! Tickets reference each other only by [`TicketId`]. A granting ticket lists
//! the IDs it granted and every granted ticket names its parent, so the
//! registry can walk the hierarchy in both directions through the cache.
//!
//! [`Ticket`] is the owned union used when reading from the cache and
//! [`TicketRef`] the borrowed form used when writing. Both serialize to the
//! same JSON document, tagged by `type`.

mod granting;
mod service;

use chrono::{DateTime, Utc};
pub use granting::{ProxyGrantingTicket, TicketGrantingTicket};
use serde::{Deserialize, Serialize};
pub use service::ServiceTicket;

use crate::{
    expiration::{Expiration, ExpirationPolicy},
    id::TicketId,
};

/// Bookkeeping shared by every ticket type.
///
/// Read-only outside this crate: uses are recorded through the owning
/// ticket, and the ID and policy are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketState {
    pub(crate) id: TicketId,
    pub(crate) created_at: DateTime<Utc>,
    /// Creation counts as a use time.
    pub(crate) last_used_at: DateTime<Utc>,
    pub(crate) previous_last_used_at: Option<DateTime<Utc>>,
    pub(crate) count_of_uses: u32,
    pub(crate) expiration_policy: Expiration,
}

impl TicketState {
    /// Fresh state for a ticket created at `now`.
    #[must_use]
    pub fn new(id: TicketId, expiration_policy: Expiration, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            last_used_at: now,
            previous_last_used_at: None,
            count_of_uses: 0,
            expiration_policy,
        }
    }

    /// Unique identifier, also the cache key.
    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.id
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Time of the most recent use.
    #[must_use]
    pub fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }

    /// Time of the use before the most recent one.
    #[must_use]
    pub fn previous_last_used_at(&self) -> Option<DateTime<Utc>> {
        self.previous_last_used_at
    }

    /// Number of recorded uses.
    #[must_use]
    pub fn count_of_uses(&self) -> u32 {
        self.count_of_uses
    }

    /// Policy deciding when the ticket expires.
    #[must_use]
    pub fn expiration_policy(&self) -> &Expiration {
        &self.expiration_policy
    }

    /// Records a use at `now`.
    pub(crate) fn record_use(&mut self, now: DateTime<Utc>) {
        self.previous_last_used_at = Some(self.last_used_at);
        self.last_used_at = now;
        self.count_of_uses = self.count_of_uses.saturating_add(1);
    }

    /// Whether the ticket's own policy considers it expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_policy.is_expired(self, now)
    }
}

/// Any ticket as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Ticket {
    /// A ticket-granting or proxy-granting ticket.
    TicketGranting(TicketGrantingTicket),
    /// A service ticket.
    Service(ServiceTicket),
}

impl Ticket {
    /// The ticket's ID.
    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.state().id
    }

    /// The ticket's shared state.
    #[must_use]
    pub fn state(&self) -> &TicketState {
        match self {
            Self::TicketGranting(ticket) => ticket.state(),
            Self::Service(ticket) => ticket.state(),
        }
    }

    /// The ticket this one was granted from, `None` for a session root.
    #[must_use]
    pub fn granting_ticket_id(&self) -> Option<&TicketId> {
        match self {
            Self::TicketGranting(ticket) => ticket.granting_ticket_id(),
            Self::Service(ticket) => Some(ticket.granting_ticket_id()),
        }
    }

    /// IDs of the tickets granted from this one.
    #[must_use]
    pub fn child_ids(&self) -> Vec<TicketId> {
        match self {
            Self::TicketGranting(ticket) => ticket.child_ids(),
            Self::Service(_) => Vec::new(),
        }
    }

    /// Whether the ticket is expired on its own, ignoring its ancestors.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::TicketGranting(ticket) => ticket.is_expired(now),
            Self::Service(ticket) => ticket.is_expired(now),
        }
    }

    /// Records a use at `now`.
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        match self {
            Self::TicketGranting(ticket) => ticket.record_use(now),
            Self::Service(ticket) => ticket.record_use(now),
        }
    }
}

impl From<TicketGrantingTicket> for Ticket {
    fn from(ticket: TicketGrantingTicket) -> Self {
        Self::TicketGranting(ticket)
    }
}

impl From<ProxyGrantingTicket> for Ticket {
    fn from(ticket: ProxyGrantingTicket) -> Self {
        Self::TicketGranting(ticket.into_inner())
    }
}

impl From<ServiceTicket> for Ticket {
    fn from(ticket: ServiceTicket) -> Self {
        Self::Service(ticket)
    }
}

/// Borrowed view of a ticket, serialized exactly like [`Ticket`].
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TicketRef<'a> {
    /// A ticket-granting or proxy-granting ticket.
    TicketGranting(&'a TicketGrantingTicket),
    /// A service ticket.
    Service(&'a ServiceTicket),
}

impl<'a> TicketRef<'a> {
    /// The ticket's shared state.
    #[must_use]
    pub fn state(self) -> &'a TicketState {
        match self {
            Self::TicketGranting(ticket) => ticket.state(),
            Self::Service(ticket) => ticket.state(),
        }
    }

    /// The ticket's ID.
    #[must_use]
    pub fn id(self) -> &'a TicketId {
        &self.state().id
    }

    /// The ticket this one was granted from, `None` for a session root.
    #[must_use]
    pub fn granting_ticket_id(self) -> Option<&'a TicketId> {
        match self {
            Self::TicketGranting(ticket) => ticket.granting_ticket_id(),
            Self::Service(ticket) => Some(ticket.granting_ticket_id()),
        }
    }

    /// Whether the ticket is expired on its own, ignoring its ancestors.
    #[must_use]
    pub fn is_expired(self, now: DateTime<Utc>) -> bool {
        match self {
            Self::TicketGranting(ticket) => ticket.is_expired(now),
            Self::Service(ticket) => ticket.is_expired(now),
        }
    }
}

/// Types that can be written to the registry.
pub trait AsTicket {
    /// Borrows the value as a storable ticket.
    fn as_ticket(&self) -> TicketRef<'_>;
}

impl AsTicket for Ticket {
    fn as_ticket(&self) -> TicketRef<'_> {
        match self {
            Self::TicketGranting(ticket) => TicketRef::TicketGranting(ticket),
            Self::Service(ticket) => TicketRef::Service(ticket),
        }
    }
}

impl AsTicket for TicketGrantingTicket {
    fn as_ticket(&self) -> TicketRef<'_> {
        TicketRef::TicketGranting(self)
    }
}

impl AsTicket for ProxyGrantingTicket {
    fn as_ticket(&self) -> TicketRef<'_> {
        TicketRef::TicketGranting(&**self)
    }
}

impl AsTicket for ServiceTicket {
    fn as_ticket(&self) -> TicketRef<'_> {
        TicketRef::Service(self)
    }
}

/// Types a stored ticket can be read back as.
///
/// Reading a ticket as the wrong kind yields `None` rather than an error.
pub trait TicketKind: AsTicket + Sized {
    /// Narrows a stored ticket to this kind.
    fn from_ticket(ticket: Ticket) -> Option<Self>;

    /// Records a use at `now`.
    fn record_use(&mut self, now: DateTime<Utc>);
}

impl TicketKind for Ticket {
    fn from_ticket(ticket: Ticket) -> Option<Self> {
        Some(ticket)
    }

    fn record_use(&mut self, now: DateTime<Utc>) {
        Ticket::record_use(self, now);
    }
}

/// Accepts proxy-granting tickets too: a PGT is a TGT.
impl TicketKind for TicketGrantingTicket {
    fn from_ticket(ticket: Ticket) -> Option<Self> {
        match ticket {
            Ticket::TicketGranting(ticket) => Some(ticket),
            Ticket::Service(_) => None,
        }
    }

    fn record_use(&mut self, now: DateTime<Utc>) {
        TicketGrantingTicket::record_use(self, now);
    }
}

impl TicketKind for ProxyGrantingTicket {
    fn from_ticket(ticket: Ticket) -> Option<Self> {
        match ticket {
            Ticket::TicketGranting(ticket) => ProxyGrantingTicket::try_from(ticket).ok(),
            Ticket::Service(_) => None,
        }
    }

    fn record_use(&mut self, now: DateTime<Utc>) {
        TicketGrantingTicket::record_use(self, now);
    }
}

impl TicketKind for ServiceTicket {
    fn from_ticket(ticket: Ticket) -> Option<Self> {
        match ticket {
            Ticket::Service(ticket) => Some(ticket),
            Ticket::TicketGranting(_) => None,
        }
    }

    fn record_use(&mut self, now: DateTime<Utc>) {
        ServiceTicket::record_use(self, now);
    }
}
