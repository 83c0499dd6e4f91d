//! Ticket-granting and proxy-granting tickets.

use std::{
    collections::{BTreeMap, BTreeSet},
    ops::{Deref, DerefMut},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ServiceTicket, TicketState};
use crate::{
    authentication::{Authentication, Service},
    error::{TicketError, TicketResult},
    expiration::Expiration,
    id::TicketId,
};

/// Root of a login session, or with `proxied_by` set, a proxy-granting
/// ticket further down a proxy chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketGrantingTicket {
    state: TicketState,
    authentication: Authentication,
    /// Service tickets granted from this ticket and the service each was for.
    #[serde(default)]
    services: BTreeMap<TicketId, Service>,
    /// Proxy-granting tickets obtained through this ticket's service tickets.
    #[serde(default)]
    proxy_granting_tickets: BTreeSet<TicketId>,
    /// The service that obtained this ticket, for proxy-granting tickets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    proxied_by: Option<Service>,
    /// The ticket this one descends from, for proxy-granting tickets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    granting_ticket_id: Option<TicketId>,
    #[serde(default)]
    expired: bool,
}

impl TicketGrantingTicket {
    /// Creates the root ticket of a new session.
    #[must_use]
    pub fn new(
        id: TicketId,
        authentication: Authentication,
        expiration_policy: Expiration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state: TicketState::new(id, expiration_policy, now),
            authentication,
            services: BTreeMap::new(),
            proxy_granting_tickets: BTreeSet::new(),
            proxied_by: None,
            granting_ticket_id: None,
            expired: false,
        }
    }

    /// The ticket's ID.
    #[must_use]
    pub fn id(&self) -> &TicketId {
        &self.state.id
    }

    /// The ticket's shared state.
    #[must_use]
    pub fn state(&self) -> &TicketState {
        &self.state
    }

    /// The login this session stands for.
    #[must_use]
    pub fn authentication(&self) -> &Authentication {
        &self.authentication
    }

    /// Service tickets granted from this ticket.
    #[must_use]
    pub fn services(&self) -> &BTreeMap<TicketId, Service> {
        &self.services
    }

    /// Proxy-granting tickets descending from this ticket.
    #[must_use]
    pub fn proxy_granting_tickets(&self) -> &BTreeSet<TicketId> {
        &self.proxy_granting_tickets
    }

    /// The service acting as proxy, `None` for a session root.
    #[must_use]
    pub fn proxied_by(&self) -> Option<&Service> {
        self.proxied_by.as_ref()
    }

    /// The parent ticket, `None` for a session root.
    #[must_use]
    pub fn granting_ticket_id(&self) -> Option<&TicketId> {
        self.granting_ticket_id.as_ref()
    }

    /// Whether this is the root of its session.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.granting_ticket_id.is_none()
    }

    /// IDs of every ticket granted from this one.
    #[must_use]
    pub fn child_ids(&self) -> Vec<TicketId> {
        self.services.keys().chain(&self.proxy_granting_tickets).cloned().collect()
    }

    /// Forces the ticket out regardless of its policy.
    pub fn mark_expired(&mut self) {
        self.expired = true;
    }

    /// Whether the ticket was marked expired or its policy elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expired || self.state.is_expired(now)
    }

    /// Records a use at `now`.
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.state.record_use(now);
    }

    /// Grants a service ticket for `service`.
    ///
    /// The new ticket is recorded among this ticket's children and counts as
    /// a use of this ticket. It is `from_new_login` when credentials were just
    /// provided or when this ticket had never been used.
    ///
    /// A ticket read through [`TicketRegistry::get_ticket`] already carries
    /// that read as a use, so granting from it is never `from_new_login`
    /// unless `credentials_provided` is set.
    /// [`TicketRegistry::grant_service_ticket`] fetches the parent without
    /// recording a use and keeps the first grant `from_new_login`.
    ///
    /// [`TicketRegistry::get_ticket`]: crate::TicketRegistry::get_ticket
    /// [`TicketRegistry::grant_service_ticket`]: crate::TicketRegistry::grant_service_ticket
    ///
    /// # Errors
    ///
    /// Returns [`TicketError::InvalidTicket`] if this ticket is expired.
    pub fn grant_service_ticket(
        &mut self,
        id: TicketId,
        service: Service,
        expiration_policy: Expiration,
        credentials_provided: bool,
        proxy_allowed: bool,
        now: DateTime<Utc>,
    ) -> TicketResult<ServiceTicket> {
        if self.is_expired(now) {
            return Err(TicketError::invalid(self.id(), "granting ticket is expired"));
        }

        let from_new_login = credentials_provided || self.state.count_of_uses == 0;
        let ticket = ServiceTicket::new(
            id.clone(),
            self.id().clone(),
            service.clone(),
            expiration_policy,
            from_new_login,
            proxy_allowed,
            now,
        );

        self.services.insert(id, service);
        self.record_use(now);
        Ok(ticket)
    }

    /// Builds a proxy-granting ticket descending from `parent`.
    pub(crate) fn new_proxy(
        id: TicketId,
        parent: &TicketId,
        proxied_by: Service,
        authentication: Authentication,
        expiration_policy: Expiration,
        now: DateTime<Utc>,
    ) -> ProxyGrantingTicket {
        let mut ticket = Self::new(id, authentication, expiration_policy, now);
        ticket.proxied_by = Some(proxied_by);
        ticket.granting_ticket_id = Some(parent.clone());
        ProxyGrantingTicket(ticket)
    }

    pub(crate) fn add_proxy_granting_ticket(&mut self, id: TicketId) {
        self.proxy_granting_tickets.insert(id);
    }
}

/// A ticket-granting ticket held by a proxying service.
///
/// Dereferences to [`TicketGrantingTicket`], so a PGT grants service tickets
/// exactly like a session root.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyGrantingTicket(TicketGrantingTicket);

impl ProxyGrantingTicket {
    /// Unwraps into the underlying granting ticket.
    #[must_use]
    pub fn into_inner(self) -> TicketGrantingTicket {
        self.0
    }
}

impl TryFrom<TicketGrantingTicket> for ProxyGrantingTicket {
    type Error = TicketGrantingTicket;

    /// Succeeds if the ticket was obtained by a proxying service.
    fn try_from(ticket: TicketGrantingTicket) -> Result<Self, Self::Error> {
        if ticket.proxied_by.is_some() { Ok(Self(ticket)) } else { Err(ticket) }
    }
}

impl Deref for ProxyGrantingTicket {
    type Target = TicketGrantingTicket;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for ProxyGrantingTicket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
