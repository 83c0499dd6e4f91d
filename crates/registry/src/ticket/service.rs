//! Service tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProxyGrantingTicket, TicketGrantingTicket, TicketState};
use crate::{
    authentication::{Authentication, Service},
    error::{TicketError, TicketResult},
    expiration::Expiration,
    id::TicketId,
};

/// A credential for a single service, granted from a TGT or PGT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTicket {
    state: TicketState,
    granting_ticket_id: TicketId,
    service: Service,
    from_new_login: bool,
    proxy_allowed: bool,
    #[serde(default)]
    granted_proxy_granting_ticket: bool,
}

impl ServiceTicket {
    pub(super) fn new(
        id: TicketId,
        granting_ticket_id: TicketId,
        service: Service,
        expiration_policy: Expiration,
        from_new_login: bool,
        proxy_allowed: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            state: TicketState::new(id, expiration_policy, now),
            granting_ticket_id,
            service,
            from_new_login,
            proxy_allowed,
            granted_proxy_granting_ticket: false,
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

    /// The TGT or PGT this ticket was granted from.
    #[must_use]
    pub fn granting_ticket_id(&self) -> &TicketId {
        &self.granting_ticket_id
    }

    /// The service the ticket was issued for.
    #[must_use]
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Whether the ticket came straight out of a credential exchange.
    #[must_use]
    pub fn from_new_login(&self) -> bool {
        self.from_new_login
    }

    /// Whether proxy authorization was requested when the ticket was granted.
    #[must_use]
    pub fn proxy_allowed(&self) -> bool {
        self.proxy_allowed
    }

    /// Whether a proxy-granting ticket was already granted from this ticket.
    #[must_use]
    pub fn granted_proxy_granting_ticket(&self) -> bool {
        self.granted_proxy_granting_ticket
    }

    /// Whether the ticket's policy elapsed.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state.is_expired(now)
    }

    /// Records a use at `now`.
    pub fn record_use(&mut self, now: DateTime<Utc>) {
        self.state.record_use(now);
    }

    /// Validates the ticket for `service`.
    ///
    /// Validation always counts as a use, so a single-use ticket is spent
    /// even when presented to the wrong service.
    pub fn is_valid_for(&mut self, service: &Service, now: DateTime<Utc>) -> bool {
        self.record_use(now);
        self.service.matches(service)
    }

    /// Grants a proxy-granting ticket to this ticket's service.
    ///
    /// The new PGT descends from `granting_ticket`, which must be the ticket
    /// this service ticket was granted from; its ID is recorded there so that
    /// revoking the session revokes the proxy chain. At most one PGT may be
    /// granted per service ticket.
    ///
    /// # Errors
    ///
    /// - [`TicketError::UnauthorizedProxying`] if the ticket was granted without proxy
    ///   authorization
    /// - [`TicketError::InvalidTicket`] if this ticket or `granting_ticket` is expired, if
    ///   `granting_ticket` is not this ticket's parent, or if a PGT was already granted
    pub fn grant_proxy_granting_ticket(
        &mut self,
        id: TicketId,
        authentication: Authentication,
        expiration_policy: Expiration,
        granting_ticket: &mut TicketGrantingTicket,
        now: DateTime<Utc>,
    ) -> TicketResult<ProxyGrantingTicket> {
        if !self.proxy_allowed {
            return Err(TicketError::unauthorized_proxying(self.id()));
        }
        if self.is_expired(now) {
            return Err(TicketError::invalid(self.id(), "service ticket is expired"));
        }
        if granting_ticket.id() != &self.granting_ticket_id {
            return Err(TicketError::invalid(
                self.id(),
                format!("{} is not the granting ticket", granting_ticket.id()),
            ));
        }
        if granting_ticket.is_expired(now) {
            return Err(TicketError::invalid(granting_ticket.id(), "granting ticket is expired"));
        }
        if self.granted_proxy_granting_ticket {
            return Err(TicketError::invalid(
                self.id(),
                "a proxy-granting ticket was already granted",
            ));
        }

        let ticket = TicketGrantingTicket::new_proxy(
            id.clone(),
            &self.granting_ticket_id,
            self.service.clone(),
            authentication,
            expiration_policy,
            now,
        );
        granting_ticket.add_proxy_granting_ticket(id);
        self.granted_proxy_granting_ticket = true;
        Ok(ticket)
    }
}
