//! The ticket registry.
//!
//! [`TicketRegistry`] keeps the ticket graph in a [`StorageBackend`] that
//! knows nothing about tickets: every ticket is one JSON entry keyed by its
//! ID, and parent/child links are IDs resolved through further reads.
//!
//! # Expiration
//!
//! Expiration is checked on read. A ticket is expired when its own policy
//! says so, or when any ticket up its granting chain is missing or expired.
//! An expired ticket read from the cache is revoked on the spot, together
//! with everything it granted. Entries are also written with a cache TTL
//! derived from their policy so that unread tickets eventually disappear.
//!
//! # Revocation
//!
//! [`delete_ticket`](TicketRegistry::delete_ticket) walks the granted IDs
//! depth first and deletes children before their parent. The walk issues one
//! round trip per ticket and is not atomic: an interrupted cascade leaves
//! orphans that are unreachable (their parent is gone) and age out through
//! their cache TTL.
//!
//! # Concurrency
//!
//! The backend is the only shared state. Writes are last-write-wins per key,
//! so two requests granting from the same TGT at once may each record only
//! their own child. Callers needing exact child accounting must serialize
//! grants per TGT.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ticketry_storage::{StorageBackend, StorageError, StorageResult};

use crate::{
    authentication::{Authentication, Service},
    config::{RegistryConfig, UsageTracking},
    error::{TicketError, TicketResult},
    expiration::{Expiration, ExpirationPolicy},
    id::TicketId,
    ticket::{
        AsTicket, ProxyGrantingTicket, ServiceTicket, Ticket, TicketGrantingTicket, TicketKind,
        TicketRef,
    },
};

/// Registry of SSO tickets over a distributed cache.
///
/// # Example
///
/// ```
/// use chrono::Utc;
/// use ticketry_registry::{
///     Authentication, Expiration, Principal, Service, TicketGrantingTicket, TicketRegistry,
///     ServiceTicket,
/// };
/// use ticketry_storage::MemoryBackend;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = TicketRegistry::new(MemoryBackend::new());
///
/// let authentication = Authentication::builder()
///     .principal(Principal::builder().id("casuser").build())
///     .authenticated_at(Utc::now())
///     .build();
/// let tgt = TicketGrantingTicket::new(
///     "TGT-1".into(),
///     authentication,
///     Expiration::NeverExpires,
///     Utc::now(),
/// );
/// registry.add_ticket(&tgt).await?;
///
/// let st = registry
///     .grant_service_ticket(
///         tgt.id(),
///         "ST-1".into(),
///         Service::new("https://app.example.com"),
///         Expiration::NeverExpires,
///         false,
///         false,
///     )
///     .await?;
/// assert!(registry.get_ticket::<ServiceTicket>(st.id()).await?.is_some());
///
/// // Revoking the session revokes what it granted.
/// assert_eq!(registry.delete_ticket(tgt.id()).await?, 2);
/// assert!(registry.get_ticket::<ServiceTicket>(st.id()).await?.is_none());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TicketRegistry<B> {
    backend: B,
    config: RegistryConfig,
}

impl<B: StorageBackend> TicketRegistry<B> {
    /// Creates a registry with the default [`RegistryConfig`].
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, RegistryConfig::default())
    }

    /// Creates a registry with the given configuration.
    #[must_use]
    pub fn with_config(backend: B, config: RegistryConfig) -> Self {
        Self { backend, config }
    }

    /// The underlying cache backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The registry configuration.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Stores a new ticket.
    ///
    /// The cache entry expires after the policy's time-to-live plus the
    /// configured slack. Never-expiring tickets are stored without TTL.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Conflict`] if a ticket with the same ID exists
    /// - [`StorageError::Serialization`] if the ticket cannot be encoded
    /// - any backend failure
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.as_ticket().id()))]
    pub async fn add_ticket<T: AsTicket + ?Sized>(&self, ticket: &T) -> StorageResult<()> {
        let ticket = ticket.as_ticket();
        let value = encode(ticket)?;
        let ttl = self.cache_ttl(ticket);

        if !self.backend.add(ticket.id().to_key(), value, ttl).await? {
            return Err(StorageError::conflict(ticket.id().as_str()));
        }
        tracing::debug!(ttl_secs = ttl.map(|ttl| ttl.as_secs()), "Added ticket");
        Ok(())
    }

    /// Fetches a live ticket of kind `T`.
    ///
    /// Returns `None` if the ticket is absent (including IDs too long to be
    /// stored), cannot be decoded, is of another kind, or is expired. An
    /// expired ticket is revoked with its descendants before returning. A
    /// successful read records a use on the returned ticket, and with
    /// [`UsageTracking::Durable`] writes it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    #[tracing::instrument(skip_all, fields(ticket_id = %id))]
    pub async fn get_ticket<T: TicketKind>(&self, id: &TicketId) -> StorageResult<Option<T>> {
        let now = Utc::now();
        let Some(mut ticket) = self.fetch_live::<T>(id, now).await? else {
            return Ok(None);
        };

        ticket.record_use(now);
        if self.config.usage_tracking() == UsageTracking::Durable {
            self.update_ticket(&ticket).await?;
        }
        Ok(Some(ticket))
    }

    /// Writes back a changed ticket.
    ///
    /// Only an entry that still exists is replaced. An update for a ticket
    /// that was revoked or expired in the meantime is dropped, so revocation
    /// is never undone by a late write.
    ///
    /// # Errors
    ///
    /// - [`StorageError::Serialization`] if the ticket cannot be encoded
    /// - any backend failure
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.as_ticket().id()))]
    pub async fn update_ticket<T: AsTicket + ?Sized>(&self, ticket: &T) -> StorageResult<()> {
        let ticket = ticket.as_ticket();
        let value = encode(ticket)?;
        let ttl = self.cache_ttl(ticket);

        if !self.backend.replace(ticket.id().to_key(), value, ttl).await? {
            tracing::warn!("Dropped update for a ticket that is no longer stored");
        }
        Ok(())
    }

    /// Revokes a ticket and, transitively, every ticket it granted.
    ///
    /// Returns the number of entries removed. An unknown ID removes nothing
    /// and returns `0`. Children whose entries cannot be decoded are still
    /// removed, but their own children cannot be discovered.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. Entries removed before the
    /// failure stay removed.
    #[tracing::instrument(skip_all, fields(ticket_id = %id))]
    pub async fn delete_ticket(&self, id: &TicketId) -> StorageResult<usize> {
        let mut removed = 0;
        let mut visited = HashSet::new();
        // `true` marks a ticket whose children are already on the stack.
        let mut stack = vec![(id.clone(), false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if absent_if_unstorable(self.backend.delete(&id.to_key()).await, false)? {
                    removed += 1;
                }
                continue;
            }
            if !visited.insert(id.clone()) {
                continue;
            }

            let children = match self.read_ticket(&id).await? {
                Some(ticket) => ticket.child_ids(),
                None => Vec::new(),
            };
            stack.push((id, true));
            stack.extend(
                children.into_iter().filter(|child| !visited.contains(child)).map(|c| (c, false)),
            );
        }

        tracing::debug!(removed, "Revoked ticket");
        Ok(removed)
    }

    /// Grants a service ticket from the TGT or PGT stored under `granting_id`.
    ///
    /// Stores the new ticket and the updated granting ticket.
    ///
    /// # Errors
    ///
    /// - [`TicketError::InvalidTicket`] if the granting ticket is missing or expired
    /// - [`TicketError::Storage`] if the backend fails
    #[tracing::instrument(skip_all, fields(ticket_id = %id, granting_ticket_id = %granting_id))]
    pub async fn grant_service_ticket(
        &self,
        granting_id: &TicketId,
        id: TicketId,
        service: Service,
        expiration_policy: Expiration,
        credentials_provided: bool,
        proxy_allowed: bool,
    ) -> TicketResult<ServiceTicket> {
        let now = Utc::now();
        let Some(mut granting) = self.fetch_live::<TicketGrantingTicket>(granting_id, now).await?
        else {
            return Err(TicketError::invalid(granting_id, "granting ticket not found"));
        };

        let ticket = granting.grant_service_ticket(
            id,
            service,
            expiration_policy,
            credentials_provided,
            proxy_allowed,
            now,
        )?;
        self.add_ticket(&ticket).await?;
        self.update_ticket(&granting).await?;
        Ok(ticket)
    }

    /// Grants a proxy-granting ticket from the service ticket stored under
    /// `service_ticket_id`.
    ///
    /// Stores the new PGT, the granting ticket that now lists it, and the
    /// service ticket that is now spent for proxying.
    ///
    /// # Errors
    ///
    /// - [`TicketError::UnauthorizedProxying`] if the service ticket was granted without proxy
    ///   authorization
    /// - [`TicketError::InvalidTicket`] if either ticket is missing or expired, or a PGT was
    ///   already granted from the service ticket
    /// - [`TicketError::Storage`] if the backend fails
    #[tracing::instrument(
        skip_all,
        fields(ticket_id = %id, service_ticket_id = %service_ticket_id)
    )]
    pub async fn grant_proxy_granting_ticket(
        &self,
        service_ticket_id: &TicketId,
        id: TicketId,
        authentication: Authentication,
        expiration_policy: Expiration,
    ) -> TicketResult<ProxyGrantingTicket> {
        let now = Utc::now();
        let Some(mut service_ticket) =
            self.fetch_live::<ServiceTicket>(service_ticket_id, now).await?
        else {
            return Err(TicketError::invalid(service_ticket_id, "service ticket not found"));
        };
        let granting_id = service_ticket.granting_ticket_id().clone();
        let Some(mut granting) = self.fetch_live::<TicketGrantingTicket>(&granting_id, now).await?
        else {
            return Err(TicketError::invalid(&granting_id, "granting ticket not found"));
        };

        let ticket = service_ticket.grant_proxy_granting_ticket(
            id,
            authentication,
            expiration_policy,
            &mut granting,
            now,
        )?;
        self.add_ticket(&ticket).await?;
        self.update_ticket(&granting).await?;
        self.update_ticket(&service_ticket).await?;
        Ok(ticket)
    }

    /// Resolves the session root of a live ticket.
    ///
    /// Returns `None` if the ticket is missing or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    #[tracing::instrument(skip_all, fields(ticket_id = %id))]
    pub async fn root_ticket(&self, id: &TicketId) -> StorageResult<Option<TicketGrantingTicket>> {
        let Some(mut ticket) = self.fetch_live::<Ticket>(id, Utc::now()).await? else {
            return Ok(None);
        };

        let mut visited = HashSet::new();
        loop {
            if !visited.insert(ticket.id().clone()) {
                tracing::warn!("Granting chain loops back on itself");
                return Ok(None);
            }
            let Some(parent_id) = ticket.granting_ticket_id().cloned() else {
                return Ok(TicketGrantingTicket::from_ticket(ticket));
            };
            match self.read_ticket(&parent_id).await? {
                Some(parent) => ticket = parent,
                None => return Ok(None),
            }
        }
    }

    /// Whether `ticket` or anything up its granting chain is expired or
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    #[tracing::instrument(skip_all, fields(ticket_id = %ticket.as_ticket().id()))]
    pub async fn is_expired<T: AsTicket + ?Sized>(&self, ticket: &T) -> StorageResult<bool> {
        self.is_expired_at(ticket.as_ticket(), Utc::now()).await
    }

    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it is unhealthy.
    #[tracing::instrument(skip_all)]
    pub async fn health_check(&self) -> StorageResult<()> {
        self.backend.health_check().await
    }

    /// Reads, expiry-checks and narrows a ticket without recording a use.
    async fn fetch_live<T: TicketKind>(
        &self,
        id: &TicketId,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<T>> {
        let Some(ticket) = self.read_ticket(id).await? else {
            return Ok(None);
        };

        if self.is_expired_at(ticket.as_ticket(), now).await? {
            let removed = self.delete_ticket(id).await?;
            tracing::debug!(removed, "Removed expired ticket on read");
            return Ok(None);
        }

        let narrowed = T::from_ticket(ticket);
        if narrowed.is_none() {
            tracing::debug!(
                expected = std::any::type_name::<T>(),
                "Ticket is not of the requested kind"
            );
        }
        Ok(narrowed)
    }

    /// Reads and decodes a ticket with no expiration check.
    ///
    /// Entries that fail to decode read as absent.
    async fn read_ticket(&self, id: &TicketId) -> StorageResult<Option<Ticket>> {
        let Some(bytes) = absent_if_unstorable(self.backend.get(&id.to_key()).await, None)? else {
            return Ok(None);
        };

        match serde_json::from_slice::<Ticket>(&bytes) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(e) => {
                tracing::warn!(ticket_id = %id, error = %e, "Failed to decode stored ticket");
                Ok(None)
            },
        }
    }

    async fn is_expired_at(
        &self,
        ticket: TicketRef<'_>,
        now: DateTime<Utc>,
    ) -> StorageResult<bool> {
        if ticket.is_expired(now) {
            return Ok(true);
        }

        let mut visited = HashSet::from([ticket.id().clone()]);
        let mut parent_id = ticket.granting_ticket_id().cloned();
        while let Some(id) = parent_id {
            if !visited.insert(id.clone()) {
                tracing::warn!(ticket_id = %id, "Granting chain loops back on itself");
                return Ok(true);
            }
            let Some(parent) = self.read_ticket(&id).await? else {
                return Ok(true);
            };
            if parent.is_expired(now) {
                return Ok(true);
            }
            parent_id = parent.granting_ticket_id().cloned();
        }
        Ok(false)
    }

    fn cache_ttl(&self, ticket: TicketRef<'_>) -> Option<std::time::Duration> {
        self.config.cache_ttl(ticket.state().expiration_policy().time_to_live())
    }
}

/// Maps a rejected key length to `absent`.
///
/// `add_ticket` refuses keys the backend cannot hold, so an ID over the key
/// limit names no stored ticket. Reads and deletes of such IDs, typically
/// junk from a protocol parameter, behave like any other unknown ID.
fn absent_if_unstorable<T>(result: StorageResult<T>, absent: T) -> StorageResult<T> {
    match result {
        Err(StorageError::SizeLimitExceeded { kind: "key", actual, limit }) => {
            tracing::debug!(actual, limit, "Ticket ID exceeds the cache key limit");
            Ok(absent)
        },
        other => other,
    }
}

fn encode(ticket: TicketRef<'_>) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(&ticket).map_err(|e| {
        StorageError::serialization_with_source(
            format!("failed to encode ticket {}", ticket.id()),
            e,
        )
    })
}
