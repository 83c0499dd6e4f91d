//! Ticket error types.
//!
//! Hierarchy operations (granting service tickets and proxy-granting tickets)
//! reject expired or mismatched tickets with [`TicketError::InvalidTicket`]
//! and refuse proxying without authorization with
//! [`TicketError::UnauthorizedProxying`]. Backend failures pass through
//! unchanged as [`TicketError::Storage`].

use thiserror::Error;
use ticketry_storage::StorageError;

use crate::id::TicketId;

/// Result type alias for ticket operations.
pub type TicketResult<T> = Result<T, TicketError>;

/// Errors raised by ticket hierarchy and registry operations.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TicketError {
    /// The ticket cannot be used for the requested operation.
    #[error("Invalid ticket {id}: {reason}")]
    InvalidTicket {
        /// The offending ticket.
        id: TicketId,
        /// Why the ticket was rejected.
        reason: String,
    },

    /// A proxy-granting ticket was requested from a service ticket that was
    /// not issued with proxy authorization.
    #[error("Service ticket {id} does not allow proxying")]
    UnauthorizedProxying {
        /// The service ticket the proxy was requested from.
        id: TicketId,
    },

    /// The cache backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TicketError {
    /// Creates an `InvalidTicket` error.
    #[must_use]
    pub fn invalid(id: &TicketId, reason: impl Into<String>) -> Self {
        Self::InvalidTicket { id: id.clone(), reason: reason.into() }
    }

    /// Creates an `UnauthorizedProxying` error.
    #[must_use]
    pub fn unauthorized_proxying(id: &TicketId) -> Self {
        Self::UnauthorizedProxying { id: id.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let id = TicketId::from("ST-1-abc");
        assert_eq!(
            TicketError::invalid(&id, "expired").to_string(),
            "Invalid ticket ST-1-abc: expired"
        );
        assert_eq!(
            TicketError::unauthorized_proxying(&id).to_string(),
            "Service ticket ST-1-abc does not allow proxying"
        );
    }

    #[test]
    fn storage_errors_convert_transparently() {
        let err: TicketError = StorageError::timeout().into();
        assert!(matches!(err, TicketError::Storage(StorageError::Timeout)));
        assert_eq!(err.to_string(), "Operation timeout");
    }
}
