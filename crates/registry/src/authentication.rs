//! Authenticated principals and the services tickets are granted for.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Multi-valued attribute map.
pub type Attributes = BTreeMap<String, Vec<String>>;

/// The user a session belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Principal {
    /// Principal identifier, usually the username.
    #[builder(into)]
    pub id: String,
    /// Attributes resolved for the principal.
    #[builder(default)]
    #[serde(default)]
    pub attributes: Attributes,
}

/// Result of a completed login, carried by every ticket-granting ticket.
///
/// ```
/// use chrono::Utc;
/// use ticketry_registry::{Authentication, Principal};
///
/// let authentication = Authentication::builder()
///     .principal(Principal::builder().id("casuser").build())
///     .authenticated_at(Utc::now())
///     .successes(vec!["password".to_owned()])
///     .build();
/// assert_eq!(authentication.principal.id, "casuser");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bon::Builder)]
pub struct Authentication {
    /// The authenticated principal.
    pub principal: Principal,
    /// When authentication completed.
    pub authenticated_at: DateTime<Utc>,
    /// Metadata about the authentication event itself.
    #[builder(default)]
    #[serde(default)]
    pub attributes: Attributes,
    /// Names of the handlers that authenticated the credentials.
    #[builder(default)]
    #[serde(default)]
    pub successes: Vec<String>,
}

/// A relying party that tickets are issued for.
///
/// Services compare by identifier only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Service {
    /// Service identifier, usually its URL.
    pub id: String,
}

impl Service {
    /// Creates a service from its identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// Whether `other` identifies the same service.
    #[must_use]
    pub fn matches(&self, other: &Service) -> bool {
        self.id == other.id
    }
}
