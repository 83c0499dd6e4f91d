//! Configuration for [`TicketRegistry`](crate::TicketRegistry).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ticketry_storage::ConfigError;

/// Default extra lifetime granted to cache entries beyond the policy TTL.
pub const DEFAULT_TTL_SLACK: Duration = Duration::ZERO;

/// Default and smallest allowed cache TTL for expiring tickets.
///
/// Cache wire protocols count TTLs in whole seconds, and a TTL of zero
/// commonly means "never expire".
pub const DEFAULT_MIN_TTL: Duration = Duration::from_secs(1);

/// Whether reads persist the usage they record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageTracking {
    /// Usage is recorded on the returned copy only.
    ///
    /// Idle-based and use-count policies then only see uses that callers
    /// write back through `update_ticket`.
    #[default]
    Transient,
    /// Every successful read writes the updated usage back to the cache.
    Durable,
}

/// Registry settings.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use ticketry_registry::{RegistryConfig, UsageTracking};
///
/// let config = RegistryConfig::builder()
///     .ttl_slack(Duration::from_secs(5))
///     .usage_tracking(UsageTracking::Durable)
///     .build()?;
/// assert_eq!(config.min_ttl(), Duration::from_secs(1));
///
/// let config: RegistryConfig = serde_json::from_str(r#"{"ttl_slack":"30s"}"#)?;
/// assert_eq!(config.ttl_slack(), Duration::from_secs(30));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Added to every policy TTL when storing a ticket.
    #[serde(with = "humantime_serde", default = "default_ttl_slack")]
    pub(crate) ttl_slack: Duration,

    /// Floor for the cache TTL of expiring tickets.
    #[serde(with = "humantime_serde", default = "default_min_ttl")]
    pub(crate) min_ttl: Duration,

    /// Whether reads persist recorded usage.
    #[serde(default)]
    pub(crate) usage_tracking: UsageTracking,
}

fn default_ttl_slack() -> Duration {
    DEFAULT_TTL_SLACK
}

fn default_min_ttl() -> Duration {
    DEFAULT_MIN_TTL
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_slack: DEFAULT_TTL_SLACK,
            min_ttl: DEFAULT_MIN_TTL,
            usage_tracking: UsageTracking::default(),
        }
    }
}

#[bon::bon]
impl RegistryConfig {
    /// Creates a validated configuration.
    ///
    /// # Optional Fields
    ///
    /// * `ttl_slack` - Extra cache lifetime per entry (default: 0s).
    /// * `min_ttl` - Smallest cache TTL for expiring tickets (default: 1s).
    /// * `usage_tracking` - Whether reads persist usage (default: transient).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `min_ttl` is under one second.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_TTL_SLACK)] ttl_slack: Duration,
        #[builder(default = DEFAULT_MIN_TTL)] min_ttl: Duration,
        #[builder(default)] usage_tracking: UsageTracking,
    ) -> Result<Self, ConfigError> {
        let config = Self { ttl_slack, min_ttl, usage_tracking };
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants, for configurations that were deserialized.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `min_ttl` is under one second.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_ttl < DEFAULT_MIN_TTL {
            return Err(ConfigError::BelowMinimum {
                field: "min_ttl",
                min: format!("{DEFAULT_MIN_TTL:?}"),
                value: format!("{:?}", self.min_ttl),
            });
        }
        Ok(())
    }

    /// Extra cache lifetime per entry.
    #[must_use]
    pub fn ttl_slack(&self) -> Duration {
        self.ttl_slack
    }

    /// Smallest cache TTL for expiring tickets.
    #[must_use]
    pub fn min_ttl(&self) -> Duration {
        self.min_ttl
    }

    /// Whether reads persist usage.
    #[must_use]
    pub fn usage_tracking(&self) -> UsageTracking {
        self.usage_tracking
    }

    /// Cache TTL for a ticket whose policy allows it to live for `policy_ttl`.
    ///
    /// `None` (never expires) stays `None`. Everything else gets the slack
    /// added and is raised to `min_ttl`, so even an always-expiring ticket is
    /// written with a positive TTL and removed on first read.
    #[must_use]
    pub fn cache_ttl(&self, policy_ttl: Option<Duration>) -> Option<Duration> {
        policy_ttl.map(|ttl| ttl.saturating_add(self.ttl_slack).max(self.min_ttl))
    }
}
