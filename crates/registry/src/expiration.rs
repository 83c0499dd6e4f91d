//! Ticket expiration policies.
//!
//! Expiration is evaluated lazily: nothing sweeps the registry, instead every
//! read asks the ticket's policy whether it is still usable. Each policy also
//! reports a time-to-live so the cache can drop the entry on its own once no
//! reader could accept it anymore.
//!
//! Policies are stateless values. Every ticket carries its own [`Expiration`],
//! which is a closed, serializable set of the policies below, each of which
//! implements [`ExpirationPolicy`].
//!
//! | Policy | Expired when | Cache TTL |
//! |--------|--------------|-----------|
//! | [`NeverExpires`] | never | none |
//! | [`AlwaysExpires`] | always | zero |
//! | [`HardTimeout`] | `now - created_at > time_to_kill` | `time_to_kill` |
//! | [`Timeout`] | `now - last_used_at > time_to_kill` | `time_to_kill` |
//! | [`TicketGrantingTicketPolicy`] | hard limit on age, idle limit on use | `max_time_to_live` |
//! | [`MultiTimeUseOrTimeout`] | use count reached or idle limit | `time_to_kill` |

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::TicketState;

/// Decides when a ticket becomes unusable.
pub trait ExpirationPolicy {
    /// Whether a ticket in `state` is expired at `now`.
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool;

    /// Upper bound on how long a ticket under this policy can stay valid,
    /// `None` if unbounded.
    fn time_to_live(&self) -> Option<Duration>;

    /// Maximum idle time between uses, `None` if idleness is not tracked.
    fn time_to_idle(&self) -> Option<Duration> {
        None
    }
}

/// Whether more than `limit` has elapsed between `since` and `now`.
///
/// A clock that moved backwards counts as no time elapsed.
fn elapsed_exceeds(since: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    (now - since).to_std().is_ok_and(|elapsed| elapsed > limit)
}

/// Policy for tickets that only leave the registry through revocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeverExpires;

impl ExpirationPolicy for NeverExpires {
    fn is_expired(&self, _state: &TicketState, _now: DateTime<Utc>) -> bool {
        false
    }

    fn time_to_live(&self) -> Option<Duration> {
        None
    }
}

/// Policy for tickets that are unusable from the moment they are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlwaysExpires;

impl ExpirationPolicy for AlwaysExpires {
    fn is_expired(&self, _state: &TicketState, _now: DateTime<Utc>) -> bool {
        true
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Expires a fixed time after creation, however the ticket is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardTimeout {
    /// Lifetime measured from creation.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,
}

impl ExpirationPolicy for HardTimeout {
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        elapsed_exceeds(state.created_at, now, self.time_to_kill)
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }
}

/// Expires once the ticket has been idle for longer than `time_to_kill`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeout {
    /// Idle time allowed since the last use.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,
}

impl ExpirationPolicy for Timeout {
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        elapsed_exceeds(state.last_used_at, now, self.time_to_kill)
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }

    fn time_to_idle(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }
}

/// Session policy: a hard cap on age plus an idle limit, whichever trips first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketGrantingTicketPolicy {
    /// Absolute lifetime measured from creation.
    #[serde(with = "humantime_serde")]
    pub max_time_to_live: Duration,
    /// Idle time allowed since the last use.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,
}

impl ExpirationPolicy for TicketGrantingTicketPolicy {
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        elapsed_exceeds(state.created_at, now, self.max_time_to_live)
            || elapsed_exceeds(state.last_used_at, now, self.time_to_kill)
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(self.max_time_to_live)
    }

    fn time_to_idle(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }
}

/// Expires after a number of uses or an idle period.
///
/// Service tickets are normally single use: `number_of_uses = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiTimeUseOrTimeout {
    /// Uses after which the ticket is spent.
    pub number_of_uses: u32,
    /// Idle time allowed since the last use.
    #[serde(with = "humantime_serde")]
    pub time_to_kill: Duration,
}

impl ExpirationPolicy for MultiTimeUseOrTimeout {
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        state.count_of_uses >= self.number_of_uses
            || elapsed_exceeds(state.last_used_at, now, self.time_to_kill)
    }

    fn time_to_live(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }

    fn time_to_idle(&self) -> Option<Duration> {
        Some(self.time_to_kill)
    }
}

/// The policy attached to a ticket.
///
/// Serialized with a `policy` tag, durations in humantime form:
///
/// ```
/// use std::time::Duration;
///
/// use ticketry_registry::expiration::{Expiration, MultiTimeUseOrTimeout};
///
/// let policy = Expiration::MultiTimeUseOrTimeout(MultiTimeUseOrTimeout {
///     number_of_uses: 1,
///     time_to_kill: Duration::from_secs(10),
/// });
/// let json = serde_json::to_string(&policy).unwrap();
/// assert_eq!(json, r#"{"policy":"multi_time_use_or_timeout","number_of_uses":1,"time_to_kill":"10s"}"#);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Expiration {
    /// See [`NeverExpires`].
    NeverExpires,
    /// See [`AlwaysExpires`].
    AlwaysExpires,
    /// See [`HardTimeout`].
    HardTimeout(HardTimeout),
    /// See [`Timeout`].
    Timeout(Timeout),
    /// See [`TicketGrantingTicketPolicy`].
    TicketGrantingTicket(TicketGrantingTicketPolicy),
    /// See [`MultiTimeUseOrTimeout`].
    MultiTimeUseOrTimeout(MultiTimeUseOrTimeout),
}

impl Expiration {
    /// Hard timeout after `time_to_kill`.
    #[must_use]
    pub fn hard_timeout(time_to_kill: Duration) -> Self {
        Self::HardTimeout(HardTimeout { time_to_kill })
    }

    /// Idle timeout after `time_to_kill`.
    #[must_use]
    pub fn timeout(time_to_kill: Duration) -> Self {
        Self::Timeout(Timeout { time_to_kill })
    }

    /// Session policy with both an absolute and an idle limit.
    #[must_use]
    pub fn ticket_granting_ticket(max_time_to_live: Duration, time_to_kill: Duration) -> Self {
        Self::TicketGrantingTicket(TicketGrantingTicketPolicy { max_time_to_live, time_to_kill })
    }

    /// Use-count or idle limit, whichever comes first.
    #[must_use]
    pub fn multi_time_use_or_timeout(number_of_uses: u32, time_to_kill: Duration) -> Self {
        Self::MultiTimeUseOrTimeout(MultiTimeUseOrTimeout { number_of_uses, time_to_kill })
    }

    fn as_policy(&self) -> &dyn ExpirationPolicy {
        match self {
            Self::NeverExpires => &NeverExpires,
            Self::AlwaysExpires => &AlwaysExpires,
            Self::HardTimeout(policy) => policy,
            Self::Timeout(policy) => policy,
            Self::TicketGrantingTicket(policy) => policy,
            Self::MultiTimeUseOrTimeout(policy) => policy,
        }
    }
}

impl Default for Expiration {
    fn default() -> Self {
        Self::NeverExpires
    }
}

impl ExpirationPolicy for Expiration {
    fn is_expired(&self, state: &TicketState, now: DateTime<Utc>) -> bool {
        self.as_policy().is_expired(state, now)
    }

    fn time_to_live(&self) -> Option<Duration> {
        self.as_policy().time_to_live()
    }

    fn time_to_idle(&self) -> Option<Duration> {
        self.as_policy().time_to_idle()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use rstest::rstest;

    use super::*;
    use crate::id::TicketId;

    fn state_at(created_at: DateTime<Utc>, policy: Expiration) -> TicketState {
        TicketState::new(TicketId::from("ST-1"), policy, created_at)
    }

    #[test]
    fn never_and_always() {
        let now = Utc::now();
        let state = state_at(now, Expiration::NeverExpires);
        assert!(!Expiration::NeverExpires.is_expired(&state, now + TimeDelta::days(3650)));
        assert!(Expiration::AlwaysExpires.is_expired(&state, now));
        assert_eq!(Expiration::NeverExpires.time_to_live(), None);
        assert_eq!(Expiration::AlwaysExpires.time_to_live(), Some(Duration::ZERO));
    }

    #[rstest]
    #[case::before_limit(9, false)]
    #[case::at_limit(10, false)]
    #[case::after_limit(11, true)]
    fn hard_timeout_counts_from_creation(#[case] elapsed_secs: i64, #[case] expired: bool) {
        let created = Utc::now();
        let policy = Expiration::hard_timeout(Duration::from_secs(10));
        let mut state = state_at(created, policy);
        // Use does not extend a hard timeout.
        state.record_use(created + TimeDelta::seconds(elapsed_secs));

        let now = created + TimeDelta::seconds(elapsed_secs);
        assert_eq!(policy.is_expired(&state, now), expired);
    }

    #[test]
    fn idle_timeout_is_extended_by_use() {
        let created = Utc::now();
        let policy = Expiration::timeout(Duration::from_secs(10));
        let mut state = state_at(created, policy);

        state.record_use(created + TimeDelta::seconds(8));
        assert!(!policy.is_expired(&state, created + TimeDelta::seconds(15)));
        assert!(policy.is_expired(&state, created + TimeDelta::seconds(19)));
        assert_eq!(policy.time_to_idle(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn session_policy_hard_cap_wins_over_activity() {
        let created = Utc::now();
        let policy =
            Expiration::ticket_granting_ticket(Duration::from_secs(60), Duration::from_secs(20));
        let mut state = state_at(created, policy);

        for secs in (10..=60).step_by(10) {
            state.record_use(created + TimeDelta::seconds(secs));
            assert!(!policy.is_expired(&state, created + TimeDelta::seconds(secs)));
        }
        assert!(policy.is_expired(&state, created + TimeDelta::seconds(61)));
        assert_eq!(policy.time_to_live(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn session_policy_idle_limit() {
        let created = Utc::now();
        let policy =
            Expiration::ticket_granting_ticket(Duration::from_secs(3600), Duration::from_secs(20));
        let state = state_at(created, policy);
        assert!(policy.is_expired(&state, created + TimeDelta::seconds(21)));
    }

    #[test]
    fn single_use_ticket_is_spent_after_one_use() {
        let created = Utc::now();
        let policy = Expiration::multi_time_use_or_timeout(1, Duration::from_secs(10));
        let mut state = state_at(created, policy);

        assert!(!policy.is_expired(&state, created));
        state.record_use(created);
        assert!(policy.is_expired(&state, created));
    }

    #[test]
    fn clock_skew_does_not_expire() {
        let created = Utc::now();
        let policy = Expiration::hard_timeout(Duration::from_secs(1));
        let state = state_at(created, policy);
        assert!(!policy.is_expired(&state, created - TimeDelta::seconds(30)));
    }

    #[rstest]
    #[case(Expiration::NeverExpires, r#"{"policy":"never_expires"}"#)]
    #[case(Expiration::AlwaysExpires, r#"{"policy":"always_expires"}"#)]
    #[case(Expiration::hard_timeout(Duration::from_secs(90)), r#"{"policy":"hard_timeout","time_to_kill":"1m 30s"}"#)]
    #[case(Expiration::timeout(Duration::from_secs(5)), r#"{"policy":"timeout","time_to_kill":"5s"}"#)]
    #[case(
        Expiration::ticket_granting_ticket(Duration::from_secs(28_800), Duration::from_secs(7200)),
        r#"{"policy":"ticket_granting_ticket","max_time_to_live":"8h","time_to_kill":"2h"}"#
    )]
    fn serialized_form(#[case] policy: Expiration, #[case] json: &str) {
        assert_eq!(serde_json::to_string(&policy).unwrap(), json);
        assert_eq!(serde_json::from_str::<Expiration>(json).unwrap(), policy);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        fn arb_policy() -> impl Strategy<Value = Expiration> {
            prop_oneof![
                Just(Expiration::NeverExpires),
                Just(Expiration::AlwaysExpires),
                (1u64..100_000).prop_map(|s| Expiration::hard_timeout(Duration::from_secs(s))),
                (1u64..100_000).prop_map(|s| Expiration::timeout(Duration::from_secs(s))),
                (1u64..100_000, 1u64..100_000).prop_map(|(ttl, ttk)| {
                    Expiration::ticket_granting_ticket(
                        Duration::from_secs(ttl),
                        Duration::from_secs(ttk),
                    )
                }),
                (1u32..10, 1u64..100_000).prop_map(|(uses, s)| {
                    Expiration::multi_time_use_or_timeout(uses, Duration::from_secs(s))
                }),
            ]
        }

        proptest! {
            /// Once expired, a ticket stays expired as time moves on without use.
            #[test]
            fn expiration_is_monotonic_in_time(
                policy in arb_policy(),
                first in 0i64..200_000,
                later in 0i64..200_000,
            ) {
                let created = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000);
                let state = state_at(created, policy);
                let t1 = created + TimeDelta::seconds(first);
                let t2 = t1 + TimeDelta::seconds(later);
                if policy.is_expired(&state, t1) {
                    prop_assert!(policy.is_expired(&state, t2));
                }
            }

            /// No bounded policy keeps a ticket alive past its time-to-live
            /// when the ticket is never used.
            #[test]
            fn unused_ticket_is_expired_after_time_to_live(policy in arb_policy(), extra in 1i64..1000) {
                let created = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::days(20_000);
                let state = state_at(created, policy);
                if let Some(ttl) = policy.time_to_live() {
                    let ttl = i64::try_from(ttl.as_secs()).unwrap();
                    prop_assert!(policy.is_expired(&state, created + TimeDelta::seconds(ttl + extra)));
                }
            }

            #[test]
            fn serde_preserves_policy(policy in arb_policy()) {
                let json = serde_json::to_string(&policy).unwrap();
                prop_assert_eq!(serde_json::from_str::<Expiration>(&json).unwrap(), policy);
            }
        }
    }
}
