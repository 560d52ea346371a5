// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

/// Default soft TTL: entries are served without revalidation for 5 seconds.
pub const DEFAULT_SOFT_TTL: Duration = Duration::from_secs(5);

/// Default hard TTL: entries stop being served after 60 seconds.
pub const DEFAULT_HARD_TTL: Duration = Duration::from_secs(60);

/// Longest TTL a policy keeps; longer windows are shortened to this.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Returned when a soft TTL exceeds its hard TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("soft TTL ({soft:?}) must not exceed hard TTL ({hard:?})")]
pub struct InvalidTtlPolicy {
    /// The requested soft TTL.
    pub soft: Duration,
    /// The requested hard TTL.
    pub hard: Duration,
}

/// The freshness windows applied to cache entries.
///
/// The soft TTL bounds how long an entry is fresh. The hard TTL bounds how long it may be served
/// at all; between the two the entry is served stale while a revalidation runs. A policy always
/// satisfies `soft_ttl <= hard_ttl <= MAX_TTL`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use edgesync_tier::TtlPolicy;
///
/// let policy = TtlPolicy::new(Duration::from_secs(30), Duration::from_secs(300))?;
/// assert_eq!(policy.soft_ttl(), Duration::from_secs(30));
///
/// assert!(TtlPolicy::new(Duration::from_secs(10), Duration::from_secs(1)).is_err());
/// # Ok::<(), edgesync_tier::InvalidTtlPolicy>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "TtlPolicyRepr", into = "TtlPolicyRepr")
)]
pub struct TtlPolicy {
    soft_ttl: Duration,
    hard_ttl: Duration,
}

impl TtlPolicy {
    /// Creates a policy, rejecting a soft TTL longer than the hard TTL.
    ///
    /// Windows longer than [`MAX_TTL`] are shortened to it.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTtlPolicy`] if `soft_ttl > hard_ttl`.
    pub fn new(soft_ttl: Duration, hard_ttl: Duration) -> Result<Self, InvalidTtlPolicy> {
        if soft_ttl > hard_ttl {
            return Err(InvalidTtlPolicy {
                soft: soft_ttl,
                hard: hard_ttl,
            });
        }

        Ok(Self {
            soft_ttl: soft_ttl.min(MAX_TTL),
            hard_ttl: hard_ttl.min(MAX_TTL),
        })
    }

    /// How long an entry stays fresh.
    #[must_use]
    pub fn soft_ttl(&self) -> Duration {
        self.soft_ttl
    }

    /// How long an entry may be served at all.
    #[must_use]
    pub fn hard_ttl(&self) -> Duration {
        self.hard_ttl
    }

    /// The instant after which an entry inserted at `now` is stale.
    #[must_use]
    pub fn stale_after(&self, now: SystemTime) -> SystemTime {
        saturating_add(now, self.soft_ttl)
    }

    /// The instant after which an entry inserted at `now` is expired. Never before
    /// [`stale_after`](Self::stale_after).
    #[must_use]
    pub fn expires_after(&self, now: SystemTime) -> SystemTime {
        saturating_add(now, self.hard_ttl).max(self.stale_after(now))
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            soft_ttl: DEFAULT_SOFT_TTL,
            hard_ttl: DEFAULT_HARD_TTL,
        }
    }
}

fn saturating_add(time: SystemTime, duration: Duration) -> SystemTime {
    time.checked_add(duration).unwrap_or(time)
}

#[cfg(feature = "serde")]
#[derive(Clone, Copy, serde::Serialize, serde::Deserialize)]
struct TtlPolicyRepr {
    soft_ttl: Duration,
    hard_ttl: Duration,
}

#[cfg(feature = "serde")]
impl TryFrom<TtlPolicyRepr> for TtlPolicy {
    type Error = InvalidTtlPolicy;

    fn try_from(repr: TtlPolicyRepr) -> Result<Self, Self::Error> {
        Self::new(repr.soft_ttl, repr.hard_ttl)
    }
}

#[cfg(feature = "serde")]
impl From<TtlPolicy> for TtlPolicyRepr {
    fn from(policy: TtlPolicy) -> Self {
        Self {
            soft_ttl: policy.soft_ttl,
            hard_ttl: policy.hard_ttl,
        }
    }
}
