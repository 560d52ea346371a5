// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    ops::Deref,
    time::{Duration, SystemTime},
};

use crate::{TtlPolicy, Validator};

/// How usable a cache entry is at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// `now < stale_after`: serve directly.
    Fresh,
    /// `stale_after <= now < expires_after`: serve, then revalidate in the background.
    Stale,
    /// `now >= expires_after`: must not be served.
    Expired,
}

/// A cached value with its validator and freshness timestamps.
///
/// Entries are created from a [`TtlPolicy`] at insertion time, so `stale_after <= expires_after`
/// always holds.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use edgesync_tier::{CacheEntry, TtlPolicy, Validator};
///
/// let now = SystemTime::UNIX_EPOCH;
/// let entry = CacheEntry::new(42, Validator::new("r1"), now, &TtlPolicy::default());
///
/// assert_eq!(*entry, 42);
/// assert_eq!(entry.stale_after(), now + Duration::from_secs(5));
/// assert_eq!(entry.expires_after(), now + Duration::from_secs(60));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    validator: Validator,
    inserted_at: SystemTime,
    stale_after: SystemTime,
    expires_after: SystemTime,
}

impl<V> CacheEntry<V> {
    /// Creates an entry inserted at `now` with windows taken from `policy`.
    pub fn new(value: V, validator: Validator, now: SystemTime, policy: &TtlPolicy) -> Self {
        Self {
            value,
            validator,
            inserted_at: now,
            stale_after: policy.stale_after(now),
            expires_after: policy.expires_after(now),
        }
    }

    /// Recreates an entry from explicit timestamps.
    ///
    /// `stale_after` is clamped to `expires_after`, and both are clamped to be no earlier than
    /// `inserted_at`.
    pub fn from_parts(
        value: V,
        validator: Validator,
        inserted_at: SystemTime,
        stale_after: SystemTime,
        expires_after: SystemTime,
    ) -> Self {
        let expires_after = expires_after.max(inserted_at);
        Self {
            value,
            validator,
            inserted_at,
            stale_after: stale_after.clamp(inserted_at, expires_after),
            expires_after,
        }
    }

    /// Returns the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the cached value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the validator the value was served with.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// When the entry was written.
    #[must_use]
    pub fn inserted_at(&self) -> SystemTime {
        self.inserted_at
    }

    /// When the entry stops being fresh.
    #[must_use]
    pub fn stale_after(&self) -> SystemTime {
        self.stale_after
    }

    /// When the entry stops being servable.
    #[must_use]
    pub fn expires_after(&self) -> SystemTime {
        self.expires_after
    }

    /// The total lifetime of the entry, from insertion to expiry.
    #[must_use]
    pub fn hard_ttl(&self) -> Duration {
        self.expires_after
            .duration_since(self.inserted_at)
            .unwrap_or(Duration::ZERO)
    }

    /// Classifies the entry at `now`.
    #[must_use]
    pub fn freshness(&self, now: SystemTime) -> Freshness {
        if now < self.stale_after {
            Freshness::Fresh
        } else if now < self.expires_after {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Returns `true` if the entry must no longer be served at `now`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.freshness(now) == Freshness::Expired
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// The result of looking a key up in the cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<V> {
    /// The entry is fresh and can be served as-is.
    Fresh(CacheEntry<V>),
    /// The entry is stale but still servable; a revalidation should be scheduled.
    Stale(CacheEntry<V>),
    /// There is no servable entry. Expired entries are reported as misses.
    Miss,
}

impl<V> Lookup<V> {
    /// Classifies an optional entry at `now`.
    #[must_use]
    pub fn classify(entry: Option<CacheEntry<V>>, now: SystemTime) -> Self {
        match entry {
            Some(entry) => match entry.freshness(now) {
                Freshness::Fresh => Self::Fresh(entry),
                Freshness::Stale => Self::Stale(entry),
                Freshness::Expired => Self::Miss,
            },
            None => Self::Miss,
        }
    }

    /// Returns `true` for [`Lookup::Miss`].
    #[must_use]
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns the servable entry, if any.
    #[must_use]
    pub fn into_entry(self) -> Option<CacheEntry<V>> {
        match self {
            Self::Fresh(entry) | Self::Stale(entry) => Some(entry),
            Self::Miss => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn policy(soft: u64, hard: u64) -> TtlPolicy {
        TtlPolicy::new(Duration::from_secs(soft), Duration::from_secs(hard)).expect("valid policy")
    }

    #[test]
    fn freshness_boundaries_are_half_open() {
        let entry = CacheEntry::new("v", Validator::new("r1"), at(0), &policy(5, 60));

        assert_eq!(entry.freshness(at(0)), Freshness::Fresh);
        assert_eq!(entry.freshness(at(4)), Freshness::Fresh);
        assert_eq!(entry.freshness(at(5)), Freshness::Stale);
        assert_eq!(entry.freshness(at(59)), Freshness::Stale);
        assert_eq!(entry.freshness(at(60)), Freshness::Expired);
        assert!(entry.is_expired(at(65)));
    }

    #[test]
    fn zero_soft_ttl_is_immediately_stale() {
        let entry = CacheEntry::new(1, Validator::new("r1"), at(10), &policy(0, 30));
        assert_eq!(entry.freshness(at(10)), Freshness::Stale);
    }

    #[test]
    fn from_parts_clamps_stale_after() {
        let entry = CacheEntry::from_parts(1, Validator::new("r1"), at(10), at(100), at(20));

        assert_eq!(entry.stale_after(), at(20));
        assert_eq!(entry.expires_after(), at(20));
        assert_eq!(entry.hard_ttl(), Duration::from_secs(10));
    }

    #[test]
    fn from_parts_never_precedes_insertion() {
        let entry = CacheEntry::from_parts(1, Validator::new("r1"), at(10), at(1), at(2));

        assert_eq!(entry.stale_after(), at(10));
        assert_eq!(entry.expires_after(), at(10));
        assert_eq!(entry.hard_ttl(), Duration::ZERO);
    }

    #[test]
    fn classify_reports_expired_as_miss() {
        let entry = CacheEntry::new(7, Validator::new("r1"), at(0), &policy(5, 60));

        assert!(matches!(Lookup::classify(Some(entry.clone()), at(1)), Lookup::Fresh(_)));
        assert!(matches!(Lookup::classify(Some(entry.clone()), at(6)), Lookup::Stale(_)));
        assert!(Lookup::classify(Some(entry), at(65)).is_miss());
        assert!(Lookup::<i32>::classify(None, at(0)).is_miss());
    }

    #[test]
    fn into_entry_returns_servable_entries() {
        let entry = CacheEntry::new(7, Validator::new("r1"), at(0), &policy(5, 60));

        assert_eq!(Lookup::Stale(entry.clone()).into_entry(), Some(entry));
        assert_eq!(Lookup::<i32>::Miss.into_entry(), None);
    }
}
