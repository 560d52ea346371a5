// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

use edgesync_tier::{CacheEntry, TtlPolicy, Validator};

/// Where a served value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// A fresh cache entry.
    Fresh,
    /// A stale cache entry; a background revalidation was scheduled.
    Stale,
    /// The durable store, read synchronously.
    Origin,
}

/// A value as returned to the caller, with everything the transport needs to build cache
/// headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Served<V> {
    value: V,
    validator: Validator,
    stale_after: SystemTime,
    expires_after: SystemTime,
    source: Source,
}

impl<V> Served<V> {
    pub(crate) fn from_entry(entry: CacheEntry<V>, source: Source) -> Self {
        let validator = entry.validator().clone();
        let stale_after = entry.stale_after();
        let expires_after = entry.expires_after();
        Self {
            value: entry.into_value(),
            validator,
            stale_after,
            expires_after,
            source,
        }
    }

    pub(crate) fn from_origin(value: V, validator: Validator, now: SystemTime, policy: &TtlPolicy) -> Self {
        Self {
            value,
            validator,
            stale_after: policy.stale_after(now),
            expires_after: policy.expires_after(now),
            source: Source::Origin,
        }
    }

    /// The served value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes `self` and returns the value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// The validator of the served value.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// When the value stops being fresh.
    #[must_use]
    pub fn stale_after(&self) -> SystemTime {
        self.stale_after
    }

    /// When the value must no longer be served.
    #[must_use]
    pub fn expires_after(&self) -> SystemTime {
        self.expires_after
    }

    /// Where the value came from.
    #[must_use]
    pub fn source(&self) -> Source {
        self.source
    }

    /// Transforms the value, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> Served<U> {
        Served {
            value: f(self.value),
            validator: self.validator,
            stale_after: self.stale_after,
            expires_after: self.expires_after,
            source: self.source,
        }
    }

    pub(crate) fn filter_map<U>(self, f: impl FnOnce(V) -> Option<U>) -> Option<Served<U>> {
        Some(Served {
            value: f(self.value)?,
            validator: self.validator,
            stale_after: self.stale_after,
            expires_after: self.expires_after,
            source: self.source,
        })
    }

    /// Cache directives for a response sent at `now`.
    #[must_use]
    pub fn directives(&self, now: SystemTime) -> CacheDirectives {
        let since = |t: SystemTime, from: SystemTime| t.duration_since(from).unwrap_or(Duration::ZERO);
        CacheDirectives {
            max_age: since(self.stale_after, now),
            stale_while_revalidate: since(self.expires_after, now.max(self.stale_after)),
        }
    }
}

/// Downstream caching windows, derived from a [`Served`] value.
///
/// Renders as `max-age=N, stale-while-revalidate=M` with whole seconds, rounded down.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use edgesync::CacheDirectives;
///
/// let directives = CacheDirectives {
///     max_age: Duration::from_secs(5),
///     stale_while_revalidate: Duration::from_millis(55_900),
/// };
/// assert_eq!(directives.to_string(), "max-age=5, stale-while-revalidate=55");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheDirectives {
    /// How long the value stays fresh.
    pub max_age: Duration,
    /// How long after that the value may still be served while it is revalidated.
    pub stale_while_revalidate: Duration,
}

impl fmt::Display for CacheDirectives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "max-age={}, stale-while-revalidate={}",
            self.max_age.as_secs(),
            self.stale_while_revalidate.as_secs()
        )
    }
}
