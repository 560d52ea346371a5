// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{sync::Arc, time::Duration};

use edgesync_memory::InMemoryTier;
use edgesync_tier::{CacheTier, TtlPolicy};
use tick::Clock;

use crate::{
    EdgeSync,
    cache::{CacheLayer, CacheLayerBuilder},
    constants::{DEFAULT_CAPACITY, DEFAULT_READ_RETRY_BACKOFF, DEFAULT_REQUIRE_PRECONDITION},
    coordinator::MutationCoordinator,
    options::EdgeSyncOptions,
    resource::Resource,
    retry::ReadRetry,
    store::DurableStore,
    telemetry::CacheTelemetry,
};

/// Configures and builds an [`EdgeSync`].
///
/// Starts with an in-memory tier holding up to 10,000 entries, a 5 second soft TTL and a
/// 60 second hard TTL.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use edgesync::{EdgeSync, store::InMemoryStore};
/// use edgesync_tier::TtlPolicy;
/// use tick::Clock;
///
/// let clock = Clock::new_frozen();
/// let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock)
///     .ttl(TtlPolicy::new(Duration::from_secs(2), Duration::from_secs(20))?)
///     .capacity(1_000)
///     .require_precondition(false)
///     .build();
///
/// assert_eq!(sync.cache().policy().soft_ttl(), Duration::from_secs(2));
/// # Ok::<(), edgesync_tier::InvalidTtlPolicy>(())
/// ```
#[derive(Debug)]
pub struct EdgeSyncBuilder<S, T> {
    store: S,
    cache: CacheLayerBuilder<Resource, T>,
    read_retry_backoff: Duration,
    require_precondition: bool,
}

impl<S> EdgeSyncBuilder<S, InMemoryTier<Resource>> {
    pub(crate) fn new(store: S, clock: &Clock) -> Self {
        Self {
            store,
            cache: CacheLayer::builder(InMemoryTier::with_capacity(DEFAULT_CAPACITY), clock),
            read_retry_backoff: DEFAULT_READ_RETRY_BACKOFF,
            require_precondition: DEFAULT_REQUIRE_PRECONDITION,
        }
    }

    /// Replaces the in-memory tier with one holding at most `capacity` entries.
    #[must_use]
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.cache = self.cache.tier(InMemoryTier::with_capacity(capacity));
        self
    }

    /// Applies every setting in `options`.
    #[must_use]
    pub fn options(self, options: EdgeSyncOptions) -> Self {
        self.capacity(options.capacity)
            .ttl(options.ttl)
            .read_retry_backoff(options.read_retry_backoff)
            .revalidation_timeout(options.revalidation_timeout)
            .require_precondition(options.require_precondition)
    }
}

impl<S, T> EdgeSyncBuilder<S, T> {
    /// Sets the freshness windows of cached records and listings.
    #[must_use]
    pub fn ttl(mut self, policy: TtlPolicy) -> Self {
        self.cache = self.cache.ttl(policy);
        self
    }

    /// Sets the cache name used in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.cache = self.cache.name(name);
        self
    }

    /// Sets the delay before a read that found the store unavailable is retried.
    #[must_use]
    pub fn read_retry_backoff(mut self, backoff: Duration) -> Self {
        self.read_retry_backoff = backoff;
        self
    }

    /// Bounds each background revalidation; `None` lets it run as long as the store takes.
    #[must_use]
    pub fn revalidation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.cache = self.cache.revalidation_timeout(timeout);
        self
    }

    /// Whether updates and deletes must carry an `If-Match` validator. Defaults to `true`.
    #[must_use]
    pub fn require_precondition(mut self, required: bool) -> Self {
        self.require_precondition = required;
        self
    }

    /// Enables cache telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.cache = self.cache.telemetry(telemetry);
        self
    }

    /// Uses `tier` for cached entries instead of the in-memory tier.
    #[must_use]
    pub fn tier<U>(self, tier: U) -> EdgeSyncBuilder<S, U> {
        EdgeSyncBuilder {
            store: self.store,
            cache: self.cache.tier(tier),
            read_retry_backoff: self.read_retry_backoff,
            require_precondition: self.require_precondition,
        }
    }

    /// Builds the configured [`EdgeSync`].
    #[must_use]
    pub fn build(self) -> EdgeSync<S, T>
    where
        S: DurableStore,
        T: CacheTier<Resource>,
    {
        let retry = ReadRetry::new(self.read_retry_backoff, &self.cache.clock);
        let cache = self.cache.build();
        let store = Arc::new(self.store);
        let coordinator = MutationCoordinator::new(Arc::clone(&store), cache.clone(), self.require_precondition);

        EdgeSync::from_parts(store, cache, coordinator, retry)
    }
}

#[cfg(test)]
mod tests {
    use edgesync_tier::testing::MockTier;

    use super::*;
    use crate::store::InMemoryStore;

    #[test]
    fn options_are_applied() {
        let clock = Clock::new_frozen();
        let options = EdgeSyncOptions {
            ttl: TtlPolicy::new(Duration::from_secs(1), Duration::from_secs(9)).expect("valid policy"),
            read_retry_backoff: Duration::ZERO,
            ..EdgeSyncOptions::default()
        };

        let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock).options(options).build();

        assert_eq!(sync.cache().policy().soft_ttl(), Duration::from_secs(1));
        assert_eq!(sync.cache().policy().hard_ttl(), Duration::from_secs(9));
    }

    #[test]
    fn tier_can_be_replaced() {
        let clock = Clock::new_frozen();
        let tier = MockTier::<Resource>::new();

        let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock)
            .name("todos")
            .tier(tier.clone())
            .build();

        assert_eq!(sync.cache().name(), "todos");
        assert!(tier.operations().is_empty());
    }
}
