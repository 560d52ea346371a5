// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{marker::PhantomData, time::Duration};

use edgesync_tier::{CacheTier, TtlPolicy};
use tick::Clock;

use crate::{
    cache::CacheLayer,
    constants::{DEFAULT_CACHE_NAME, DEFAULT_REVALIDATION_TIMEOUT},
    telemetry::CacheTelemetry,
};

/// Configures and builds a [`CacheLayer`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use edgesync::cache::CacheLayer;
/// use edgesync_memory::InMemoryTier;
/// use edgesync_tier::TtlPolicy;
/// use tick::Clock;
///
/// let layer = CacheLayer::<String, _>::builder(InMemoryTier::new(), &Clock::new_frozen())
///     .ttl(TtlPolicy::new(Duration::from_secs(1), Duration::from_secs(30))?)
///     .name("pages")
///     .build();
///
/// assert_eq!(layer.name(), "pages");
/// # Ok::<(), edgesync_tier::InvalidTtlPolicy>(())
/// ```
#[derive(Debug)]
pub struct CacheLayerBuilder<V, T> {
    pub(crate) tier: T,
    pub(crate) clock: Clock,
    pub(crate) policy: TtlPolicy,
    pub(crate) name: &'static str,
    pub(crate) telemetry: Option<CacheTelemetry>,
    pub(crate) revalidation_timeout: Option<Duration>,
    _value: PhantomData<fn() -> V>,
}

impl<V, T> CacheLayerBuilder<V, T> {
    pub(crate) fn new(tier: T, clock: &Clock) -> Self {
        Self {
            tier,
            clock: clock.clone(),
            policy: TtlPolicy::default(),
            name: DEFAULT_CACHE_NAME,
            telemetry: None,
            revalidation_timeout: Some(DEFAULT_REVALIDATION_TIMEOUT),
            _value: PhantomData,
        }
    }

    /// Sets the freshness windows of new entries.
    #[must_use]
    pub fn ttl(mut self, policy: TtlPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the name reported in telemetry.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Records cache operations with `telemetry`.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Bounds how long one background revalidation may take, or removes the bound with `None`.
    #[must_use]
    pub fn revalidation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.revalidation_timeout = timeout;
        self
    }

    /// Replaces the storage tier.
    #[must_use]
    pub fn tier<U>(self, tier: U) -> CacheLayerBuilder<V, U> {
        CacheLayerBuilder {
            tier,
            clock: self.clock,
            policy: self.policy,
            name: self.name,
            telemetry: self.telemetry,
            revalidation_timeout: self.revalidation_timeout,
            _value: PhantomData,
        }
    }

    /// Builds the layer.
    #[must_use]
    pub fn build(self) -> CacheLayer<V, T>
    where
        T: CacheTier<V>,
    {
        CacheLayer::from_builder(self)
    }
}
