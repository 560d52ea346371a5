// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory tiers.
//!
//! The builder keeps moka's types out of the public API.

use std::marker::PhantomData;

use crate::tier::InMemoryTier;

/// Builder for an [`InMemoryTier`].
///
/// # Examples
///
/// ```
/// use edgesync_memory::InMemoryTier;
///
/// let tier = InMemoryTier::<String>::builder()
///     .max_capacity(10_000)
///     .initial_capacity(128)
///     .name("todos")
///     .build();
/// ```
#[derive(Debug)]
pub struct InMemoryTierBuilder<V> {
    pub(crate) max_capacity: Option<u64>,
    pub(crate) initial_capacity: Option<usize>,
    pub(crate) name: Option<String>,
    pub(crate) expire_entries: bool,
    _phantom: PhantomData<V>,
}

impl<V> Default for InMemoryTierBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InMemoryTierBuilder<V> {
    /// Creates a builder for an unbounded tier that expires entries at their hard TTL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_capacity: None,
            initial_capacity: None,
            name: None,
            expire_entries: true,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// When the tier is full, the least recently used entry is evicted to make room. Eviction is
    /// applied by background maintenance, so the tier may briefly hold more entries than this.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    /// Sets a pre-allocation hint.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Sets a name that appears in the underlying cache's debug output.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Controls whether entries are dropped automatically once their hard TTL elapses.
    ///
    /// Enabled by default. Automatic expiry runs on the wall clock; entries kept past it are
    /// still removed by [`CacheTier::evict_expired`](edgesync_tier::CacheTier::evict_expired).
    #[must_use]
    pub fn expire_entries(mut self, enabled: bool) -> Self {
        self.expire_entries = enabled;
        self
    }

    /// Builds the tier.
    #[must_use]
    pub fn build(self) -> InMemoryTier<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        InMemoryTier::from_builder(&self)
    }
}
