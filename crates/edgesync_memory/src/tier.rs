// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory cache tier implementation using moka.

use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use edgesync_tier::{CacheEntry, CacheKey, CacheTier, Error};
use moka::{Expiry, future::Cache, policy::EvictionPolicy};

use crate::builder::InMemoryTierBuilder;

/// An in-memory cache tier backed by moka.
///
/// - Capacity eviction is strict LRU.
/// - Each entry is removed once its hard TTL (`expires_after - inserted_at`) has elapsed,
///   independently of capacity.
/// - Clones share the same underlying storage.
///
/// # Examples
///
/// ```
/// use edgesync_memory::InMemoryTier;
///
/// let tier = InMemoryTier::<u32>::with_capacity(100);
/// ```
#[derive(Clone)]
pub struct InMemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<CacheKey, CacheEntry<V>>,
}

impl<V> fmt::Debug for InMemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryTier")
            .field("name", &self.inner.name())
            .field("entry_count", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl<V> Default for InMemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InMemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an unbounded tier.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a tier holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a builder for configuring a tier.
    #[must_use]
    pub fn builder() -> InMemoryTierBuilder<V> {
        InMemoryTierBuilder::new()
    }

    pub(crate) fn from_builder(builder: &InMemoryTierBuilder<V>) -> Self {
        let mut moka_builder = Cache::builder().eviction_policy(EvictionPolicy::lru());

        if let Some(capacity) = builder.max_capacity {
            moka_builder = moka_builder.max_capacity(capacity);
        }

        if let Some(capacity) = builder.initial_capacity {
            moka_builder = moka_builder.initial_capacity(capacity);
        }

        if builder.expire_entries {
            moka_builder = moka_builder.expire_after(HardTtlExpiry);
        }

        if let Some(name) = builder.name.as_deref() {
            moka_builder = moka_builder.name(name);
        }

        Self {
            inner: moka_builder.build(),
        }
    }

    /// Applies pending evictions and bookkeeping.
    ///
    /// Capacity eviction and entry counts are maintained in the background; call this when an
    /// exact view is needed, for example in tests.
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    fn keys_where(&self, predicate: impl Fn(&CacheKey, &CacheEntry<V>) -> bool) -> Vec<Arc<CacheKey>> {
        self.inner
            .iter()
            .filter(|(key, entry)| predicate(key, entry))
            .map(|(key, _)| key)
            .collect()
    }

    async fn invalidate_all_of(&self, keys: &[Arc<CacheKey>]) -> u64 {
        for key in keys {
            self.inner.invalidate(key.as_ref()).await;
        }
        keys.len() as u64
    }
}

impl<V> CacheTier<V> for InMemoryTier<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, Error> {
        Ok(self.inner.get(key).await)
    }

    async fn insert(&self, key: &CacheKey, entry: CacheEntry<V>) -> Result<(), Error> {
        self.inner.insert(key.clone(), entry).await;
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let keys = self.keys_where(|key, _| key.has_prefix(prefix));
        Ok(self.invalidate_all_of(&keys).await)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.inner.invalidate_all();
        Ok(())
    }

    async fn evict_expired(&self, now: SystemTime) -> Result<u64, Error> {
        let keys = self.keys_where(|_, entry| entry.is_expired(now));
        Ok(self.invalidate_all_of(&keys).await)
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}

/// Expires each entry after its own hard TTL, measured from the moment it was written.
struct HardTtlExpiry;

impl<V> Expiry<CacheKey, CacheEntry<V>> for HardTtlExpiry {
    fn expire_after_create(&self, _key: &CacheKey, entry: &CacheEntry<V>, _created_at: Instant) -> Option<Duration> {
        Some(entry.hard_ttl())
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.hard_ttl())
    }
}

#[cfg(test)]
mod tests {
    use edgesync_tier::{TtlPolicy, Validator};

    use super::*;

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn hard_ttl_expiry_uses_entry_lifetime() {
        let policy = TtlPolicy::new(Duration::from_secs(5), Duration::from_secs(60)).expect("valid policy");
        let entry = CacheEntry::new(1, Validator::new("r1"), SystemTime::UNIX_EPOCH, &policy);
        let key = CacheKey::new("record:1");
        let now = Instant::now();

        assert_eq!(HardTtlExpiry.expire_after_create(&key, &entry, now), Some(Duration::from_secs(60)));
        assert_eq!(
            HardTtlExpiry.expire_after_update(&key, &entry, now, Some(Duration::from_secs(1))),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn debug_output_names_the_tier() {
        block_on(async {
            let tier = InMemoryTier::<i32>::builder().name("debug-tier").build();
            tier.run_pending_tasks().await;

            let debug = format!("{tier:?}");
            assert!(debug.contains("InMemoryTier"));
            assert!(debug.contains("debug-tier"));
        });
    }
}
