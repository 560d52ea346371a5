// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    fmt::{self, Debug, Display},
    marker::PhantomData,
    sync::{Arc, Weak},
    time::Duration,
};

use edgesync_tier::{CacheEntry, CacheKey, CacheTier, Error, Freshness, Lookup, TtlPolicy, Validator};
use futures::StreamExt;
use tick::{Clock, FutureExt, PeriodicTimer};
use tokio::task::JoinHandle;

use crate::{
    cache::{
        CacheLayerBuilder, FillTicket,
        fence::FillFence,
        in_flight::{InFlight, InFlightGuard},
    },
    served::{Served, Source},
    telemetry::{
        CacheActivity, CacheOperation, CacheTelemetry,
        ext::{CacheTelemetryExt, ClockExt},
    },
};

/// A freshness-aware cache over a [`CacheTier`].
///
/// Clones share the same tier, revalidation registry and fill fence.
///
/// # Examples
///
/// ```
/// use edgesync::cache::CacheLayer;
/// use edgesync_memory::InMemoryTier;
/// use edgesync_tier::{CacheKey, Validator};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let layer = CacheLayer::builder(InMemoryTier::new(), &Clock::new_frozen()).build();
/// let key = CacheKey::new("record:1");
///
/// let served = layer
///     .read_through(&key, || async { Ok::<_, std::io::Error>((7, Validator::new("r1"))) })
///     .await?;
/// assert_eq!(*served.value(), 7);
///
/// let cached = layer.lookup(&key).await.unwrap().into_entry().unwrap();
/// assert_eq!(cached.validator().as_str(), "r1");
/// # Ok::<(), std::io::Error>(())
/// # }).unwrap();
/// ```
pub struct CacheLayer<V, T> {
    inner: Arc<LayerInner<V, T>>,
}

struct LayerInner<V, T> {
    tier: T,
    clock: Clock,
    policy: TtlPolicy,
    name: &'static str,
    telemetry: Option<CacheTelemetry>,
    revalidation_timeout: Option<Duration>,
    in_flight: InFlight,
    fence: FillFence,
    _value: PhantomData<fn() -> V>,
}

impl<V, T> Clone for CacheLayer<V, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V, T: Debug> Debug for CacheLayer<V, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLayer")
            .field("name", &self.inner.name)
            .field("tier", &self.inner.tier)
            .field("policy", &self.inner.policy)
            .field("in_flight", &self.inner.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl<V, T: CacheTier<V>> CacheLayer<V, T> {
    /// Starts building a layer over `tier`.
    #[must_use]
    pub fn builder(tier: T, clock: &Clock) -> CacheLayerBuilder<V, T> {
        CacheLayerBuilder::new(tier, clock)
    }

    pub(crate) fn from_builder(builder: CacheLayerBuilder<V, T>) -> Self {
        Self {
            inner: Arc::new(LayerInner {
                tier: builder.tier,
                clock: builder.clock,
                policy: builder.policy,
                name: builder.name,
                telemetry: builder.telemetry,
                revalidation_timeout: builder.revalidation_timeout,
                in_flight: InFlight::default(),
                fence: FillFence::default(),
                _value: PhantomData,
            }),
        }
    }
}

impl<V, T> CacheLayer<V, T> {
    /// The name reported in telemetry.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// The freshness windows given to new entries.
    #[must_use]
    pub fn policy(&self) -> &TtlPolicy {
        &self.inner.policy
    }

    /// The clock freshness is judged by.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }

    /// The underlying storage tier.
    #[must_use]
    pub fn tier(&self) -> &T {
        &self.inner.tier
    }

    /// Returns `true` while a background revalidation of `key` is running.
    #[must_use]
    pub fn is_revalidating(&self, key: &CacheKey) -> bool {
        self.inner.in_flight.contains(key)
    }

    /// Number of background revalidations currently running.
    #[must_use]
    pub fn revalidations_in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Takes a ticket for a later [`fill`](Self::fill) or
    /// [`put_if_unchanged`](Self::put_if_unchanged). Take it before loading or writing the value.
    #[must_use]
    pub fn ticket(&self) -> FillTicket {
        self.inner.fence.ticket()
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        self.inner.telemetry.record(self.inner.name, operation, activity, duration);
    }
}

impl<V, T: CacheTier<V>> CacheLayer<V, T> {
    /// Looks `key` up and classifies the entry at the current time.
    ///
    /// Expired entries are reported as [`Lookup::Miss`] and left for expiry eviction to remove.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn lookup(&self, key: &CacheKey) -> Result<Lookup<V>, Error> {
        let timed = self.inner.clock.timed(self.inner.tier.get(key)).await;

        let entry = match timed.result {
            Ok(entry) => entry,
            Err(error) => {
                self.record(CacheOperation::Get, CacheActivity::Error, timed.duration);
                return Err(error);
            }
        };

        let now = self.inner.clock.system_time();
        let (activity, lookup) = match entry {
            None => (CacheActivity::Miss, Lookup::Miss),
            Some(entry) => match entry.freshness(now) {
                Freshness::Fresh => (CacheActivity::Hit, Lookup::Fresh(entry)),
                Freshness::Stale => (CacheActivity::StaleHit, Lookup::Stale(entry)),
                Freshness::Expired => (CacheActivity::Expired, Lookup::Miss),
            },
        };

        self.record(CacheOperation::Get, activity, timed.duration);
        Ok(lookup)
    }

    /// Stores `value` under `key`, replacing whatever is there.
    ///
    /// The entry is fresh for `policy.soft_ttl()` and usable for `policy.hard_ttl()` from now.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn put(&self, key: &CacheKey, value: V, validator: Validator, policy: &TtlPolicy) -> Result<(), Error> {
        let mut fenced = self.inner.fence.lock().await;
        fenced.mark_key(key);
        let entry = CacheEntry::new(value, validator, self.inner.clock.system_time(), policy);
        self.insert(CacheOperation::Insert, key, entry).await
    }

    /// Stores `value` under `key` unless something changed `key` since `ticket` was taken, in
    /// which case the entry under `key` is removed instead.
    ///
    /// Returns whether the new value was stored. Writers take the ticket before committing the
    /// value to its origin, so a write that lost a race to a later mutation never reinstates
    /// what that mutation replaced or removed.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn put_if_unchanged(
        &self,
        ticket: FillTicket,
        key: &CacheKey,
        value: V,
        validator: Validator,
        policy: &TtlPolicy,
    ) -> Result<bool, Error> {
        let mut fenced = self.inner.fence.lock().await;
        let unchanged = fenced.admits(ticket, key);
        fenced.mark_key(key);

        if unchanged {
            let entry = CacheEntry::new(value, validator, self.inner.clock.system_time(), policy);
            return self.insert(CacheOperation::Insert, key, entry).await.map(|()| true);
        }

        self.record(CacheOperation::Insert, CacheActivity::Skipped, Duration::ZERO);
        let timed = self.inner.clock.timed(self.inner.tier.invalidate(key)).await;
        self.record_removal(CacheOperation::Invalidate, timed.result.is_ok(), timed.duration);
        timed.result.map(|()| false)
    }

    /// Installs a value loaded for a read, unless a mutation covering `key` happened since
    /// `ticket` was taken.
    ///
    /// Returns whether the value was stored. The entry gets the layer's own freshness windows.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn fill(&self, ticket: FillTicket, key: &CacheKey, value: V, validator: Validator) -> Result<bool, Error> {
        let fenced = self.inner.fence.lock().await;
        if !fenced.admits(ticket, key) {
            self.record(CacheOperation::Fill, CacheActivity::Skipped, Duration::ZERO);
            return Ok(false);
        }

        let entry = CacheEntry::new(value, validator, self.inner.clock.system_time(), &self.inner.policy);
        self.insert(CacheOperation::Fill, key, entry).await.map(|()| true)
    }

    async fn insert(&self, operation: CacheOperation, key: &CacheKey, entry: CacheEntry<V>) -> Result<(), Error> {
        let timed = self.inner.clock.timed(self.inner.tier.insert(key, entry)).await;
        let activity = if timed.result.is_ok() {
            CacheActivity::Inserted
        } else {
            CacheActivity::Error
        };
        self.record(operation, activity, timed.duration);
        timed.result
    }

    /// Removes the entry under `key`.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), Error> {
        let mut fenced = self.inner.fence.lock().await;
        fenced.mark_key(key);
        let timed = self.inner.clock.timed(self.inner.tier.invalidate(key)).await;
        self.record_removal(CacheOperation::Invalidate, timed.result.is_ok(), timed.duration);
        timed.result
    }

    /// Removes every entry whose key starts with `prefix` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, Error> {
        let mut fenced = self.inner.fence.lock().await;
        fenced.mark_prefix(prefix);
        let timed = self.inner.clock.timed(self.inner.tier.invalidate_prefix(prefix)).await;
        self.record_removal(CacheOperation::InvalidatePrefix, timed.result.is_ok(), timed.duration);
        timed.result
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn clear(&self) -> Result<(), Error> {
        let mut fenced = self.inner.fence.lock().await;
        fenced.mark_all();
        let timed = self.inner.clock.timed(self.inner.tier.clear()).await;
        self.record_removal(CacheOperation::Clear, timed.result.is_ok(), timed.duration);
        timed.result
    }

    fn record_removal(&self, operation: CacheOperation, ok: bool, duration: Duration) {
        let activity = if ok { CacheActivity::Invalidated } else { CacheActivity::Error };
        self.record(operation, activity, duration);
    }

    /// Removes every entry that is expired now and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns the tier's error if the tier is unavailable.
    pub async fn evict_expired(&self) -> Result<u64, Error> {
        let now = self.inner.clock.system_time();
        let timed = self.inner.clock.timed(self.inner.tier.evict_expired(now)).await;

        let activity = if timed.result.is_ok() {
            CacheActivity::Evicted
        } else {
            CacheActivity::Error
        };
        self.record(CacheOperation::EvictExpired, activity, timed.duration);

        if let Some(size) = self.inner.tier.len() {
            self.inner.telemetry.record_size(self.inner.name, size);
        }

        timed.result
    }
}

impl<V, T> CacheLayer<V, T>
where
    V: Clone + Send + 'static,
    T: CacheTier<V> + 'static,
{
    /// Serves `key` from the cache, loading it with `loader` when needed.
    ///
    /// - A fresh entry is returned as-is.
    /// - A stale entry is returned as-is and a background revalidation with `loader` is
    ///   scheduled, unless one is already running for `key`.
    /// - On a miss, an expired entry or an unavailable tier, `loader` runs before this returns
    ///   and its value is filled into the cache.
    ///
    /// Cache failures are logged and never returned.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when the value had to be loaded synchronously and the load
    /// failed.
    pub async fn read_through<L, Fut, E>(&self, key: &CacheKey, loader: L) -> Result<Served<V>, E>
    where
        L: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(V, Validator), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match self.lookup(key).await {
            Ok(Lookup::Fresh(entry)) => return Ok(Served::from_entry(entry, Source::Fresh)),
            Ok(Lookup::Stale(entry)) => {
                drop(self.revalidate(key, loader));
                return Ok(Served::from_entry(entry, Source::Stale));
            }
            Ok(Lookup::Miss) => {}
            Err(error) => tracing::warn!(
                cache.name = self.inner.name,
                cache.key = %key,
                error = %error,
                "cache unavailable, loading from origin"
            ),
        }

        let ticket = self.ticket();
        let (value, validator) = loader().await?;
        let served = Served::from_origin(value.clone(), validator.clone(), self.inner.clock.system_time(), &self.inner.policy);

        if let Err(error) = self.fill(ticket, key, value, validator).await {
            tracing::warn!(
                cache.name = self.inner.name,
                cache.key = %key,
                error = %error,
                "failed to fill cache"
            );
        }

        Ok(served)
    }

    /// Schedules a background revalidation of `key` on the current Tokio runtime.
    ///
    /// Returns `None` without doing anything if a revalidation of `key` is already running or
    /// there is no runtime. The task loads a new value with `loader` and fills it in; on failure
    /// or timeout the current entry is left alone.
    pub fn revalidate<L, Fut, E>(&self, key: &CacheKey, loader: L) -> Option<JoinHandle<()>>
    where
        L: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(V, Validator), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let guard = self.inner.in_flight.try_begin(key)?;

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                cache.name = self.inner.name,
                cache.key = %key,
                "no async runtime, skipping revalidation"
            );
            return None;
        };

        let layer = self.clone();
        let key = key.clone();
        Some(runtime.spawn(async move { layer.run_revalidation(guard, &key, loader).await }))
    }

    async fn run_revalidation<L, Fut, E>(&self, _guard: InFlightGuard, key: &CacheKey, loader: L)
    where
        L: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(V, Validator), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let ticket = self.ticket();
        let clock = &self.inner.clock;

        let timed = clock
            .timed(async {
                match self.inner.revalidation_timeout {
                    Some(limit) => match loader().timeout(clock, limit).await {
                        Ok(loaded) => loaded.map_err(|e| e.to_string()),
                        Err(elapsed) => Err(elapsed.to_string()),
                    },
                    None => loader().await.map_err(|e| e.to_string()),
                }
            })
            .await;

        match timed.result {
            Ok((value, validator)) => {
                self.record(CacheOperation::Revalidate, CacheActivity::Revalidated, timed.duration);
                if let Err(error) = self.fill(ticket, key, value, validator).await {
                    tracing::warn!(
                        cache.name = self.inner.name,
                        cache.key = %key,
                        error = %error,
                        "failed to store revalidated value"
                    );
                }
            }
            Err(error) => {
                self.record(CacheOperation::Revalidate, CacheActivity::RevalidationFailed, timed.duration);
                tracing::warn!(
                    cache.name = self.inner.name,
                    cache.key = %key,
                    error = %error,
                    "revalidation failed, keeping the stale entry"
                );
            }
        }
    }

    /// Spawns a task on the current Tokio runtime that calls
    /// [`evict_expired`](Self::evict_expired) every `period`.
    ///
    /// The task stops once every handle to this layer is dropped. Returns `None` if there is no
    /// runtime.
    pub fn spawn_expiry_sweeper(&self, period: Duration) -> Option<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let layer: Weak<LayerInner<V, T>> = Arc::downgrade(&self.inner);
        let mut ticks = PeriodicTimer::new(&self.inner.clock, period);

        Some(runtime.spawn(async move {
            while ticks.next().await.is_some() {
                let Some(inner) = layer.upgrade() else {
                    break;
                };

                let layer = Self { inner };
                match layer.evict_expired().await {
                    Ok(evicted) => tracing::debug!(cache.name = layer.inner.name, evicted, "expired entries swept"),
                    Err(error) => tracing::warn!(cache.name = layer.inner.name, error = %error, "expiry sweep failed"),
                }
            }
        }))
    }
}
