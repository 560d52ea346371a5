// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt::Debug, sync::Arc, time::Duration};

use edgesync_memory::InMemoryTier;
use edgesync_tier::{CacheKey, CacheTier, Validator};
use tick::Clock;
use tokio::task::JoinHandle;

use crate::{
    builder::EdgeSyncBuilder,
    cache::CacheLayer,
    conditional::{Evaluation, IfNoneMatch, evaluate},
    coordinator::MutationCoordinator,
    error::{Result, SyncError},
    keys::{list_key, record_key},
    resource::Resource,
    retry::ReadRetry,
    served::Served,
    store::{DurableStore, ListFilter, Patch, Payload, Record, RecordId, RecordList, StoreError},
};

/// The inbound API: cached reads and cache-coherent writes over a [`DurableStore`].
///
/// Reads go through a stale-while-revalidate [`CacheLayer`]; a stale entry is served at once
/// while a single background task refreshes it. Writes go to the store first and then replace or
/// evict the affected cache entries, so a read issued after a write returns never sees the value
/// from before it.
///
/// Clones share the store, the cache and the in-flight revalidations.
///
/// # Examples
///
/// ```
/// use edgesync::{EdgeSync, Source, store::{InMemoryStore, Patch, Payload}};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let clock = Clock::new_frozen();
/// let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock).build();
///
/// let created = sync.create_record(Payload::new("buy milk", false)).await?;
///
/// let served = sync.read_record(&created.id).await?;
/// assert_eq!(served.source(), Source::Fresh);
///
/// let updated = sync
///     .update_record(&created.id, Patch::new().completed(true), Some(served.validator().clone()))
///     .await?;
/// assert!(updated.payload.completed);
/// # Ok::<(), edgesync::SyncError>(())
/// # }).unwrap();
/// ```
pub struct EdgeSync<S, T = InMemoryTier<Resource>> {
    store: Arc<S>,
    cache: CacheLayer<Resource, T>,
    coordinator: MutationCoordinator<S, T>,
    retry: ReadRetry,
}

impl<S, T> Clone for EdgeSync<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            coordinator: self.coordinator.clone(),
            retry: self.retry.clone(),
        }
    }
}

impl<S, T: Debug> Debug for EdgeSync<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeSync")
            .field("cache", &self.cache)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl<S> EdgeSync<S> {
    /// Starts building an instance over `store`, timed by `clock`.
    #[must_use]
    pub fn builder(store: S, clock: &Clock) -> EdgeSyncBuilder<S, InMemoryTier<Resource>> {
        EdgeSyncBuilder::new(store, clock)
    }
}

/// A value that can be served from the cache.
trait Cacheable: Into<Resource> + Send + 'static {
    fn validator(&self) -> Validator;

    fn from_resource(resource: Resource) -> Option<Self>;
}

impl Cacheable for Record {
    fn validator(&self) -> Validator {
        Self::validator(self)
    }

    fn from_resource(resource: Resource) -> Option<Self> {
        resource.into_record()
    }
}

impl Cacheable for RecordList {
    fn validator(&self) -> Validator {
        Self::validator(self).clone()
    }

    fn from_resource(resource: Resource) -> Option<Self> {
        resource.into_list()
    }
}

impl<S, T> EdgeSync<S, T> {
    pub(crate) fn from_parts(
        store: Arc<S>,
        cache: CacheLayer<Resource, T>,
        coordinator: MutationCoordinator<S, T>,
        retry: ReadRetry,
    ) -> Self {
        Self {
            store,
            cache,
            coordinator,
            retry,
        }
    }

    /// The cache in front of the store.
    #[must_use]
    pub fn cache(&self) -> &CacheLayer<Resource, T> {
        &self.cache
    }

    /// The coordinator that runs writes.
    #[must_use]
    pub fn coordinator(&self) -> &MutationCoordinator<S, T> {
        &self.coordinator
    }

    /// The durable store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, T> EdgeSync<S, T>
where
    S: DurableStore + 'static,
    T: CacheTier<Resource> + 'static,
{
    /// Reads one record, from the cache when possible.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if the record does not exist.
    /// - [`SyncError::StoreUnavailable`] if the record had to be loaded and the store failed
    ///   twice.
    pub async fn read_record(&self, id: &RecordId) -> Result<Served<Record>> {
        let id = id.clone();
        self.read(record_key(&id), "get", move |store: Arc<S>| {
            let id = id.clone();
            async move { store.get(&id).await }
        })
        .await
    }

    /// Reads the records selected by `filter`, from the cache when possible.
    ///
    /// # Errors
    ///
    /// [`SyncError::StoreUnavailable`] if the listing had to be loaded and the store failed twice.
    pub async fn read_list(&self, filter: &ListFilter) -> Result<Served<RecordList>> {
        let filter = filter.clone();
        self.read(list_key(&filter), "list", move |store: Arc<S>| {
            let filter = filter.clone();
            async move { store.list(&filter).await }
        })
        .await
    }

    /// Reads one record and evaluates an `If-None-Match` precondition against it.
    ///
    /// # Errors
    ///
    /// See [`read_record`](Self::read_record).
    pub async fn read_record_if_none_match(&self, id: &RecordId, precondition: &IfNoneMatch) -> Result<Evaluation<Record>> {
        Ok(evaluate(precondition, self.read_record(id).await?))
    }

    /// Reads a listing and evaluates an `If-None-Match` precondition against it.
    ///
    /// # Errors
    ///
    /// See [`read_list`](Self::read_list).
    pub async fn read_list_if_none_match(
        &self,
        filter: &ListFilter,
        precondition: &IfNoneMatch,
    ) -> Result<Evaluation<RecordList>> {
        Ok(evaluate(precondition, self.read_list(filter).await?))
    }

    /// Creates a record.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidInput`] if the payload is invalid.
    /// - [`SyncError::StoreUnavailable`] if the store failed. Writes are never retried.
    pub async fn create_record(&self, payload: Payload) -> Result<Record> {
        self.coordinator.create(payload).await
    }

    /// Creates a record from a JSON body.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] if the body is not a valid payload, otherwise as
    /// [`create_record`](Self::create_record).
    pub async fn create_record_json(&self, body: &serde_json::Value) -> Result<Record> {
        self.create_record(Payload::from_json(body)?).await
    }

    /// Patches a record, conditionally on `if_match`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidInput`] if the patch is invalid or a required `if_match` is missing.
    /// - [`SyncError::StaleWrite`] if `if_match` is not the record's current validator.
    /// - [`SyncError::NotFound`] if the record does not exist.
    /// - [`SyncError::StoreUnavailable`] if the store failed.
    pub async fn update_record(&self, id: &RecordId, patch: Patch, if_match: Option<Validator>) -> Result<Record> {
        self.coordinator.update(id, patch, if_match).await
    }

    /// Patches a record from a JSON body.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] if the body is not a valid patch, otherwise as
    /// [`update_record`](Self::update_record).
    pub async fn update_record_json(&self, id: &RecordId, body: &serde_json::Value, if_match: Option<Validator>) -> Result<Record> {
        self.update_record(id, Patch::from_json(body)?, if_match).await
    }

    /// Deletes a record, conditionally on `if_match`.
    ///
    /// # Errors
    ///
    /// As [`update_record`](Self::update_record), without the patch checks.
    pub async fn delete_record(&self, id: &RecordId, if_match: Option<Validator>) -> Result<()> {
        self.coordinator.delete(id, if_match).await
    }

    /// Drops cache entries past their hard TTL and returns how many were dropped.
    ///
    /// A tier failure is logged and counts as nothing dropped.
    pub async fn evict_expired(&self) -> u64 {
        self.cache.evict_expired().await.unwrap_or_else(|error| {
            tracing::warn!(cache.name = self.cache.name(), error = %error, "expiry sweep failed");
            0
        })
    }

    /// Sweeps expired entries every `period` on the current Tokio runtime.
    ///
    /// See [`CacheLayer::spawn_expiry_sweeper`].
    pub fn spawn_expiry_sweeper(&self, period: Duration) -> Option<JoinHandle<()>> {
        self.cache.spawn_expiry_sweeper(period)
    }

    async fn read<R, F, Fut>(&self, key: CacheKey, operation: &'static str, fetch: F) -> Result<Served<R>>
    where
        R: Cacheable,
        F: Fn(Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, StoreError>> + Send + 'static,
    {
        let fetch = Arc::new(fetch);

        let loader = {
            let store = Arc::clone(&self.store);
            let retry = self.retry.clone();
            let fetch = Arc::clone(&fetch);
            move || {
                let store = Arc::clone(&store);
                let retry = retry.clone();
                let fetch = Arc::clone(&fetch);
                async move {
                    let value = retry.run(operation, || fetch(Arc::clone(&store))).await?;
                    let validator = value.validator();
                    Ok::<_, SyncError>((value.into(), validator))
                }
            }
        };

        let served = self.cache.read_through(&key, loader).await?;
        if let Some(served) = served.filter_map(R::from_resource) {
            return Ok(served);
        }

        tracing::error!(
            cache.name = self.cache.name(),
            cache.key = %key,
            "cached value does not match its key, reloading"
        );
        if let Err(error) = self.cache.invalidate(&key).await {
            tracing::warn!(cache.name = self.cache.name(), cache.key = %key, error = %error, "failed to invalidate cache entry");
        }

        let value = self.retry.run(operation, || fetch(Arc::clone(&self.store))).await?;
        let validator = value.validator();
        Ok(Served::from_origin(
            value,
            validator,
            self.cache.clock().system_time(),
            self.cache.policy(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use edgesync_tier::{
        TtlPolicy,
        testing::{MockTier, TierOp},
    };

    use super::*;
    use crate::{Source, store::InMemoryStore, telemetry::testing::LogCapture};

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    fn sync() -> (EdgeSync<InMemoryStore, MockTier<Resource>>, MockTier<Resource>) {
        let clock = Clock::new_frozen();
        let tier = MockTier::new();
        let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock)
            .tier(tier.clone())
            .read_retry_backoff(Duration::ZERO)
            .build();
        (sync, tier)
    }

    #[test]
    fn read_after_create_is_served_from_the_cache() {
        block_on(async {
            let (sync, _tier) = sync();
            let created = sync.create_record(Payload::new("a", false)).await.expect("create failed");

            let served = sync.read_record(&created.id).await.expect("read failed");

            assert_eq!(served.source(), Source::Fresh);
            assert_eq!(served.value(), &created);
            assert_eq!(served.validator(), &created.validator());
        });
    }

    #[test]
    fn first_listing_comes_from_the_store_then_the_cache() {
        block_on(async {
            let (sync, tier) = sync();
            sync.create_record(Payload::new("a", false)).await.expect("create failed");

            let first = sync.read_list(&ListFilter::all()).await.expect("list failed");
            let second = sync.read_list(&ListFilter::all()).await.expect("list failed");

            assert_eq!(first.source(), Source::Origin);
            assert_eq!(second.source(), Source::Fresh);
            assert_eq!(first.validator(), second.validator());
            assert!(tier.contains_key(&list_key(&ListFilter::all())));
        });
    }

    #[test]
    fn mismatched_cached_value_is_replaced() {
        block_on(async {
            let (sync, tier) = sync();
            let created = sync.create_record(Payload::new("a", false)).await.expect("create failed");
            let key = record_key(&created.id);
            let listing = RecordList::new(Vec::new());
            sync.cache()
                .put(&key, Resource::List(listing.clone()), listing.validator().clone(), &TtlPolicy::default())
                .await
                .expect("put failed");

            let capture = LogCapture::new();
            let _guard = tracing::subscriber::set_default(capture.subscriber());

            let served = sync.read_record(&created.id).await.expect("read failed");

            assert_eq!(served.source(), Source::Origin);
            assert_eq!(served.value(), &created);
            assert!(tier.operations().contains(&TierOp::Invalidate(key)));
            capture.assert_contains("cached value does not match its key, reloading");
        });
    }

    #[test]
    fn json_bodies_are_validated() {
        block_on(async {
            let (sync, _tier) = sync();

            let error = sync
                .create_record_json(&serde_json::json!({ "title": 42 }))
                .await
                .expect_err("malformed body");

            assert!(matches!(error, SyncError::InvalidInput(_)));

            let error = sync
                .create_record_json(&serde_json::json!(["a", false]))
                .await
                .expect_err("array body");
            assert!(matches!(error, SyncError::InvalidInput(crate::store::ValidationError::Malformed(_))));
            assert!(sync.store().is_empty());

            let created = sync
                .create_record_json(&serde_json::json!({ "title": "a", "completed": false }))
                .await
                .expect("create failed");
            let updated = sync
                .update_record_json(&created.id, &serde_json::json!({ "completed": true }), Some(created.validator()))
                .await
                .expect("update failed");
            assert!(updated.payload.completed);
        });
    }

    #[test]
    fn conditional_read_with_current_validator_is_not_modified() {
        block_on(async {
            let (sync, _tier) = sync();
            let created = sync.create_record(Payload::new("a", false)).await.expect("create failed");

            let evaluation = sync
                .read_record_if_none_match(&created.id, &IfNoneMatch::from(created.validator()))
                .await
                .expect("read failed");

            assert!(evaluation.is_not_modified());
            assert_eq!(evaluation.validator(), &created.validator());
        });
    }

    #[test]
    fn evict_expired_swallows_tier_failures() {
        block_on(async {
            let (sync, tier) = sync();
            tier.fail_when(|_| true);

            assert_eq!(sync.evict_expired().await, 0);
        });
    }
}
