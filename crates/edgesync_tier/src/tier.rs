// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The storage trait for cache backends.

use std::time::SystemTime;

use crate::{CacheEntry, CacheKey, Error};

/// Storage operations a cache backend provides.
///
/// A tier only stores and removes entries. Freshness decisions, revalidation and write ordering
/// are made by the layer on top of it, so a tier may return entries of any age.
///
/// Every operation is fallible. An error means the tier itself is unavailable; callers degrade
/// to reading the durable store directly instead of failing requests.
pub trait CacheTier<V>: Send + Sync {
    /// Gets the entry stored under `key`.
    fn get(&self, key: &CacheKey) -> impl Future<Output = Result<Option<CacheEntry<V>>, Error>> + Send;

    /// Stores `entry` under `key`, replacing any previous entry.
    fn insert(&self, key: &CacheKey, entry: CacheEntry<V>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes the entry stored under `key`, if any.
    fn invalidate(&self, key: &CacheKey) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes every entry whose key starts with `prefix` and returns how many were removed.
    fn invalidate_prefix(&self, prefix: &str) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Removes all entries.
    fn clear(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes every entry that is expired at `now` and returns how many were removed.
    fn evict_expired(&self, now: SystemTime) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Returns the number of entries, if supported.
    ///
    /// Returns `None` for implementations that don't track size.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the tier contains no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
