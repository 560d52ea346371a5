// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock cache tier for testing.
//!
//! [`MockTier`] keeps entries in a map, records every operation and can be told to fail
//! operations on demand, which makes cache-unavailable paths easy to exercise.

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use parking_lot::Mutex;

use crate::{CacheEntry, CacheKey, CacheTier, Error};

/// Recorded tier operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierOp<V> {
    /// A get for the given key.
    Get(CacheKey),
    /// An insert of an entry.
    Insert {
        /// The key that was written.
        key: CacheKey,
        /// The entry that was written.
        entry: CacheEntry<V>,
    },
    /// An invalidation of a single key.
    Invalidate(CacheKey),
    /// An invalidation of every key with the given prefix.
    InvalidatePrefix(String),
    /// A clear of all entries.
    Clear,
    /// A sweep of expired entries.
    EvictExpired(SystemTime),
}

type FailPredicate<V> = Box<dyn Fn(&TierOp<V>) -> bool + Send + Sync>;

/// A configurable mock tier.
///
/// Clones share the same storage, operation log and failure predicate.
///
/// # Examples
///
/// ```
/// use std::time::SystemTime;
///
/// use edgesync_tier::testing::{MockTier, TierOp};
/// use edgesync_tier::{CacheEntry, CacheKey, CacheTier, TtlPolicy, Validator};
///
/// # futures::executor::block_on(async {
/// let tier = MockTier::<i32>::new();
/// let key = CacheKey::new("record:1");
///
/// tier.fail_when(|op| matches!(op, TierOp::Get(_)));
/// assert!(tier.get(&key).await.is_err());
///
/// tier.clear_failures();
/// let entry = CacheEntry::new(1, Validator::new("r1"), SystemTime::UNIX_EPOCH, &TtlPolicy::default());
/// tier.insert(&key, entry).await.unwrap();
/// assert!(tier.contains_key(&key));
/// # });
/// ```
pub struct MockTier<V> {
    data: Arc<Mutex<HashMap<CacheKey, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<TierOp<V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<V>>>>,
}

impl<V: std::fmt::Debug> std::fmt::Debug for MockTier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTier")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<V> Clone for MockTier<V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<V> Default for MockTier<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MockTier<V> {
    /// Creates an empty mock tier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns `true` if an entry is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.data.lock().contains_key(key)
    }

    /// Sets a predicate that decides which operations fail.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&TierOp<V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate so every operation succeeds again.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Clears the recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn should_fail(&self, op: &TierOp<V>) -> bool {
        self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op))
    }

    fn record(&self, op: TierOp<V>) -> Result<(), Error> {
        let fail = self.should_fail(&op);
        let name = match &op {
            TierOp::Get(_) => "get",
            TierOp::Insert { .. } => "insert",
            TierOp::Invalidate(_) => "invalidate",
            TierOp::InvalidatePrefix(_) => "invalidate_prefix",
            TierOp::Clear => "clear",
            TierOp::EvictExpired(_) => "evict_expired",
        };
        self.operations.lock().push(op);

        if fail {
            return Err(Error::from_message(format!("mock: {name} failed")));
        }
        Ok(())
    }
}

impl<V: Clone> MockTier<V> {
    /// Returns a copy of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<TierOp<V>> {
        self.operations.lock().clone()
    }

    /// Returns a copy of the entry stored under `key`, bypassing the operation log.
    #[must_use]
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry<V>> {
        self.data.lock().get(key).cloned()
    }
}

impl<V> CacheTier<V> for MockTier<V>
where
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry<V>>, Error> {
        self.record(TierOp::Get(key.clone()))?;
        Ok(self.data.lock().get(key).cloned())
    }

    async fn insert(&self, key: &CacheKey, entry: CacheEntry<V>) -> Result<(), Error> {
        self.record(TierOp::Insert {
            key: key.clone(),
            entry: entry.clone(),
        })?;
        self.data.lock().insert(key.clone(), entry);
        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> Result<(), Error> {
        self.record(TierOp::Invalidate(key.clone()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<u64, Error> {
        self.record(TierOp::InvalidatePrefix(prefix.to_owned()))?;
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|key, _| !key.has_prefix(prefix));
        Ok((before - data.len()) as u64)
    }

    async fn clear(&self) -> Result<(), Error> {
        self.record(TierOp::Clear)?;
        self.data.lock().clear();
        Ok(())
    }

    async fn evict_expired(&self, now: SystemTime) -> Result<u64, Error> {
        self.record(TierOp::EvictExpired(now))?;
        let mut data = self.data.lock();
        let before = data.len();
        data.retain(|_, entry| !entry.is_expired(now));
        Ok((before - data.len()) as u64)
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
