// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashSet, sync::Arc};

use edgesync_tier::CacheKey;
use parking_lot::Mutex;

/// Keys with a background revalidation running.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    keys: Arc<Mutex<HashSet<CacheKey>>>,
}

impl InFlight {
    /// Marks `key` as in flight, or returns `None` if it already is.
    ///
    /// The mark is removed when the returned guard is dropped.
    pub(crate) fn try_begin(&self, key: &CacheKey) -> Option<InFlightGuard> {
        self.keys.lock().insert(key.clone()).then(|| InFlightGuard {
            keys: Arc::clone(&self.keys),
            key: key.clone(),
        })
    }

    pub(crate) fn contains(&self, key: &CacheKey) -> bool {
        self.keys.lock().contains(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.keys.lock().len()
    }
}

#[derive(Debug)]
pub(crate) struct InFlightGuard {
    keys: Arc<Mutex<HashSet<CacheKey>>>,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.keys.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_guard_per_key() {
        let in_flight = InFlight::default();
        let key = CacheKey::new("record:1");

        let guard = in_flight.try_begin(&key).expect("key is free");
        assert!(in_flight.try_begin(&key).is_none());
        assert!(in_flight.try_begin(&CacheKey::new("record:2")).is_some());
        assert!(in_flight.contains(&key));

        drop(guard);
        assert!(!in_flight.contains(&key));
        assert!(in_flight.try_begin(&key).is_some());
    }

    #[test]
    fn guard_released_on_panic() {
        let in_flight = InFlight::default();
        let key = CacheKey::new("record:1");
        let guard = in_flight.try_begin(&key).expect("key is free");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = guard;
            panic!("revalidation blew up");
        }));

        assert!(result.is_err());
        assert_eq!(in_flight.len(), 0);
    }
}
