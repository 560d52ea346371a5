// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Failure-injecting store wrapper for testing.
//!
//! [`FlakyStore`] wraps any [`DurableStore`], records every call, fails calls on demand with
//! [`StoreError::Unavailable`] and can hold reads in flight until a test releases them.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::store::{DurableStore, ListFilter, Patch, Payload, Record, RecordId, RecordList, Revision, StoreError};

/// Recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// A read of one record.
    Get(RecordId),
    /// A listing.
    List(ListFilter),
    /// A create.
    Create(Payload),
    /// An update.
    Update {
        /// The record that was written.
        id: RecordId,
        /// The patch that was applied.
        patch: Patch,
        /// The expected revision, if any.
        expected: Option<Revision>,
    },
    /// A delete.
    Delete {
        /// The record that was deleted.
        id: RecordId,
        /// The expected revision, if any.
        expected: Option<Revision>,
    },
}

impl StoreOp {
    /// Returns `true` for [`Get`](Self::Get) and [`List`](Self::List).
    #[must_use]
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get(_) | Self::List(_))
    }
}

type FailPredicate = Box<dyn Fn(&StoreOp) -> bool + Send + Sync>;

struct Failure {
    predicate: FailPredicate,
    remaining: Option<usize>,
}

/// Keeps reads of a [`FlakyStore`] waiting until dropped.
#[derive(Debug)]
pub struct HeldReads {
    _guard: OwnedRwLockWriteGuard<()>,
}

/// A store wrapper that records calls and injects failures.
///
/// Clones share the wrapped store, the call log, the failure rule and the read gate.
///
/// # Examples
///
/// ```
/// use edgesync::store::testing::{FlakyStore, StoreOp};
/// use edgesync::store::{DurableStore, InMemoryStore, RecordId};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let store = FlakyStore::new(InMemoryStore::new(&Clock::new_frozen()));
/// store.fail_times(1, StoreOp::is_read);
///
/// let id = RecordId::new("a");
/// assert!(store.get(&id).await.unwrap_err().is_unavailable());
/// assert!(!store.get(&id).await.unwrap_err().is_unavailable());
/// assert_eq!(store.operations().len(), 2);
/// # });
/// ```
pub struct FlakyStore<S> {
    inner: Arc<S>,
    operations: Arc<Mutex<Vec<StoreOp>>>,
    failure: Arc<Mutex<Option<Failure>>>,
    gate: Arc<RwLock<()>>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for FlakyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyStore")
            .field("inner", &self.inner)
            .field("operations", &self.operations)
            .field("failing", &self.failure.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<S> Clone for FlakyStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            operations: Arc::clone(&self.operations),
            failure: Arc::clone(&self.failure),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<S> FlakyStore<S> {
    /// Wraps `inner`. No call fails until a failure rule is set.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner: Arc::new(inner),
            operations: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            gate: Arc::new(RwLock::new(())),
        }
    }

    /// Returns the wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Fails every call matching `predicate`.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.failure.lock() = Some(Failure {
            predicate: Box::new(predicate),
            remaining: None,
        });
    }

    /// Fails the next `times` calls matching `predicate`, then lets them through.
    pub fn fail_times<F>(&self, times: usize, predicate: F)
    where
        F: Fn(&StoreOp) -> bool + Send + Sync + 'static,
    {
        *self.failure.lock() = Some(Failure {
            predicate: Box::new(predicate),
            remaining: Some(times),
        });
    }

    /// Removes the failure rule.
    pub fn clear_failures(&self) {
        *self.failure.lock() = None;
    }

    /// Returns every recorded call, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp> {
        self.operations.lock().clone()
    }

    /// Counts the recorded calls matching `predicate`.
    #[must_use]
    pub fn count_where(&self, predicate: impl Fn(&StoreOp) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }

    /// Clears the recorded calls.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    /// Makes reads wait after being recorded until the returned value is dropped.
    ///
    /// Waits for reads already past the gate to finish first.
    pub async fn hold_reads(&self) -> HeldReads {
        HeldReads {
            _guard: Arc::clone(&self.gate).write_owned().await,
        }
    }

    fn begin(&self, op: StoreOp) -> Result<(), StoreError> {
        let fail = {
            let mut failure = self.failure.lock();
            match failure.as_mut() {
                Some(failure) if (failure.predicate)(&op) => match &mut failure.remaining {
                    None => true,
                    Some(0) => false,
                    Some(remaining) => {
                        *remaining -= 1;
                        true
                    }
                },
                _ => false,
            }
        };

        self.operations.lock().push(op);

        if fail {
            Err(StoreError::Unavailable("injected failure".to_owned()))
        } else {
            Ok(())
        }
    }
}

impl<S: DurableStore> DurableStore for FlakyStore<S> {
    async fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.begin(StoreOp::Get(id.clone()))?;
        let _open = self.gate.read().await;
        self.inner.get(id).await
    }

    async fn list(&self, filter: &ListFilter) -> Result<RecordList, StoreError> {
        self.begin(StoreOp::List(filter.clone()))?;
        let _open = self.gate.read().await;
        self.inner.list(filter).await
    }

    async fn create(&self, payload: Payload) -> Result<Record, StoreError> {
        self.begin(StoreOp::Create(payload.clone()))?;
        self.inner.create(payload).await
    }

    async fn update(&self, id: &RecordId, patch: Patch, expected: Option<Revision>) -> Result<Record, StoreError> {
        self.begin(StoreOp::Update {
            id: id.clone(),
            patch: patch.clone(),
            expected,
        })?;
        self.inner.update(id, patch, expected).await
    }

    async fn delete(&self, id: &RecordId, expected: Option<Revision>) -> Result<(), StoreError> {
        self.begin(StoreOp::Delete { id: id.clone(), expected })?;
        self.inner.delete(id, expected).await
    }
}
