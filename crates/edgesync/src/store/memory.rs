// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tick::Clock;

use crate::store::{DurableStore, ListFilter, Patch, Payload, Record, RecordId, RecordList, Revision, StoreError};

/// A durable store kept in process memory.
///
/// Revisions come from a single store-wide counter, so every successful write yields a revision
/// no other write has produced. Timestamps come from the supplied [`Clock`].
///
/// Clones share the same records.
///
/// # Examples
///
/// ```
/// use edgesync::store::{DurableStore, InMemoryStore, Payload};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let store = InMemoryStore::new(&Clock::new_frozen());
/// let record = store.create(Payload::new("buy milk", false)).await?;
///
/// assert_eq!(store.get(&record.id).await?, record);
/// # Ok::<(), edgesync::store::StoreError>(())
/// # }).unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    clock: Clock,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<RecordId, StoredRecord>,
    last_revision: u64,
    last_sequence: u64,
}

#[derive(Debug)]
struct StoredRecord {
    sequence: u64,
    record: Record,
}

impl StoreState {
    fn next_revision(&mut self) -> Revision {
        self.last_revision += 1;
        Revision::new(self.last_revision)
    }

    fn check(&self, id: &RecordId, expected: Option<Revision>) -> Result<&StoredRecord, StoreError> {
        let stored = self.records.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;

        match expected {
            Some(expected) if expected != stored.record.revision => Err(StoreError::Conflict {
                id: id.clone(),
                expected,
                actual: stored.record.revision,
            }),
            _ => Ok(stored),
        }
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: &Clock) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock: clock.clone(),
        }
    }

    /// Number of records in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for InMemoryStore {
    async fn get(&self, id: &RecordId) -> Result<Record, StoreError> {
        self.state
            .lock()
            .records
            .get(id)
            .map(|stored| stored.record.clone())
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self, filter: &ListFilter) -> Result<RecordList, StoreError> {
        let state = self.state.lock();
        let mut ordered: Vec<&StoredRecord> = state.records.values().collect();
        ordered.sort_by_key(|stored| stored.sequence);

        Ok(filter.apply(ordered.into_iter().map(|stored| &stored.record)))
    }

    async fn create(&self, payload: Payload) -> Result<Record, StoreError> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();

        let revision = state.next_revision();
        state.last_sequence += 1;
        let sequence = state.last_sequence;

        let record = Record {
            id: RecordId::generate(),
            revision,
            created_at: now,
            last_modified: now,
            payload,
        };
        state.records.insert(
            record.id.clone(),
            StoredRecord {
                sequence,
                record: record.clone(),
            },
        );

        Ok(record)
    }

    async fn update(&self, id: &RecordId, patch: Patch, expected: Option<Revision>) -> Result<Record, StoreError> {
        let now = self.clock.system_time();
        let mut state = self.state.lock();

        let payload = patch.apply_to(&state.check(id, expected)?.record.payload);
        let revision = state.next_revision();

        let stored = state.records.get_mut(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        stored.record.payload = payload;
        stored.record.revision = revision;
        stored.record.last_modified = now;

        Ok(stored.record.clone())
    }

    async fn delete(&self, id: &RecordId, expected: Option<Revision>) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.check(id, expected)?;
        state.records.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tick::ClockControl;

    use super::*;
    use crate::store::SortOrder;

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    #[test]
    fn create_assigns_increasing_revisions() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());

            let first = store.create(Payload::new("a", false)).await.expect("create failed");
            let second = store.create(Payload::new("b", false)).await.expect("create failed");

            assert!(second.revision > first.revision);
            assert_ne!(first.id, second.id);
            assert_eq!(store.len(), 2);
        });
    }

    #[test]
    fn update_bumps_revision_and_timestamp() {
        block_on(async {
            let control = ClockControl::new();
            let store = InMemoryStore::new(&control.to_clock());
            let created = store.create(Payload::new("a", false)).await.expect("create failed");

            control.advance(Duration::from_secs(3));
            let updated = store
                .update(&created.id, Patch::new().completed(true), Some(created.revision))
                .await
                .expect("update failed");

            assert!(updated.revision > created.revision);
            assert!(updated.payload.completed);
            assert_eq!(updated.created_at, created.created_at);
            assert_eq!(
                updated.last_modified.duration_since(created.last_modified).expect("clock moved forward"),
                Duration::from_secs(3)
            );
        });
    }

    #[test]
    fn conditional_update_with_stale_revision_conflicts() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());
            let created = store.create(Payload::new("a", false)).await.expect("create failed");
            let updated = store
                .update(&created.id, Patch::new().title("b"), None)
                .await
                .expect("unconditional update failed");

            let error = store
                .update(&created.id, Patch::new().title("c"), Some(created.revision))
                .await
                .expect_err("stale update must conflict");

            assert_eq!(
                error,
                StoreError::Conflict {
                    id: created.id.clone(),
                    expected: created.revision,
                    actual: updated.revision,
                }
            );
            assert_eq!(store.get(&created.id).await.expect("get failed").payload.title, "b");
        });
    }

    #[test]
    fn missing_records_are_not_found() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());
            let id = RecordId::new("missing");

            assert_eq!(store.get(&id).await, Err(StoreError::NotFound(id.clone())));
            assert_eq!(
                store.update(&id, Patch::new().completed(true), Some(Revision::new(1))).await,
                Err(StoreError::NotFound(id.clone()))
            );
            assert_eq!(store.delete(&id, None).await, Err(StoreError::NotFound(id)));
        });
    }

    #[test]
    fn conditional_delete_checks_revision() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());
            let created = store.create(Payload::new("a", false)).await.expect("create failed");

            let stale = Revision::new(created.revision.get() + 10);
            assert!(matches!(
                store.delete(&created.id, Some(stale)).await,
                Err(StoreError::Conflict { .. })
            ));

            store.delete(&created.id, Some(created.revision)).await.expect("delete failed");
            assert!(store.is_empty());
        });
    }

    #[test]
    fn list_preserves_creation_order() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());
            for title in ["c", "a", "b"] {
                store.create(Payload::new(title, false)).await.expect("create failed");
            }

            let created = store.list(&ListFilter::all()).await.expect("list failed");
            let titles: Vec<_> = created.records().iter().map(|r| r.payload.title.as_str()).collect();
            assert_eq!(titles, ["c", "a", "b"]);

            let sorted = store
                .list(&ListFilter::all().sorted_by(SortOrder::TitleAsc))
                .await
                .expect("list failed");
            let titles: Vec<_> = sorted.records().iter().map(|r| r.payload.title.as_str()).collect();
            assert_eq!(titles, ["a", "b", "c"]);
        });
    }

    #[test]
    fn list_validator_changes_after_write() {
        block_on(async {
            let store = InMemoryStore::new(&Clock::new_frozen());
            let created = store.create(Payload::new("a", false)).await.expect("create failed");
            let before = store.list(&ListFilter::all()).await.expect("list failed");

            store
                .update(&created.id, Patch::new().completed(true), None)
                .await
                .expect("update failed");
            let after = store.list(&ListFilter::all()).await.expect("list failed");

            assert_ne!(before.validator(), after.validator());
        });
    }
}
