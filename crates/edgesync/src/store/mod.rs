// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The durable store adapter.
//!
//! [`DurableStore`] is the contract with the authoritative storage behind the cache. The store
//! owns every [`Record`]; the cache only ever holds read-only copies of what the store returned.
//!
//! Writes are conditional: when an expected [`Revision`] is supplied and the stored revision
//! differs, the store fails with [`StoreError::Conflict`] and changes nothing. Each write is
//! atomic for a single record.

mod error;
mod memory;
mod payload;
mod record;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

use std::sync::Arc;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use payload::{MAX_TITLE_CHARS, Patch, Payload, ValidationError};
pub use record::{ListFilter, Record, RecordId, RecordList, Revision, SortOrder};

/// Basic CRUD over records, with optimistic concurrency on writes.
pub trait DurableStore: Send + Sync {
    /// Reads one record.
    fn get(&self, id: &RecordId) -> impl Future<Output = Result<Record, StoreError>> + Send;

    /// Lists the records selected by `filter`.
    fn list(&self, filter: &ListFilter) -> impl Future<Output = Result<RecordList, StoreError>> + Send;

    /// Creates a record and assigns it an id and a revision.
    fn create(&self, payload: Payload) -> impl Future<Output = Result<Record, StoreError>> + Send;

    /// Applies `patch` to a record.
    ///
    /// With `expected` set, the write only happens if the stored revision equals it.
    fn update(
        &self,
        id: &RecordId,
        patch: Patch,
        expected: Option<Revision>,
    ) -> impl Future<Output = Result<Record, StoreError>> + Send;

    /// Deletes a record.
    ///
    /// With `expected` set, the delete only happens if the stored revision equals it.
    fn delete(&self, id: &RecordId, expected: Option<Revision>) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<S: DurableStore> DurableStore for Arc<S> {
    fn get(&self, id: &RecordId) -> impl Future<Output = Result<Record, StoreError>> + Send {
        (**self).get(id)
    }

    fn list(&self, filter: &ListFilter) -> impl Future<Output = Result<RecordList, StoreError>> + Send {
        (**self).list(filter)
    }

    fn create(&self, payload: Payload) -> impl Future<Output = Result<Record, StoreError>> + Send {
        (**self).create(payload)
    }

    fn update(
        &self,
        id: &RecordId,
        patch: Patch,
        expected: Option<Revision>,
    ) -> impl Future<Output = Result<Record, StoreError>> + Send {
        (**self).update(id, patch, expected)
    }

    fn delete(&self, id: &RecordId, expected: Option<Revision>) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).delete(id, expected)
    }
}
