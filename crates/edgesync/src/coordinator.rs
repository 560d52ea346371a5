// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Writes: validate, commit to the durable store, then bring the cache in line.
//!
//! Every write runs the same stages in order:
//!
//! 1. **Validate** the payload or patch and the precondition.
//! 2. **Commit** to the durable store, conditionally on the caller's `If-Match` validator.
//! 3. **Propagate** to the cache: the written record replaces its cache entry (a delete removes
//!    it), and every cached listing is invalidated.
//! 4. **Respond** with the committed outcome.
//!
//! A failed stage ends the write. Cache failures during propagation are logged and do not fail
//! the write; store failures are returned without retrying.

use std::sync::Arc;

use edgesync_tier::{CacheTier, Validator};

use crate::{
    cache::{CacheLayer, FillTicket},
    error::SyncError,
    keys::{LIST_PREFIX, record_key},
    resource::Resource,
    store::{DurableStore, Patch, Payload, Record, RecordId, Revision, ValidationError},
};

/// A write request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create a record.
    Create(Payload),
    /// Patch a record.
    Update {
        /// The record to patch.
        id: RecordId,
        /// The fields to change.
        patch: Patch,
        /// The validator the caller last saw.
        if_match: Option<Validator>,
    },
    /// Delete a record.
    Delete {
        /// The record to delete.
        id: RecordId,
        /// The validator the caller last saw.
        if_match: Option<Validator>,
    },
}

/// The outcome of a committed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Committed {
    /// The record that was created.
    Created(Record),
    /// The record after the update.
    Updated(Record),
    /// The id of the deleted record.
    Deleted(RecordId),
}

impl Committed {
    /// The record the write produced, or `None` for a delete.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Created(record) | Self::Updated(record) => Some(record),
            Self::Deleted(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteStage {
    Validate,
    CommitToStore,
    PropagateCache,
    Respond,
}

impl WriteStage {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::CommitToStore => "commit_to_store",
            Self::PropagateCache => "propagate_cache",
            Self::Respond => "respond",
        }
    }
}

/// What a write expects the stored revision to be.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Expected {
    Any,
    Revision(Revision),
    /// A validator no record revision renders to.
    Unmatchable(Validator),
}

impl Expected {
    fn from_if_match(if_match: Option<Validator>, required: bool) -> Result<Self, ValidationError> {
        match if_match {
            None if required => Err(ValidationError::MissingPrecondition),
            None => Ok(Self::Any),
            Some(validator) => Ok(match Revision::from_validator(&validator) {
                Some(revision) if revision.to_validator() == validator => Self::Revision(revision),
                _ => Self::Unmatchable(validator),
            }),
        }
    }
}

/// Runs writes through the durable store and keeps the cache coherent with them.
pub struct MutationCoordinator<S, T> {
    store: Arc<S>,
    cache: CacheLayer<Resource, T>,
    require_precondition: bool,
}

impl<S, T> Clone for MutationCoordinator<S, T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: self.cache.clone(),
            require_precondition: self.require_precondition,
        }
    }
}

impl<S, T> std::fmt::Debug for MutationCoordinator<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("cache", &self.cache.name())
            .field("require_precondition", &self.require_precondition)
            .finish_non_exhaustive()
    }
}

impl<S, T> MutationCoordinator<S, T>
where
    S: DurableStore,
    T: CacheTier<Resource>,
{
    /// Creates a coordinator writing to `store` and keeping `cache` coherent.
    ///
    /// With `require_precondition`, updates and deletes without an `If-Match` validator are
    /// rejected.
    #[must_use]
    pub fn new(store: Arc<S>, cache: CacheLayer<Resource, T>, require_precondition: bool) -> Self {
        Self {
            store,
            cache,
            require_precondition,
        }
    }

    /// Runs `mutation` through every stage.
    ///
    /// # Errors
    ///
    /// - [`SyncError::InvalidInput`] if validation fails; nothing is written.
    /// - [`SyncError::StaleWrite`] if `if_match` is not the current validator; nothing is written.
    /// - [`SyncError::NotFound`] if the record does not exist.
    /// - [`SyncError::StoreUnavailable`] if the store failed. The write was attempted once.
    pub async fn apply(&self, mutation: Mutation) -> Result<Committed, SyncError> {
        match mutation {
            Mutation::Create(payload) => self.create(payload).await.map(Committed::Created),
            Mutation::Update { id, patch, if_match } => self.update(&id, patch, if_match).await.map(Committed::Updated),
            Mutation::Delete { id, if_match } => {
                self.delete(&id, if_match).await?;
                Ok(Committed::Deleted(id))
            }
        }
    }

    /// Creates a record and caches it.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub async fn create(&self, payload: Payload) -> Result<Record, SyncError> {
        const KIND: &str = "create";

        let payload = payload
            .validate()
            .map_err(SyncError::from)
            .inspect_err(|error| reject(KIND, WriteStage::Validate, error))?;

        let ticket = self.cache.ticket();
        let record = self
            .store
            .create(payload)
            .await
            .map_err(SyncError::from)
            .inspect_err(|error| reject(KIND, WriteStage::CommitToStore, error))?;

        self.write_through(ticket, &record).await;
        self.invalidate_listings().await;

        respond(KIND, &record.id);
        Ok(record)
    }

    /// Patches a record and replaces its cache entry.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub async fn update(&self, id: &RecordId, patch: Patch, if_match: Option<Validator>) -> Result<Record, SyncError> {
        const KIND: &str = "update";

        let (patch, expected) = patch
            .validate()
            .map_err(SyncError::from)
            .and_then(|patch| Ok((patch, self.expectation(if_match)?)))
            .inspect_err(|error| reject(KIND, WriteStage::Validate, error))?;

        let ticket = self.cache.ticket();
        let record = self
            .commit_update(id, patch, expected)
            .await
            .inspect_err(|error| reject(KIND, WriteStage::CommitToStore, error))?;

        self.write_through(ticket, &record).await;
        self.invalidate_listings().await;

        respond(KIND, id);
        Ok(record)
    }

    /// Deletes a record and evicts it from the cache.
    ///
    /// # Errors
    ///
    /// See [`apply`](Self::apply).
    pub async fn delete(&self, id: &RecordId, if_match: Option<Validator>) -> Result<(), SyncError> {
        const KIND: &str = "delete";

        let expected = self
            .expectation(if_match)
            .inspect_err(|error| reject(KIND, WriteStage::Validate, error))?;

        self.commit_delete(id, expected)
            .await
            .inspect_err(|error| reject(KIND, WriteStage::CommitToStore, error))?;

        self.evict_record(id).await;
        self.invalidate_listings().await;

        respond(KIND, id);
        Ok(())
    }

    fn expectation(&self, if_match: Option<Validator>) -> Result<Expected, SyncError> {
        Ok(Expected::from_if_match(if_match, self.require_precondition)?)
    }

    async fn commit_update(&self, id: &RecordId, patch: Patch, expected: Expected) -> Result<Record, SyncError> {
        let expected = self.expected_revision(id, expected).await?;
        Ok(self.store.update(id, patch, expected).await?)
    }

    async fn commit_delete(&self, id: &RecordId, expected: Expected) -> Result<(), SyncError> {
        let expected = self.expected_revision(id, expected).await?;
        Ok(self.store.delete(id, expected).await?)
    }

    /// Resolves the precondition to a revision, failing writes whose validator can never match.
    async fn expected_revision(&self, id: &RecordId, expected: Expected) -> Result<Option<Revision>, SyncError> {
        match expected {
            Expected::Any => Ok(None),
            Expected::Revision(revision) => Ok(Some(revision)),
            Expected::Unmatchable(validator) => {
                let current = self.store.get(id).await?;
                Err(SyncError::StaleWrite {
                    id: id.clone(),
                    expected: validator,
                    actual: current.validator(),
                })
            }
        }
    }

    async fn invalidate_listings(&self) {
        if let Err(error) = self.cache.invalidate_prefix(LIST_PREFIX).await {
            tracing::error!(
                write.stage = WriteStage::PropagateCache.as_str(),
                error = %error,
                "failed to invalidate cached listings"
            );
        }
    }

    /// Replaces the record's cache entry, or evicts it if the key changed since `ticket`.
    async fn write_through(&self, ticket: FillTicket, record: &Record) {
        let key = record_key(&record.id);
        let result = self
            .cache
            .put_if_unchanged(
                ticket,
                &key,
                Resource::Record(record.clone()),
                record.validator(),
                self.cache.policy(),
            )
            .await;

        match result {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                write.stage = WriteStage::PropagateCache.as_str(),
                record.id = %record.id,
                "record changed during the write, evicted instead"
            ),
            Err(error) => {
                tracing::warn!(
                    write.stage = WriteStage::PropagateCache.as_str(),
                    record.id = %record.id,
                    error = %error,
                    "write-through failed, invalidating instead"
                );
                self.evict_record(&record.id).await;
            }
        }
    }

    async fn evict_record(&self, id: &RecordId) {
        if let Err(error) = self.cache.invalidate(&record_key(id)).await {
            tracing::error!(
                write.stage = WriteStage::PropagateCache.as_str(),
                record.id = %id,
                error = %error,
                "failed to invalidate cached record"
            );
        }
    }
}

fn respond(kind: &'static str, id: &RecordId) {
    tracing::info!(
        write.kind = kind,
        write.stage = WriteStage::Respond.as_str(),
        record.id = %id,
        "write committed"
    );
}

fn reject(kind: &'static str, stage: WriteStage, error: &SyncError) {
    tracing::info!(write.kind = kind, write.stage = stage.as_str(), error = %error, "write rejected");
}
