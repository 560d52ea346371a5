// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use edgesync_tier::Validator;

use crate::store::{RecordId, StoreError, ValidationError};

/// Why a request to [`EdgeSync`](crate::EdgeSync) failed.
///
/// Cache failures never appear here: when the cache is unavailable, requests are served from the
/// durable store instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    /// The record does not exist.
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// The request was rejected before reaching the store.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A conditional write named a validator that is no longer current.
    ///
    /// Nothing was written. The caller decides how to merge or retry.
    #[error("stale write to record {id}: expected {expected}, current is {actual}")]
    StaleWrite {
        /// The record that was written.
        id: RecordId,
        /// The validator the caller presented.
        expected: Validator,
        /// The record's current validator.
        actual: Validator,
    },

    /// The durable store could not be reached.
    ///
    /// Reads were retried once before giving up; writes are never retried.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SyncError {
    /// Returns `true` for [`StaleWrite`](Self::StaleWrite).
    #[must_use]
    pub fn is_stale_write(&self) -> bool {
        matches!(self, Self::StaleWrite { .. })
    }
}

impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Conflict { id, expected, actual } => Self::StaleWrite {
                id,
                expected: expected.to_validator(),
                actual: actual.to_validator(),
            },
            StoreError::Unavailable(cause) => Self::StoreUnavailable(cause),
        }
    }
}

/// A specialized [`Result`] type for [`EdgeSync`](crate::EdgeSync) requests.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Revision;

    #[test]
    fn conflicts_become_stale_writes() {
        let error = SyncError::from(StoreError::Conflict {
            id: RecordId::new("a"),
            expected: Revision::new(1),
            actual: Revision::new(4),
        });

        assert_eq!(
            error,
            SyncError::StaleWrite {
                id: RecordId::new("a"),
                expected: Validator::new("r1"),
                actual: Validator::new("r4"),
            }
        );
        assert!(error.is_stale_write());
        assert_eq!(error.to_string(), "stale write to record a: expected r1, current is r4");
    }

    #[test]
    fn store_errors_map_one_to_one() {
        assert_eq!(
            SyncError::from(StoreError::NotFound(RecordId::new("a"))),
            SyncError::NotFound(RecordId::new("a"))
        );
        assert_eq!(
            SyncError::from(StoreError::unavailable("timeout")),
            SyncError::StoreUnavailable("timeout".to_owned())
        );
    }

    #[test]
    fn validation_errors_are_invalid_input() {
        let error: SyncError = ValidationError::EmptyTitle.into();
        assert_eq!(error.to_string(), "invalid input: title must not be empty");
    }
}
