// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::store::{RecordId, Revision};

/// Errors reported by a [`DurableStore`](crate::store::DurableStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No record exists with this id.
    #[error("record {0} not found")]
    NotFound(RecordId),

    /// A conditional write found a different revision than expected.
    #[error("record {id} is at revision {actual}, expected revision {expected}")]
    Conflict {
        /// The record that was written.
        id: RecordId,
        /// The revision the caller expected.
        expected: Revision,
        /// The revision the store holds.
        actual: Revision,
    },

    /// The store could not be reached or failed transiently.
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Creates an [`Unavailable`](Self::Unavailable) error from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        Self::Unavailable(cause.to_string())
    }

    /// Returns `true` for [`Unavailable`](Self::Unavailable), the only retryable kind.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
