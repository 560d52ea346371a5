// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use edgesync_tier::Validator;

use crate::store::{Record, RecordList};

/// A value held by the cache: either one record or one listing.
///
/// The variant always matches the key family it is stored under (`record:` or `list:`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resource {
    /// A single record.
    Record(Record),
    /// A collection listing.
    List(RecordList),
}

impl Resource {
    /// The validator the resource is served with.
    #[must_use]
    pub fn validator(&self) -> Validator {
        match self {
            Self::Record(record) => record.validator(),
            Self::List(list) => list.validator().clone(),
        }
    }

    /// Returns the record, or `None` for a listing.
    #[must_use]
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::List(_) => None,
        }
    }

    /// Returns the listing, or `None` for a record.
    #[must_use]
    pub fn into_list(self) -> Option<RecordList> {
        match self {
            Self::List(list) => Some(list),
            Self::Record(_) => None,
        }
    }
}

impl From<Record> for Resource {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl From<RecordList> for Resource {
    fn from(list: RecordList) -> Self {
        Self::List(list)
    }
}
