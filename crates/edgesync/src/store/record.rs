// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{fmt, time::SystemTime};

use edgesync_tier::Validator;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::Xxh3;

use crate::store::Payload;

/// Opaque identifier of a record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Wraps an existing identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Monotonic version number assigned by the durable store on every successful write.
///
/// A record's validator is derived from its revision, so a new revision always means a new
/// validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Wraps a raw revision number.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw revision number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Renders the revision as a record validator (`r<revision>`).
    #[must_use]
    pub fn to_validator(self) -> Validator {
        Validator::new(format!("r{}", self.0))
    }

    /// Reads a revision back from a record validator.
    ///
    /// Returns `None` if the validator was not produced by [`to_validator`](Self::to_validator).
    #[must_use]
    pub fn from_validator(validator: &Validator) -> Option<Self> {
        let digits = validator.as_str().strip_prefix('r')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single item owned by the durable store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier of the record.
    pub id: RecordId,
    /// Revision assigned by the last successful write.
    pub revision: Revision,
    /// When the record was created.
    pub created_at: SystemTime,
    /// When the record was last written.
    pub last_modified: SystemTime,
    /// The record's content.
    pub payload: Payload,
}

impl Record {
    /// The validator served with this record.
    #[must_use]
    pub fn validator(&self) -> Validator {
        self.revision.to_validator()
    }
}

/// An ordered collection of records with a collection-level validator.
///
/// The validator covers membership, order and the revision of every member, so any change to
/// the listing produces a different validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordList {
    records: Vec<Record>,
    validator: Validator,
}

impl RecordList {
    /// Builds a listing and computes its validator.
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        let validator = list_validator(&records);
        Self { records, validator }
    }

    /// The records in listing order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the listing and returns its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// The collection-level validator.
    #[must_use]
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Number of records in the listing.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the listing has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn list_validator(records: &[Record]) -> Validator {
    let mut hasher = Xxh3::new();
    for record in records {
        hasher.update(record.id.as_str().as_bytes());
        hasher.update(&[0]);
        hasher.update(&record.revision.get().to_le_bytes());
    }
    Validator::new(format!("l{}-{:016x}", records.len(), hasher.digest()))
}

/// Ordering of a listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Oldest first.
    #[default]
    CreatedAsc,
    /// Newest first.
    CreatedDesc,
    /// Alphabetical by title.
    TitleAsc,
    /// Reverse alphabetical by title.
    TitleDesc,
}

impl SortOrder {
    /// Stable name used in cache keys.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreatedAsc => "created_asc",
            Self::CreatedDesc => "created_desc",
            Self::TitleAsc => "title_asc",
            Self::TitleDesc => "title_desc",
        }
    }
}

/// Parameters of a collection listing.
///
/// Two filters that select the same records in the same order produce the same
/// [`cache_params`](Self::cache_params), and therefore share a cache entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListFilter {
    /// Only records whose `completed` flag matches, or all records when `None`.
    pub completed: Option<bool>,
    /// Ordering of the listing.
    pub sort: SortOrder,
}

impl ListFilter {
    /// Lists every record in creation order.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the listing to records with the given `completed` flag.
    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Sets the ordering.
    #[must_use]
    pub fn sorted_by(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Canonical parameter string used as the cache key suffix.
    #[must_use]
    pub fn cache_params(&self) -> String {
        let completed = match self.completed {
            None => "any",
            Some(true) => "true",
            Some(false) => "false",
        };
        format!("completed={completed}&sort={}", self.sort.as_str())
    }

    /// Returns `true` if `record` belongs in this listing.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        self.completed.is_none_or(|completed| record.payload.completed == completed)
    }

    /// Selects and orders records.
    ///
    /// `records` must be in creation order.
    #[must_use]
    pub fn apply<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> RecordList {
        let mut selected: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).cloned().collect();

        match self.sort {
            SortOrder::CreatedAsc => {}
            SortOrder::CreatedDesc => selected.reverse(),
            SortOrder::TitleAsc => selected.sort_by(|a, b| a.payload.title.cmp(&b.payload.title)),
            SortOrder::TitleDesc => selected.sort_by(|a, b| b.payload.title.cmp(&a.payload.title)),
        }

        RecordList::new(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, revision: u64, title: &str, completed: bool) -> Record {
        Record {
            id: RecordId::new(id),
            revision: Revision::new(revision),
            created_at: SystemTime::UNIX_EPOCH,
            last_modified: SystemTime::UNIX_EPOCH,
            payload: Payload::new(title, completed),
        }
    }

    #[test]
    fn revision_validator_round_trips() {
        let revision = Revision::new(42);
        assert_eq!(revision.to_validator().as_str(), "r42");
        assert_eq!(Revision::from_validator(&revision.to_validator()), Some(revision));
    }

    #[test]
    fn foreign_validators_are_not_revisions() {
        for raw in ["", "r", "42", "r-1", "r4x", "l1-00ff", "R4"] {
            assert_eq!(Revision::from_validator(&Validator::new(raw)), None, "{raw:?}");
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn list_validator_tracks_membership_order_and_revisions() {
        let a = record("a", 1, "alpha", false);
        let b = record("b", 2, "beta", false);

        let base = RecordList::new(vec![a.clone(), b.clone()]);
        let reordered = RecordList::new(vec![b.clone(), a.clone()]);
        let shorter = RecordList::new(vec![a.clone()]);
        let bumped = RecordList::new(vec![a.clone(), record("b", 3, "beta", false)]);

        assert_eq!(base.validator(), RecordList::new(vec![a, b]).validator());
        assert_ne!(base.validator(), reordered.validator());
        assert_ne!(base.validator(), shorter.validator());
        assert_ne!(base.validator(), bumped.validator());
        assert!(base.validator().as_str().starts_with("l2-"));
    }

    #[test]
    fn empty_listing_has_a_validator() {
        let list = RecordList::new(Vec::new());
        assert!(list.is_empty());
        assert!(list.validator().as_str().starts_with("l0-"));
    }

    #[test]
    fn cache_params_are_canonical() {
        assert_eq!(ListFilter::all().cache_params(), "completed=any&sort=created_asc");
        assert_eq!(
            ListFilter::all().completed(true).sorted_by(SortOrder::TitleDesc).cache_params(),
            "completed=true&sort=title_desc"
        );
        assert_eq!(ListFilter::all().completed(false).cache_params(), "completed=false&sort=created_asc");
    }

    #[test]
    fn apply_filters_and_sorts() {
        let records = [
            record("1", 1, "walk dog", false),
            record("2", 2, "buy milk", true),
            record("3", 3, "call mom", false),
        ];

        let open = ListFilter::all().completed(false).apply(&records);
        let open_ids: Vec<_> = open.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(open_ids, ["1", "3"]);

        let newest = ListFilter::all().sorted_by(SortOrder::CreatedDesc).apply(&records);
        let newest_ids: Vec<_> = newest.records().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(newest_ids, ["3", "2", "1"]);

        let by_title = ListFilter::all().sorted_by(SortOrder::TitleAsc).apply(&records);
        let titles: Vec<_> = by_title.records().iter().map(|r| r.payload.title.as_str()).collect();
        assert_eq!(titles, ["buy milk", "call mom", "walk dog"]);
    }
}
