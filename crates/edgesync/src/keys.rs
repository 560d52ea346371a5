// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache keys for records and listings.

use edgesync_tier::CacheKey;

use crate::store::{ListFilter, RecordId};

/// Prefix shared by every single-record key.
pub const RECORD_PREFIX: &str = "record:";

/// Prefix shared by every listing key.
pub const LIST_PREFIX: &str = "list:";

/// The key a record is cached under: `record:<id>`.
#[must_use]
pub fn record_key(id: &RecordId) -> CacheKey {
    CacheKey::new(format!("{RECORD_PREFIX}{id}"))
}

/// The key a listing is cached under: `list:<filter params>`.
#[must_use]
pub fn list_key(filter: &ListFilter) -> CacheKey {
    CacheKey::new(format!("{LIST_PREFIX}{}", filter.cache_params()))
}
