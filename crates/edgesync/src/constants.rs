// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// Default number of entries the in-memory cache holds before evicting the least recently used.
pub(crate) const DEFAULT_CAPACITY: u64 = 10_000;

/// Default name reported in cache telemetry.
pub(crate) const DEFAULT_CACHE_NAME: &str = "edgesync";

/// Delay before the single retry of a read that found the store unavailable.
pub(crate) const DEFAULT_READ_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Upper bound on one background revalidation. A revalidation that takes longer is abandoned
/// and the stale entry stays in place.
pub(crate) const DEFAULT_REVALIDATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Updates and deletes must name the validator they expect.
pub(crate) const DEFAULT_REQUIRE_PRECONDITION: bool = true;
