// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use edgesync_tier::TtlPolicy;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CAPACITY, DEFAULT_READ_RETRY_BACKOFF, DEFAULT_REQUIRE_PRECONDITION, DEFAULT_REVALIDATION_TIMEOUT};

/// Settings of an [`EdgeSync`](crate::EdgeSync) instance that can be loaded from configuration.
///
/// Missing fields take their defaults; unknown fields are rejected.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use edgesync::EdgeSyncOptions;
///
/// let options: EdgeSyncOptions = serde_json::from_str(
///     r#"{ "ttl": { "soft_ttl": { "secs": 2, "nanos": 0 }, "hard_ttl": { "secs": 30, "nanos": 0 } }, "capacity": 500 }"#,
/// )?;
///
/// assert_eq!(options.ttl.hard_ttl(), Duration::from_secs(30));
/// assert_eq!(options.capacity, 500);
/// assert!(options.require_precondition);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EdgeSyncOptions {
    /// Freshness windows of cached records and listings.
    pub ttl: TtlPolicy,
    /// Maximum number of cached entries.
    pub capacity: u64,
    /// Delay before retrying a read that found the store unavailable.
    pub read_retry_backoff: Duration,
    /// Upper bound on one background revalidation; `None` for no bound.
    pub revalidation_timeout: Option<Duration>,
    /// Whether updates and deletes must carry an `If-Match` validator.
    pub require_precondition: bool,
}

impl Default for EdgeSyncOptions {
    fn default() -> Self {
        Self {
            ttl: TtlPolicy::default(),
            capacity: DEFAULT_CAPACITY,
            read_retry_backoff: DEFAULT_READ_RETRY_BACKOFF,
            revalidation_timeout: Some(DEFAULT_REVALIDATION_TIMEOUT),
            require_precondition: DEFAULT_REQUIRE_PRECONDITION,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let options = EdgeSyncOptions::default();

        assert_eq!(options.ttl.soft_ttl(), Duration::from_secs(5));
        assert_eq!(options.ttl.hard_ttl(), Duration::from_secs(60));
        assert_eq!(options.capacity, 10_000);
        assert_eq!(options.read_retry_backoff, Duration::from_millis(50));
        assert_eq!(options.revalidation_timeout, Some(Duration::from_secs(10)));
        assert!(options.require_precondition);
    }

    #[test]
    fn empty_config_is_the_default() {
        let options: EdgeSyncOptions = serde_json::from_value(json!({})).expect("valid options");
        assert_eq!(options, EdgeSyncOptions::default());
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        let config = json!({
            "ttl": {
                "soft_ttl": { "secs": 90, "nanos": 0 },
                "hard_ttl": { "secs": 60, "nanos": 0 }
            }
        });
        assert!(serde_json::from_value::<EdgeSyncOptions>(config).is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_value::<EdgeSyncOptions>(json!({ "ttl_secs": 5 })).is_err());
    }

    #[test]
    fn options_survive_serialization() {
        let options = EdgeSyncOptions {
            revalidation_timeout: None,
            require_precondition: false,
            ..EdgeSyncOptions::default()
        };

        let json = serde_json::to_value(&options).expect("serializable");
        assert_eq!(serde_json::from_value::<EdgeSyncOptions>(json).expect("deserializable"), options);
    }
}
