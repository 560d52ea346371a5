// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Structured logs and OpenTelemetry metrics for cache operations.
//!
//! Every operation the cache layer performs is described by a [`CacheOperation`] and the
//! [`CacheActivity`] it resulted in. With logs enabled, each one becomes a `cache.event` tracing
//! event; with the `metrics` feature and a meter provider, each one also increments
//! `cache.event.count` and records `cache.operation.duration`.

use std::time::Duration;

#[cfg(any(feature = "metrics", test))]
use opentelemetry::{KeyValue, metrics::MeterProvider};
use tracing::Level;

pub(crate) mod ext;
#[cfg(any(feature = "metrics", test))]
mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[cfg(any(feature = "metrics", test))]
const CACHE_NAME: &str = "cache.name";
#[cfg(any(feature = "metrics", test))]
const CACHE_OPERATION_NAME: &str = "cache.operation";
#[cfg(any(feature = "metrics", test))]
const CACHE_ACTIVITY_NAME: &str = "cache.activity";

/// Telemetry settings for a cache layer.
///
/// Nothing is recorded until logs or metrics are enabled.
///
/// # Examples
///
/// ```
/// use edgesync::CacheTelemetry;
///
/// let telemetry = CacheTelemetry::new().with_logs();
/// assert!(telemetry.logs_enabled());
/// ```
#[derive(Clone, Debug, Default)]
pub struct CacheTelemetry {
    logging_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

impl CacheTelemetry {
    /// Creates telemetry with everything disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a `tracing` event for every cache operation.
    #[must_use]
    pub fn with_logs(self) -> Self {
        Self {
            logging_enabled: true,
            ..self
        }
    }

    /// Records cache metrics on meters obtained from `provider`.
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn with_metrics(self, provider: &dyn MeterProvider) -> Self {
        Self {
            instruments: Some(metrics::Instruments::new(provider)),
            ..self
        }
    }

    /// Returns `true` if cache events are logged.
    #[must_use]
    pub fn logs_enabled(&self) -> bool {
        self.logging_enabled
    }

    pub(crate) fn record(&self, cache_name: &'static str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            let attrs = [
                KeyValue::new(CACHE_NAME, cache_name),
                KeyValue::new(CACHE_OPERATION_NAME, operation.as_str()),
                KeyValue::new(CACHE_ACTIVITY_NAME, activity.as_str()),
            ];

            instruments.event_counter.add(1, &attrs);
            if let Some(d) = duration {
                instruments.operation_duration.record(d.as_secs_f64(), &attrs);
            }
        }

        if self.logging_enabled {
            Self::emit(cache_name, operation, activity, duration);
        }
    }

    #[cfg_attr(
        not(any(feature = "metrics", test)),
        expect(unused_variables, reason = "size is only recorded as a metric")
    )]
    pub(crate) fn record_size(&self, cache_name: &'static str, size: u64) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.instruments {
            instruments.cache_size.record(size, &[KeyValue::new(CACHE_NAME, cache_name)]);
        }
    }

    fn emit(cache_name: &'static str, operation: CacheOperation, activity: CacheActivity, duration: Option<Duration>) {
        let op = operation.as_str();
        let act = activity.as_str();
        let duration_ns = duration.map(|d| d.as_nanos());

        // The level of a tracing event must be a constant.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.level() {
            Level::ERROR => emit_event!(error),
            Level::WARN => emit_event!(warn),
            Level::INFO => emit_event!(info),
            _ => emit_event!(debug),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Insert,
    Fill,
    Invalidate,
    InvalidatePrefix,
    Clear,
    Revalidate,
    EvictExpired,
}

impl CacheOperation {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Insert => "cache.insert",
            Self::Fill => "cache.fill",
            Self::Invalidate => "cache.invalidate",
            Self::InvalidatePrefix => "cache.invalidate_prefix",
            Self::Clear => "cache.clear",
            Self::Revalidate => "cache.revalidate",
            Self::EvictExpired => "cache.evict_expired",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    StaleHit,
    Miss,
    Expired,
    Inserted,
    Skipped,
    Invalidated,
    Revalidated,
    RevalidationFailed,
    Evicted,
    Error,
}

impl CacheActivity {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::StaleHit => "cache.stale_hit",
            Self::Miss => "cache.miss",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Skipped => "cache.skipped",
            Self::Invalidated => "cache.invalidated",
            Self::Revalidated => "cache.revalidated",
            Self::RevalidationFailed => "cache.revalidation_failed",
            Self::Evicted => "cache.evicted",
            Self::Error => "cache.error",
        }
    }

    pub(crate) fn level(self) -> Level {
        match self {
            Self::Hit | Self::StaleHit | Self::Miss => Level::DEBUG,
            Self::Expired | Self::Inserted | Self::Skipped | Self::Invalidated | Self::Revalidated | Self::Evicted => Level::INFO,
            Self::RevalidationFailed => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::KeyValue;

    use super::*;
    use crate::telemetry::testing::{LogCapture, MetricTester};

    #[test]
    fn operation_names() {
        assert_eq!(CacheOperation::Get.as_str(), "cache.get");
        assert_eq!(CacheOperation::Fill.as_str(), "cache.fill");
        assert_eq!(CacheOperation::InvalidatePrefix.as_str(), "cache.invalidate_prefix");
        assert_eq!(CacheOperation::Revalidate.as_str(), "cache.revalidate");
        assert_eq!(CacheOperation::EvictExpired.as_str(), "cache.evict_expired");
    }

    #[test]
    fn activity_levels() {
        assert_eq!(CacheActivity::Hit.level(), Level::DEBUG);
        assert_eq!(CacheActivity::StaleHit.level(), Level::DEBUG);
        assert_eq!(CacheActivity::Expired.level(), Level::INFO);
        assert_eq!(CacheActivity::Skipped.level(), Level::INFO);
        assert_eq!(CacheActivity::RevalidationFailed.level(), Level::WARN);
        assert_eq!(CacheActivity::Error.level(), Level::ERROR);
    }

    #[test]
    fn metrics_carry_name_operation_and_activity() {
        let tester = MetricTester::new();
        let telemetry = CacheTelemetry::new().with_metrics(tester.meter_provider());

        telemetry.record("records", CacheOperation::Get, CacheActivity::StaleHit, Some(Duration::from_millis(2)));

        tester.assert_attributes_contain(&[
            KeyValue::new(CACHE_NAME, "records"),
            KeyValue::new(CACHE_OPERATION_NAME, "cache.get"),
            KeyValue::new(CACHE_ACTIVITY_NAME, "cache.stale_hit"),
        ]);
    }

    #[test]
    fn size_is_recorded_per_cache() {
        let tester = MetricTester::new();
        let telemetry = CacheTelemetry::new().with_metrics(tester.meter_provider());

        telemetry.record_size("sized", 3);

        tester.assert_attributes_contain(&[KeyValue::new(CACHE_NAME, "sized")]);
    }

    #[test]
    fn logs_contain_every_field() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new().with_logs().record(
            "records",
            CacheOperation::Revalidate,
            CacheActivity::RevalidationFailed,
            Some(Duration::from_nanos(777)),
        );

        capture.assert_contains("cache.event");
        capture.assert_contains("cache.name=\"records\"");
        capture.assert_contains("cache.revalidate");
        capture.assert_contains("cache.revalidation_failed");
        capture.assert_contains("cache.duration_ns=Some(777)");
        capture.assert_contains("WARN");
    }

    #[test]
    fn disabled_telemetry_is_silent() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        CacheTelemetry::new().record("records", CacheOperation::Get, CacheActivity::Error, None);

        assert!(capture.output().is_empty());
    }
}
