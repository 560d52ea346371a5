// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use tick::Clock;

use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

/// The output of a timed future.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Timed<R> {
    pub(crate) result: R,
    pub(crate) duration: Duration,
}

pub(crate) trait ClockExt {
    /// Awaits `f` and measures how long it took on this clock.
    fn timed<F>(&self, f: F) -> impl Future<Output = Timed<F::Output>>
    where
        F: Future;
}

impl ClockExt for Clock {
    async fn timed<F>(&self, f: F) -> Timed<F::Output>
    where
        F: Future,
    {
        let start = self.instant();
        let result = f.await;
        Timed {
            result,
            duration: self.instant().saturating_duration_since(start),
        }
    }
}

pub(crate) trait CacheTelemetryExt {
    fn record(&self, name: &'static str, operation: CacheOperation, activity: CacheActivity, duration: Duration);

    fn record_size(&self, name: &'static str, size: u64);
}

impl CacheTelemetryExt for Option<CacheTelemetry> {
    fn record(&self, name: &'static str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        if let Some(telemetry) = self {
            telemetry.record(name, operation, activity, Some(duration));
        }
    }

    fn record_size(&self, name: &'static str, size: u64) {
        if let Some(telemetry) = self {
            telemetry.record_size(name, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use tick::ClockControl;

    use super::*;
    use crate::telemetry::testing::LogCapture;

    #[test]
    fn timed_measures_on_the_given_clock() {
        futures::executor::block_on(async {
            let control = ClockControl::new();
            let clock = control.to_clock();

            let timed = clock
                .timed(async {
                    control.advance(Duration::from_millis(250));
                    "done"
                })
                .await;

            assert_eq!(timed.result, "done");
            assert_eq!(timed.duration, Duration::from_millis(250));
        });
    }

    #[test]
    fn missing_telemetry_records_nothing() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let telemetry: Option<CacheTelemetry> = None;
        telemetry.record("records", CacheOperation::Get, CacheActivity::Hit, Duration::from_millis(1));
        telemetry.record_size("records", 1);

        assert!(capture.output().is_empty());
    }
}
