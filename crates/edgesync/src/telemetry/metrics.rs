// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use opentelemetry::{
    InstrumentationScope,
    metrics::{Counter, Gauge, Histogram, MeterProvider},
};

const SCOPE: &str = "edgesync";
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

const EVENT_COUNT: &str = "cache.event.count";
const OPERATION_DURATION: &str = "cache.operation.duration";
const ENTRY_COUNT: &str = "cache.size";

/// The instruments cache events are recorded on.
#[derive(Clone, Debug)]
pub(crate) struct Instruments {
    pub(crate) event_counter: Counter<u64>,
    pub(crate) operation_duration: Histogram<f64>,
    pub(crate) cache_size: Gauge<u64>,
}

impl Instruments {
    pub(crate) fn new(provider: &dyn MeterProvider) -> Self {
        let meter = provider.meter_with_scope(InstrumentationScope::builder(SCOPE).with_version(SCOPE_VERSION).build());

        Self {
            event_counter: meter
                .u64_counter(EVENT_COUNT)
                .with_description("Cache lookups, writes and evictions, by operation and activity")
                .with_unit("{event}")
                .build(),
            operation_duration: meter
                .f64_histogram(OPERATION_DURATION)
                .with_description("Time spent in the cache tier per operation")
                .with_unit("s")
                .build(),
            cache_size: meter
                .u64_gauge(ENTRY_COUNT)
                .with_description("Entries held by the cache tier")
                .with_unit("{entry}")
                .build(),
        }
    }
}
