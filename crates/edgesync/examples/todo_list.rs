// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A to-do list served through `EdgeSync`.
//!
//! Creates a few items, reads them through the cache, answers a conditional request and shows
//! what happens to a write that carries an outdated validator.

use std::time::Duration;

use edgesync::{
    CacheTelemetry, EdgeSync, Evaluation, IfNoneMatch, SyncError, TtlPolicy,
    store::{InMemoryStore, ListFilter, Patch, Payload},
};
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let clock = Clock::new_tokio();
    let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock)
        .name("todos")
        .ttl(TtlPolicy::new(Duration::from_secs(2), Duration::from_secs(30))?)
        .telemetry(CacheTelemetry::new().with_logs())
        .build();
    let _sweeper = sync.spawn_expiry_sweeper(Duration::from_secs(10));

    let milk = sync.create_record(Payload::new("buy milk", false)).await?;
    sync.create_record_json(&serde_json::json!({ "title": "water plants" })).await?;

    // First listing comes from the store, the second from the cache.
    for _ in 0..2 {
        let listing = sync.read_list(&ListFilter::all()).await?;
        let now = clock.system_time();
        println!(
            "{} items, ETag {}, Cache-Control: {} ({:?})",
            listing.value().len(),
            listing.validator().to_etag(),
            listing.directives(now),
            listing.source(),
        );
    }

    // A client that already has the current version gets a 304.
    let served = sync.read_record(&milk.id).await?;
    let precondition = IfNoneMatch::parse(&served.validator().to_etag()).ok_or("bad header")?;
    match sync.read_record_if_none_match(&milk.id, &precondition).await? {
        Evaluation::NotModified(_) => println!("304 Not Modified"),
        Evaluation::Modified(record) => println!("200 OK: {:?}", record.value()),
    }

    let done = sync
        .update_record(&milk.id, Patch::new().completed(true), Some(served.validator().clone()))
        .await?;
    println!("completed '{}', new ETag {}", done.payload.title, done.validator().to_etag());

    // The validator read before the update is no longer current.
    match sync.delete_record(&milk.id, Some(served.validator().clone())).await {
        Err(SyncError::StaleWrite { expected, actual, .. }) => {
            println!("412 Precondition Failed: sent {expected}, current is {actual}");
        }
        other => println!("unexpected outcome: {other:?}"),
    }

    sync.delete_record(&milk.id, Some(done.validator())).await?;
    let remaining = sync.read_list(&ListFilter::all()).await?;
    println!("{} item left", remaining.value().len());

    Ok(())
}
