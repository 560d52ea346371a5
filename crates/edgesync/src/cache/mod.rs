// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache layer: freshness-aware lookups, stale-while-revalidate reads, fenced fills and
//! invalidation over any [`CacheTier`](edgesync_tier::CacheTier).
//!
//! # Reads
//!
//! [`CacheLayer::read_through`] serves a fresh entry as-is. A stale entry is served immediately
//! and one background revalidation is scheduled for its key, however many readers hit it at
//! once. A miss, an expired entry or an unavailable tier make the caller load the value
//! synchronously.
//!
//! # Fills and mutations
//!
//! Values loaded for reads are installed with [`CacheLayer::fill`] under a [`FillTicket`] taken
//! before the load. A fill is dropped if any mutation ([`put`](CacheLayer::put),
//! [`invalidate`](CacheLayer::invalidate), [`invalidate_prefix`](CacheLayer::invalidate_prefix)
//! or [`clear`](CacheLayer::clear)) happened after its ticket was taken, so a slow read can never
//! reinstall data a write already replaced.

mod builder;
mod fence;
mod in_flight;
mod layer;

pub use builder::CacheLayerBuilder;
pub use fence::FillTicket;
pub use layer::CacheLayer;
