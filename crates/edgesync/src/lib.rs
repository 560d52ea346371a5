// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Request-scoped edge caching in front of a durable record store.
//!
//! [`EdgeSync`] serves reads of records and listings through a stale-while-revalidate cache and
//! runs writes through the store before bringing the cache in line with them.
//!
//! # Reads
//!
//! Every cached value carries a [`Validator`] and two deadlines derived from a [`TtlPolicy`]:
//!
//! - Before `stale_after` the entry is fresh and served as-is.
//! - Between `stale_after` and `expires_after` the entry is stale. It is still served at once,
//!   and a single background task per key reloads it from the store.
//! - After `expires_after` the entry is never served; the read waits for the store.
//!
//! A store read that fails because the store is unavailable is retried once. When the cache tier
//! itself fails, reads fall back to the store and the failure is logged.
//!
//! # Writes
//!
//! Updates and deletes are conditional on the validator the caller last saw. A write that
//! commits replaces the record's cache entry (or removes it, for a delete) and drops every cached
//! listing, so no later read observes the state from before the write.
//!
//! # Examples
//!
//! ```
//! use edgesync::{EdgeSync, IfNoneMatch, SyncError, store::{InMemoryStore, ListFilter, Payload}};
//! use tick::Clock;
//!
//! # futures::executor::block_on(async {
//! let clock = Clock::new_frozen();
//! let sync = EdgeSync::builder(InMemoryStore::new(&clock), &clock).build();
//!
//! let record = sync.create_record(Payload::new("write docs", false)).await?;
//!
//! let listing = sync.read_list(&ListFilter::all()).await?;
//! assert_eq!(listing.value().len(), 1);
//!
//! let evaluation = sync
//!     .read_record_if_none_match(&record.id, &IfNoneMatch::from(record.validator()))
//!     .await?;
//! assert!(evaluation.is_not_modified());
//!
//! let error = sync.delete_record(&record.id, None).await.unwrap_err();
//! assert!(matches!(error, SyncError::InvalidInput(_)));
//! # Ok::<(), SyncError>(())
//! # }).unwrap();
//! ```
//!
//! # Features
//!
//! - `metrics`: OpenTelemetry instruments for cache events, see [`CacheTelemetry`].
//! - `test-util`: a failure-injecting store wrapper in [`store::testing`] and the mock tier of
//!   `edgesync_tier`.

mod builder;
pub mod cache;
mod conditional;
mod constants;
mod coordinator;
mod error;
pub mod keys;
mod options;
mod resource;
mod retry;
mod served;
pub mod store;
mod sync;
mod telemetry;

#[doc(inline)]
pub use builder::EdgeSyncBuilder;
#[doc(inline)]
pub use conditional::{Evaluation, IfNoneMatch, evaluate};
#[doc(inline)]
pub use coordinator::{Committed, Mutation, MutationCoordinator};
#[doc(inline)]
pub use edgesync_tier::{CacheKey, TtlPolicy, Validator};
#[doc(inline)]
pub use error::{Result, SyncError};
#[doc(inline)]
pub use options::EdgeSyncOptions;
#[doc(inline)]
pub use resource::Resource;
#[doc(inline)]
pub use served::{CacheDirectives, Served, Source};
#[doc(inline)]
pub use sync::EdgeSync;
#[doc(inline)]
pub use telemetry::CacheTelemetry;
