// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache entries, freshness rules and storage tier abstractions.
//!
//! This crate defines the vocabulary shared by every cache backend used by `edgesync`:
//!
//! - [`CacheKey`] identifies a cached resource, such as `record:<id>` or `list:<params>`.
//! - [`Validator`] is the opaque version token served alongside a value. Validators are compared
//!   by exact string equality.
//! - [`TtlPolicy`] pairs a soft TTL (freshness window) with a hard TTL (maximum usable age).
//! - [`CacheEntry`] is a stored value with its validator and freshness timestamps, and
//!   [`Freshness`] classifies an entry at a point in time.
//! - [`CacheTier`] is the storage trait backends implement.
//!
//! # Freshness
//!
//! An entry is [`Freshness::Fresh`] while `now < stale_after`, [`Freshness::Stale`] while
//! `stale_after <= now < expires_after`, and [`Freshness::Expired`] afterwards.
//!
//! ```
//! use std::time::{Duration, SystemTime};
//!
//! use edgesync_tier::{CacheEntry, Freshness, TtlPolicy, Validator};
//!
//! let policy = TtlPolicy::new(Duration::from_secs(5), Duration::from_secs(60))?;
//! let now = SystemTime::UNIX_EPOCH;
//! let entry = CacheEntry::new("value", Validator::new("r1"), now, &policy);
//!
//! assert_eq!(entry.freshness(now), Freshness::Fresh);
//! assert_eq!(entry.freshness(now + Duration::from_secs(6)), Freshness::Stale);
//! assert_eq!(entry.freshness(now + Duration::from_secs(65)), Freshness::Expired);
//! # Ok::<(), edgesync_tier::InvalidTtlPolicy>(())
//! ```

mod entry;
pub mod error;
mod key;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;
pub(crate) mod tier;
mod ttl;
mod validator;

#[doc(inline)]
pub use entry::{CacheEntry, Freshness, Lookup};
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use key::CacheKey;
#[doc(inline)]
pub use tier::CacheTier;
#[doc(inline)]
pub use ttl::{DEFAULT_HARD_TTL, DEFAULT_SOFT_TTL, InvalidTtlPolicy, MAX_TTL, TtlPolicy};
#[doc(inline)]
pub use validator::Validator;
