// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory cache tier backed by moka.
//!
//! [`InMemoryTier`] is a concurrent, capacity-bounded cache with strict LRU eviction. Expiry is
//! independent of capacity: every entry is dropped once its hard TTL has elapsed, whether or not
//! the tier is full.
//!
//! # Quick Start
//!
//! ```
//! use std::time::SystemTime;
//!
//! use edgesync_memory::InMemoryTier;
//! use edgesync_tier::{CacheEntry, CacheKey, CacheTier, TtlPolicy, Validator};
//!
//! # futures::executor::block_on(async {
//! let tier = InMemoryTier::<String>::builder().max_capacity(1_000).build();
//! let key = CacheKey::new("record:1");
//! let entry = CacheEntry::new("buy milk".to_string(), Validator::new("r1"), SystemTime::now(), &TtlPolicy::default());
//!
//! tier.insert(&key, entry).await?;
//! let stored = tier.get(&key).await?.expect("entry was just inserted");
//! assert_eq!(stored.value(), "buy milk");
//! # Ok::<(), edgesync_tier::Error>(())
//! # }).unwrap();
//! ```

pub mod builder;
pub mod tier;

#[doc(inline)]
pub use builder::InMemoryTierBuilder;
#[doc(inline)]
pub use tier::InMemoryTier;
