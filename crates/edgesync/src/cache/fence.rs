// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use edgesync_tier::CacheKey;
use tokio::sync::{Mutex, MutexGuard};

/// Distinct keys and prefixes remembered before the marks are folded into a layer-wide floor.
const MAX_MARKS: usize = 4096;

/// Proof of the cache state a fill's load started from.
///
/// Obtained from [`CacheLayer::ticket`](crate::cache::CacheLayer::ticket) before loading a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillTicket(u64);

/// Orders fills against mutations, key by key.
///
/// Every mutation takes the next sequence number and marks the key, prefix or whole layer it
/// touched. A ticket is admitted for a key unless a mark covering that key is newer than it.
#[derive(Debug, Default)]
pub(crate) struct FillFence {
    sequence: AtomicU64,
    marks: Mutex<Marks>,
}

#[derive(Debug, Default)]
struct Marks {
    floor: u64,
    keys: HashMap<CacheKey, u64>,
    prefixes: HashMap<String, u64>,
}

impl Marks {
    fn reset(&mut self, floor: u64) {
        self.floor = floor;
        self.keys.clear();
        self.prefixes.clear();
    }
}

/// Holds the fence while a fill or mutation reaches the tier.
pub(crate) struct Fenced<'a> {
    marks: MutexGuard<'a, Marks>,
    sequence: &'a AtomicU64,
}

impl FillFence {
    pub(crate) fn ticket(&self) -> FillTicket {
        FillTicket(self.sequence.load(Ordering::Acquire))
    }

    pub(crate) async fn lock(&self) -> Fenced<'_> {
        Fenced {
            marks: self.marks.lock().await,
            sequence: &self.sequence,
        }
    }
}

impl Fenced<'_> {
    /// Returns `true` if nothing covering `key` was mutated since `ticket` was taken.
    pub(crate) fn admits(&self, ticket: FillTicket, key: &CacheKey) -> bool {
        let marks = &*self.marks;
        ticket.0 >= marks.floor
            && marks.keys.get(key).is_none_or(|&at| at <= ticket.0)
            && marks
                .prefixes
                .iter()
                .all(|(prefix, &at)| at <= ticket.0 || !key.has_prefix(prefix))
    }

    pub(crate) fn mark_key(&mut self, key: &CacheKey) {
        let at = self.advance();
        if self.marks.keys.len() >= MAX_MARKS && !self.marks.keys.contains_key(key) {
            self.marks.reset(at);
        } else {
            self.marks.keys.insert(key.clone(), at);
        }
    }

    pub(crate) fn mark_prefix(&mut self, prefix: &str) {
        let at = self.advance();
        if self.marks.prefixes.len() >= MAX_MARKS && !self.marks.prefixes.contains_key(prefix) {
            self.marks.reset(at);
        } else {
            self.marks.prefixes.insert(prefix.to_owned(), at);
        }
    }

    pub(crate) fn mark_all(&mut self) {
        let at = self.advance();
        self.marks.reset(at);
    }

    fn advance(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_on<F: Future>(f: F) -> F::Output {
        futures::executor::block_on(f)
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name)
    }

    #[test]
    fn tickets_survive_fills() {
        block_on(async {
            let fence = FillFence::default();
            let first = fence.ticket();
            let second = fence.ticket();

            assert!(fence.lock().await.admits(first, &key("record:1")));
            assert!(fence.lock().await.admits(second, &key("record:1")));
        });
    }

    #[test]
    fn key_mutation_rejects_only_that_key() {
        block_on(async {
            let fence = FillFence::default();
            let before = fence.ticket();

            fence.lock().await.mark_key(&key("record:1"));

            let fenced = fence.lock().await;
            assert!(!fenced.admits(before, &key("record:1")));
            assert!(fenced.admits(before, &key("record:2")));
            assert!(fenced.admits(fence.ticket(), &key("record:1")));
        });
    }

    #[test]
    fn prefix_mutation_rejects_keys_under_it() {
        block_on(async {
            let fence = FillFence::default();
            let before = fence.ticket();

            fence.lock().await.mark_prefix("list:");

            let fenced = fence.lock().await;
            assert!(!fenced.admits(before, &key("list:all")));
            assert!(fenced.admits(before, &key("record:1")));
        });
    }

    #[test]
    fn clearing_rejects_every_outstanding_ticket() {
        block_on(async {
            let fence = FillFence::default();
            let before = fence.ticket();
            fence.lock().await.mark_key(&key("record:1"));

            fence.lock().await.mark_all();

            let fenced = fence.lock().await;
            assert!(!fenced.admits(before, &key("record:2")));
            assert!(fenced.admits(fence.ticket(), &key("record:1")));
        });
    }

    #[test]
    fn too_many_marks_fold_into_the_floor() {
        block_on(async {
            let fence = FillFence::default();
            let before = fence.ticket();

            let mut fenced = fence.lock().await;
            for i in 0..=MAX_MARKS {
                fenced.mark_key(&key(&format!("record:{i}")));
            }

            assert!(fenced.marks.keys.is_empty());
            assert!(!fenced.admits(before, &key("record:unrelated")));
            assert!(fenced.admits(fence.ticket(), &key("record:0")));
        });
    }
}
