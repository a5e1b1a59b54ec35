//! Seen-set of emitted log identities
//!
//! Keeps every identity that passed through so overlapping queries never
//! emit the same log twice. With a retention window, identities older than
//! `retention` blocks behind the watermark are evicted as it advances.

use crate::types::LogIdentity;
use std::collections::{BTreeMap, HashMap};

/// Default retention window in blocks.
pub const DEFAULT_RETENTION_BLOCKS: u64 = 50_000;

/// Bounded set of seen log identities.
#[derive(Debug)]
pub struct EventDeduplicator {
    /// identity -> block number it was seen in
    seen: HashMap<LogIdentity, u64>,
    /// block number -> identities first seen in that block (eviction index)
    by_block: BTreeMap<u64, Vec<LogIdentity>>,
    retention: Option<u64>,
}

impl EventDeduplicator {
    /// Seen-set that never forgets.
    pub fn unbounded() -> Self {
        Self {
            seen: HashMap::new(),
            by_block: BTreeMap::new(),
            retention: None,
        }
    }

    /// Seen-set that forgets identities `retention` blocks behind the watermark.
    pub fn with_retention(retention: u64) -> Self {
        Self {
            retention: Some(retention),
            ..Self::unbounded()
        }
    }

    /// Check-and-insert. Returns true the first time `id` is offered.
    pub fn is_new(&mut self, id: LogIdentity, block_number: u64) -> bool {
        if self.seen.contains_key(&id) {
            return false;
        }
        self.seen.insert(id, block_number);
        self.by_block.entry(block_number).or_default().push(id);
        true
    }

    pub fn retention(&self) -> Option<u64> {
        self.retention
    }

    pub fn contains(&self, id: &LogIdentity) -> bool {
        self.seen.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drop identities from blocks older than `watermark - retention`.
    ///
    /// Returns the number of evicted identities. No-op without a retention window.
    pub fn evict_behind(&mut self, watermark: u64) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };
        let horizon = watermark.saturating_sub(retention);
        let kept = self.by_block.split_off(&horizon);
        let expired = std::mem::replace(&mut self.by_block, kept);

        let mut evicted = 0;
        for id in expired.into_values().flatten() {
            if self.seen.remove(&id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

impl Default for EventDeduplicator {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETENTION_BLOCKS)
    }
}
