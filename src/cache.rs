//! Block timestamp cache
//!
//! In-memory cache to avoid repeated `eth_getBlockByNumber` calls when
//! several events share a block.
//!
//! Strategy:
//! - Successful lookups are cached (a block's timestamp never changes)
//! - Failed lookups are not cached, so the next event in that block retries

use crate::chain::ChainClient;
use std::collections::BTreeMap;
use tracing::warn;

/// Cache of block number -> Unix timestamp.
pub struct BlockTimestampCache {
    cache: BTreeMap<u64, u64>,
}

impl BlockTimestampCache {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self {
            cache: BTreeMap::new(),
        }
    }

    /// Cached timestamp for `block`, if any.
    pub fn get(&self, block: u64) -> Option<u64> {
        self.cache.get(&block).copied()
    }

    pub fn insert(&mut self, block: u64, timestamp: u64) {
        self.cache.insert(block, timestamp);
    }

    /// Timestamp for `block`, asking the chain on a miss.
    ///
    /// Returns `None` (and logs) when the lookup fails.
    pub async fn resolve<C: ChainClient + ?Sized>(&mut self, client: &C, block: u64) -> Option<u64> {
        if let Some(ts) = self.get(block) {
            return Some(ts);
        }
        match client.get_block_timestamp(block).await {
            Ok(ts) => {
                self.insert(block, ts);
                Some(ts)
            }
            Err(e) => {
                warn!(block, error = %e, "failed to fetch block timestamp");
                None
            }
        }
    }

    /// Forget blocks below `block`.
    pub fn prune_below(&mut self, block: u64) {
        self.cache = self.cache.split_off(&block);
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for BlockTimestampCache {
    fn default() -> Self {
        Self::new()
    }
}
