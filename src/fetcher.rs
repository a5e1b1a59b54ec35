//! Chunked `eth_getLogs` over a block range
//!
//! Providers cap the span of a single log query and fail transiently, so a
//! range is walked in fixed-size chunks. A chunk rejected as too large is
//! retried in smaller pieces; any other failure drops that chunk and the
//! walk continues.

use crate::chain::ChainClient;
use crate::error::{ChainError, FetchError};
use crate::events::EventKind;
use crate::types::{BlockRange, RawEvent};
use alloy_primitives::{Address, B256};
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_CHUNK_SIZE: u64 = 10_000;
pub const DEFAULT_RETRY_CHUNK_SIZE: u64 = 1_000;

/// Chunking and pacing parameters.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Blocks per query on the primary pass
    pub chunk_size: u64,
    /// First chunk size tried after a range rejection
    pub retry_chunk_size: u64,
    /// Pause between chunks on the primary pass
    pub chunk_delay: Duration,
    /// Pause between chunks on a shrink-retry pass
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_chunk_size: DEFAULT_RETRY_CHUNK_SIZE,
            chunk_delay: Duration::from_millis(500),
            retry_delay: Duration::from_millis(200),
        }
    }
}

/// A sub-range that yielded nothing because every attempt failed.
#[derive(Debug, Clone)]
pub struct FailedChunk {
    pub range: BlockRange,
    pub error: ChainError,
}

/// Result of walking one range.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Logs in chunk order, then topic order within a chunk
    pub events: Vec<RawEvent>,
    pub failed: Vec<FailedChunk>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Walks block ranges for one contract and a fixed list of topic filters.
pub struct ChunkedRangeFetcher<C: ?Sized> {
    client: Arc<C>,
    address: Address,
    /// One `get_logs` query per entry, per chunk
    topic_sets: Vec<Vec<B256>>,
    config: FetchConfig,
}

impl<C: ChainClient + ?Sized> ChunkedRangeFetcher<C> {
    /// Fetcher for both contract events with default pacing.
    pub fn new(client: Arc<C>, address: Address) -> Self {
        Self {
            client,
            address,
            topic_sets: EventKind::ALL.iter().map(|kind| vec![kind.topic()]).collect(),
            config: FetchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the topic filters. Each inner list is one positional filter.
    pub fn with_topic_sets(mut self, topic_sets: Vec<Vec<B256>>) -> Self {
        self.topic_sets = topic_sets;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Fetch `range` with the configured chunk size.
    pub async fn fetch(&self, range: BlockRange) -> Result<FetchOutcome, FetchError> {
        self.fetch_chunked(range, self.config.chunk_size).await
    }

    /// Fetch `range` in chunks of at most `chunk_size` blocks.
    ///
    /// Only invalid arguments fail the call. Chunk failures are logged and
    /// listed in [`FetchOutcome::failed`].
    pub async fn fetch_chunked(
        &self,
        range: BlockRange,
        chunk_size: u64,
    ) -> Result<FetchOutcome, FetchError> {
        if chunk_size == 0 {
            return Err(FetchError::InvalidChunkSize);
        }
        if self.topic_sets.is_empty() {
            return Err(FetchError::NoTopics);
        }

        let mut outcome = FetchOutcome::default();
        if range.is_empty() {
            return Ok(outcome);
        }

        info!(
            range = %range,
            chunk_size,
            chunks = range.len().div_ceil(chunk_size),
            "fetching logs"
        );
        self.fetch_pass(range, chunk_size, self.config.chunk_delay, &mut outcome)
            .await;
        info!(
            range = %range,
            events = outcome.events.len(),
            failed_chunks = outcome.failed.len(),
            "fetch finished"
        );
        Ok(outcome)
    }

    /// Walk `range` in `chunk_size` pieces, recursing into smaller pieces on
    /// range rejections.
    fn fetch_pass<'a>(
        &'a self,
        range: BlockRange,
        chunk_size: u64,
        delay: Duration,
        outcome: &'a mut FetchOutcome,
    ) -> BoxFuture<'a, ()> {
        async move {
            let mut chunks = range.chunks(chunk_size).peekable();
            while let Some(chunk) = chunks.next() {
                match self.fetch_chunk(chunk).await {
                    Ok(events) => {
                        debug!(range = %chunk, events = events.len(), "chunk fetched");
                        outcome.events.extend(events);
                    }
                    Err(err) if err.is_range_limit() => match self.shrink(chunk) {
                        Some(smaller) => {
                            warn!(
                                range = %chunk,
                                error = %err,
                                retry_chunk_size = smaller,
                                "range rejected, retrying in smaller chunks"
                            );
                            self.fetch_pass(chunk, smaller, self.config.retry_delay, outcome)
                                .await;
                        }
                        None => {
                            warn!(range = %chunk, error = %err, "range rejected at minimum size, dropping");
                            outcome.failed.push(FailedChunk { range: chunk, error: err });
                        }
                    },
                    Err(err) => {
                        warn!(range = %chunk, error = %err, "chunk failed, skipping");
                        outcome.failed.push(FailedChunk { range: chunk, error: err });
                    }
                }

                if chunks.peek().is_some() && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
        .boxed()
    }

    /// Query every topic filter over one chunk. Any failing query fails the chunk.
    async fn fetch_chunk(&self, chunk: BlockRange) -> Result<Vec<RawEvent>, ChainError> {
        let mut events = Vec::new();
        for topics in &self.topic_sets {
            let logs = self.client.get_logs(self.address, topics, chunk).await?;
            events.extend(logs);
        }
        Ok(events)
    }

    /// Next chunk size after `chunk` was rejected, or `None` at a single block.
    fn shrink(&self, chunk: BlockRange) -> Option<u64> {
        let span = chunk.len();
        if span <= 1 {
            None
        } else if span > self.config.retry_chunk_size {
            Some(self.config.retry_chunk_size.max(1))
        } else {
            Some((span / 10).max(1))
        }
    }
}
