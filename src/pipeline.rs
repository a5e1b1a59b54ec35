//! Decode, deduplicate and emit
//!
//! The tail shared by the poll loop and the live subscription: raw logs in,
//! new decoded events out to the sink in `(block_number, log_index)` order.

use crate::cache::BlockTimestampCache;
use crate::chain::ChainClient;
use crate::decoder::decode_log;
use crate::dedup::{EventDeduplicator, DEFAULT_RETENTION_BLOCKS};
use crate::events::DecodedEvent;
use crate::sink::EventSink;
use crate::types::{LogIdentity, RawEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters for one ingested batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub received: usize,
    pub emitted: usize,
    pub duplicates: usize,
    pub decode_failures: usize,
    /// Logs flagged `removed` by a reorg notification
    pub removed: usize,
    pub sink_failures: usize,
}

impl IngestStats {
    pub fn merge(&mut self, other: IngestStats) {
        self.received += other.received;
        self.emitted += other.emitted;
        self.duplicates += other.duplicates;
        self.decode_failures += other.decode_failures;
        self.removed += other.removed;
        self.sink_failures += other.sink_failures;
    }
}

struct TimestampSource {
    client: Arc<dyn ChainClient>,
    cache: BlockTimestampCache,
}

/// Owns the seen-set and the sink. Single mutator, no locking.
pub struct EventPipeline<S> {
    dedup: EventDeduplicator,
    sink: S,
    timestamps: Option<TimestampSource>,
}

impl<S: EventSink> EventPipeline<S> {
    pub fn new(sink: S, dedup: EventDeduplicator) -> Self {
        Self {
            dedup,
            sink,
            timestamps: None,
        }
    }

    /// Attach block timestamps to emitted events, looked up through `client`.
    pub fn with_timestamps(mut self, client: Arc<dyn ChainClient>) -> Self {
        self.timestamps = Some(TimestampSource {
            client,
            cache: BlockTimestampCache::new(),
        });
        self
    }

    pub fn dedup(&self) -> &EventDeduplicator {
        &self.dedup
    }

    /// Decode, drop seen identities, sort the rest and emit them.
    ///
    /// An identity is recorded as seen only once the sink accepted it, so
    /// an event the sink rejected is emitted again if it is offered again.
    pub async fn ingest(&mut self, raws: Vec<RawEvent>) -> IngestStats {
        let mut stats = IngestStats {
            received: raws.len(),
            ..IngestStats::default()
        };
        let mut batch: HashSet<LogIdentity> = HashSet::with_capacity(raws.len());
        let mut fresh: Vec<DecodedEvent> = Vec::with_capacity(raws.len());

        for raw in raws {
            if raw.removed {
                debug!(id = %raw.identity(), block = raw.block_number, "ignoring removed log");
                stats.removed += 1;
                continue;
            }
            let id = raw.identity();
            if self.dedup.contains(&id) || batch.contains(&id) {
                stats.duplicates += 1;
                continue;
            }

            let timestamp = match &mut self.timestamps {
                Some(source) => source.cache.resolve(source.client.as_ref(), raw.block_number).await,
                None => None,
            };
            match decode_log(&raw, timestamp) {
                Ok(event) => {
                    batch.insert(id);
                    fresh.push(event);
                }
                Err(e) => {
                    warn!(id = %id, block = raw.block_number, error = %e, "failed to decode log, skipping");
                    stats.decode_failures += 1;
                }
            }
        }

        // stable: equal positions keep arrival order
        fresh.sort_by_key(DecodedEvent::position);

        for event in &fresh {
            match self.sink.emit(event) {
                Ok(()) => {
                    self.dedup.is_new(event.identity(), event.meta.block_number);
                    stats.emitted += 1;
                }
                Err(e) => {
                    warn!(sink = self.sink.name(), id = %event.identity(), error = %e, "sink rejected event");
                    stats.sink_failures += 1;
                }
            }
        }
        stats
    }

    /// Let the seen-set and timestamp cache forget what fell out of the
    /// retention window behind `watermark`.
    ///
    /// Timestamps use the default window when the seen-set is unbounded.
    pub fn advance(&mut self, watermark: u64) {
        let evicted = self.dedup.evict_behind(watermark);
        if evicted > 0 {
            debug!(watermark, evicted, "evicted seen identities");
        }
        if let Some(source) = &mut self.timestamps {
            let retention = self.dedup.retention().unwrap_or(DEFAULT_RETENTION_BLOCKS);
            source.cache.prune_below(watermark.saturating_sub(retention));
        }
    }
}
