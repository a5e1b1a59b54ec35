//! Main poll loop
//!
//! On a fixed interval, fetches every block past the watermark up to the
//! chain head, pushes the logs through the event pipeline and advances the
//! watermark to the head. Ticks run one at a time; a tick that overruns the
//! interval makes the loop skip the missed ticks instead of queueing them.

use crate::chain::ChainClient;
use crate::error::{ChainError, FetchError};
use crate::fetcher::{ChunkedRangeFetcher, FailedChunk};
use crate::pipeline::{EventPipeline, IngestStats};
use crate::records::Checkpoint;
use crate::sink::EventSink;
use crate::store::CheckpointStore;
use crate::types::BlockRange;
use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Lifecycle of a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

/// What happened during a tick that fetched something.
#[derive(Debug)]
pub struct TickReport {
    pub range: BlockRange,
    /// Raw logs returned by the fetch
    pub fetched: usize,
    pub stats: IngestStats,
    /// Sub-ranges lost to errors; the watermark moved past them anyway
    pub failed_chunks: Vec<FailedChunk>,
}

#[derive(Debug)]
pub enum TickOutcome {
    /// `current_block` failed; watermark unchanged
    HeadUnavailable(ChainError),
    /// No blocks past the watermark
    UpToDate { latest: u64 },
    Processed(TickReport),
    /// The fetcher refused its arguments; watermark unchanged
    Aborted(FetchError),
}

/// Interval-driven catch-up loop over one contract.
pub struct Poller<C: ?Sized, S> {
    fetcher: ChunkedRangeFetcher<C>,
    pipeline: EventPipeline<S>,
    checkpoint: Option<Box<dyn CheckpointStore>>,
    last_processed_block: u64,
    interval: Duration,
    state: PollState,
}

impl<C: ChainClient + ?Sized, S: EventSink> Poller<C, S> {
    /// Create a poller whose first tick fetches from `start_block + 1`.
    pub fn new(fetcher: ChunkedRangeFetcher<C>, pipeline: EventPipeline<S>, start_block: u64) -> Self {
        Self {
            fetcher,
            pipeline,
            checkpoint: None,
            last_processed_block: start_block,
            interval: DEFAULT_POLL_INTERVAL,
            state: PollState::Idle,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Persist the watermark in `store` after every advancing tick.
    ///
    /// A checkpoint already stored for this contract replaces the start block.
    pub fn with_checkpoint(mut self, store: Box<dyn CheckpointStore>) -> Result<Self> {
        let contract = self.fetcher.address();
        if let Some(checkpoint) = store
            .load(contract)
            .context("Failed to load checkpoint")?
        {
            info!(
                block = checkpoint.last_processed_block,
                updated_at = checkpoint.updated_at,
                "resuming from checkpoint"
            );
            self.last_processed_block = checkpoint.last_processed_block;
        }
        self.checkpoint = Some(store);
        Ok(self)
    }

    pub fn last_processed_block(&self) -> u64 {
        self.last_processed_block
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> TickOutcome {
        self.state = PollState::Polling;
        let outcome = self.poll_once().await;
        self.state = PollState::Idle;
        outcome
    }

    async fn poll_once(&mut self) -> TickOutcome {
        let latest = match self.fetcher.client().current_block().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(error = %e, watermark = self.last_processed_block, "failed to get latest block, skipping tick");
                return TickOutcome::HeadUnavailable(e);
            }
        };

        if latest <= self.last_processed_block {
            debug!(latest, watermark = self.last_processed_block, "up to date");
            return TickOutcome::UpToDate { latest };
        }

        let range = BlockRange::new(self.last_processed_block + 1, latest);
        info!(from = range.from, to = range.to, "checking new blocks");

        let outcome = match self.fetcher.fetch(range).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(from = range.from, to = range.to, error = %e, "fetch rejected");
                return TickOutcome::Aborted(e);
            }
        };
        let fetched = outcome.events.len();
        let stats = self.pipeline.ingest(outcome.events).await;

        // Advance even when chunks failed; a failed chunk is never revisited.
        for failed in &outcome.failed {
            warn!(from = failed.range.from, to = failed.range.to, error = %failed.error, "blocks skipped");
        }
        self.last_processed_block = latest;
        self.pipeline.advance(latest);
        self.write_checkpoint();

        info!(
            from = range.from,
            to = range.to,
            emitted = stats.emitted,
            duplicates = stats.duplicates,
            failed_chunks = outcome.failed.len(),
            "tick complete"
        );
        TickOutcome::Processed(TickReport {
            range,
            fetched,
            stats,
            failed_chunks: outcome.failed,
        })
    }

    fn write_checkpoint(&mut self) {
        let Some(store) = self.checkpoint.as_mut() else {
            return;
        };
        let checkpoint = Checkpoint::now(self.fetcher.address(), self.last_processed_block);
        if let Err(e) = store.save(&checkpoint) {
            warn!(block = self.last_processed_block, error = %e, "failed to write checkpoint");
        }
    }

    /// Tick on the interval until `shutdown` resolves.
    ///
    /// The first tick fires immediately. Shutdown is only observed between
    /// ticks, so a tick in flight always completes.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            watermark = self.last_processed_block,
            interval_secs = self.interval.as_secs_f64(),
            "starting poll loop"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        self.state = PollState::Idle;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }

        self.state = PollState::Stopped;
        info!(watermark = self.last_processed_block, "poll loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::EventDeduplicator;
    use crate::fetcher::FetchConfig;
    use crate::sink::CollectingSink;
    use crate::store::MemoryCheckpointStore;
    use crate::test_utils::{dev_gov_fee_log, market_executed_log, tx_hash, MockChain, CONTRACT};
    use std::sync::Arc;

    fn poller(chain: &Arc<MockChain>, start: u64) -> (Poller<MockChain, CollectingSink>, CollectingSink) {
        let sink = CollectingSink::new();
        let fetcher = ChunkedRangeFetcher::new(chain.clone(), CONTRACT);
        let pipeline = EventPipeline::new(sink.clone(), EventDeduplicator::default());
        (Poller::new(fetcher, pipeline, start), sink)
    }

    #[tokio::test]
    async fn test_two_ticks_second_is_noop() {
        let chain = Arc::new(MockChain::new(600));
        chain.add_log(dev_gov_fee_log(550, tx_hash(1), 0, 1_500_000, true));
        chain.add_log(market_executed_log(500, tx_hash(2), 0, 1, 0));
        let (mut poller, sink) = poller(&chain, 500);

        match poller.tick().await {
            TickOutcome::Processed(report) => {
                assert_eq!(report.range, BlockRange::new(501, 600));
                assert_eq!(report.stats.emitted, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(poller.last_processed_block(), 600);
        assert_eq!(poller.state(), PollState::Idle);

        let calls = chain.calls().len();
        assert!(matches!(poller.tick().await, TickOutcome::UpToDate { latest: 600 }));
        assert_eq!(chain.calls().len(), calls);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_watermark_advances_past_failed_chunk() {
        let chain = Arc::new(MockChain::new(100));
        chain.broken_blocks.lock().unwrap().insert(50);
        chain.add_log(dev_gov_fee_log(50, tx_hash(1), 0, 1, true));
        let (mut poller, sink) = poller(&chain, 0);

        match poller.tick().await {
            TickOutcome::Processed(report) => {
                assert_eq!(report.failed_chunks.len(), 1);
                assert_eq!(report.failed_chunks[0].range, BlockRange::new(1, 100));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(poller.last_processed_block(), 100);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_head_failure_skips_tick() {
        let chain = Arc::new(MockChain::new(100));
        *chain.head_fails.lock().unwrap() = true;
        let (mut poller, _sink) = poller(&chain, 10);

        assert!(matches!(poller.tick().await, TickOutcome::HeadUnavailable(_)));
        assert_eq!(poller.last_processed_block(), 10);
        assert!(chain.calls().is_empty());

        *chain.head_fails.lock().unwrap() = false;
        assert!(matches!(poller.tick().await, TickOutcome::Processed(_)));
        assert_eq!(poller.last_processed_block(), 100);
    }

    #[tokio::test]
    async fn test_duplicate_log_emitted_once() {
        let chain = Arc::new(MockChain::new(20));
        let log = dev_gov_fee_log(15, tx_hash(0xab), 2, 1, true);
        chain.add_log(log.clone());
        chain.add_log(log);
        let (mut poller, sink) = poller(&chain, 0);

        match poller.tick().await {
            TickOutcome::Processed(report) => {
                assert_eq!(report.fetched, 2);
                assert_eq!(report.stats.duplicates, 1);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_checkpoint_resume_and_write() {
        let chain = Arc::new(MockChain::new(300));
        chain.add_log(dev_gov_fee_log(150, tx_hash(1), 0, 1, true));
        chain.add_log(dev_gov_fee_log(250, tx_hash(2), 0, 1, true));

        let mut store = MemoryCheckpointStore::new();
        store.save(&Checkpoint::now(CONTRACT, 200)).unwrap();

        let (poller, sink) = poller(&chain, 0);
        let mut poller = poller.with_checkpoint(Box::new(store)).unwrap();
        assert_eq!(poller.last_processed_block(), 200);

        poller.tick().await;
        let blocks: Vec<u64> = sink.events().iter().map(|e| e.meta.block_number).collect();
        assert_eq!(blocks, vec![250]);

        let stored = poller
            .checkpoint
            .as_ref()
            .unwrap()
            .load(CONTRACT)
            .unwrap()
            .unwrap();
        assert_eq!(stored.last_processed_block, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_until_shutdown() {
        let chain = Arc::new(MockChain::new(600));
        chain.add_log(dev_gov_fee_log(550, tx_hash(1), 0, 1, true));
        let (mut poller, sink) = poller(&chain, 500);

        poller
            .run(tokio::time::sleep(Duration::from_secs(25)))
            .await;

        // ticks at 0s, 10s and 20s
        assert_eq!(*chain.head_calls.lock().unwrap(), 3);
        assert_eq!(poller.state(), PollState::Stopped);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_lets_tick_finish() {
        let chain = Arc::new(MockChain::new(600));
        chain.add_log(dev_gov_fee_log(590, tx_hash(1), 0, 1, true));
        let sink = CollectingSink::new();
        let fetcher = ChunkedRangeFetcher::new(chain.clone(), CONTRACT).with_config(FetchConfig {
            chunk_size: 40,
            ..FetchConfig::default()
        });
        let pipeline = EventPipeline::new(sink.clone(), EventDeduplicator::default());
        let mut poller = Poller::new(fetcher, pipeline, 500);

        // three chunks with 500ms gaps outlast the shutdown signal
        poller
            .run(tokio::time::sleep(Duration::from_millis(100)))
            .await;

        assert_eq!(poller.last_processed_block(), 600);
        assert_eq!(sink.events().len(), 1);
        assert_eq!(poller.state(), PollState::Stopped);
    }
}
