//! Real-time log subscription
//!
//! Opens one push subscription per event kind and drains both in a single
//! select loop, so the pipeline and its seen-set keep one owner. The two
//! streams are not ordered relative to each other.

use crate::chain::{LogStream, LogSubscriber};
use crate::error::ChainError;
use crate::events::EventKind;
use crate::pipeline::{EventPipeline, IngestStats};
use crate::sink::EventSink;
use crate::types::RawEvent;
use alloy_primitives::Address;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// Why [`LiveSubscription::run`] returned.
#[derive(Debug)]
pub enum SubscriptionEnd {
    Shutdown,
    /// A stream failed or closed. Not retried.
    Dropped { kind: EventKind, error: ChainError },
}

pub struct LiveSubscription<L: ?Sized, S> {
    subscriber: Arc<L>,
    address: Address,
    pipeline: EventPipeline<S>,
    stats: IngestStats,
    /// Highest block seen on either stream
    head: u64,
}

impl<L: LogSubscriber + ?Sized, S: EventSink> LiveSubscription<L, S> {
    pub fn new(subscriber: Arc<L>, address: Address, pipeline: EventPipeline<S>) -> Self {
        Self {
            subscriber,
            address,
            pipeline,
            stats: IngestStats::default(),
            head: 0,
        }
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }

    async fn open(&self, kind: EventKind, from_block: Option<u64>) -> Result<LogStream, ChainError> {
        let stream = self
            .subscriber
            .subscribe_logs(self.address, &[kind.topic()], from_block)
            .await?;
        info!(event = kind.name(), "subscribed");
        Ok(stream)
    }

    /// Subscribe to both events and emit until `shutdown` resolves or a
    /// stream drops.
    ///
    /// Fails only if a subscription cannot be opened.
    pub async fn run<F>(
        &mut self,
        from_block: Option<u64>,
        shutdown: F,
    ) -> Result<SubscriptionEnd, ChainError>
    where
        F: Future<Output = ()>,
    {
        let mut fees = self.open(EventKind::DevGovFeeCharged, from_block).await?;
        let mut executions = self.open(EventKind::MarketExecuted, from_block).await?;
        tokio::pin!(shutdown);
        let mut executions_first = false;

        loop {
            let (kind, item) = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("unsubscribing");
                    return Ok(SubscriptionEnd::Shutdown);
                }
                next = next_item(&mut fees, &mut executions, executions_first) => next,
            };
            executions_first = !executions_first;

            match item {
                Some(Ok(raw)) => self.handle(raw).await,
                Some(Err(e)) => {
                    error!(event = kind.name(), error = %e, "subscription dropped");
                    return Ok(SubscriptionEnd::Dropped { kind, error: e });
                }
                None => {
                    let e = ChainError::SubscriptionClosed("stream ended".to_string());
                    error!(event = kind.name(), error = %e, "subscription dropped");
                    return Ok(SubscriptionEnd::Dropped { kind, error: e });
                }
            }
        }
    }

    async fn handle(&mut self, raw: RawEvent) {
        let block = raw.block_number;
        let stats = self.pipeline.ingest(vec![raw]).await;
        self.stats.merge(stats);
        if block > self.head {
            self.head = block;
            self.pipeline.advance(block);
        }
    }
}

/// Receive from whichever stream is ready, checking `executions` first when
/// asked so a busy stream cannot starve the other.
async fn next_item(
    fees: &mut LogStream,
    executions: &mut LogStream,
    executions_first: bool,
) -> (EventKind, Option<Result<RawEvent, ChainError>>) {
    if executions_first {
        tokio::select! {
            biased;
            item = executions.recv() => (EventKind::MarketExecuted, item),
            item = fees.recv() => (EventKind::DevGovFeeCharged, item),
        }
    } else {
        tokio::select! {
            biased;
            item = fees.recv() => (EventKind::DevGovFeeCharged, item),
            item = executions.recv() => (EventKind::MarketExecuted, item),
        }
    }
}
