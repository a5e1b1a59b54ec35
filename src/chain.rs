//! Chain access traits
//!
//! The fetcher, poller and live subscription only talk to the chain
//! through these traits. `rpc::RpcClient` implements the request side over
//! HTTP JSON-RPC, `ws::WsSubscriber` the push side over WebSocket.

use crate::error::ChainError;
use crate::types::{BlockRange, RawEvent};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Request/response access to a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head block number.
    async fn current_block(&self) -> Result<u64, ChainError>;

    /// Logs emitted by `address` in `range` matching positional `topics`.
    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, ChainError>;

    /// Block timestamp in Unix epoch seconds.
    async fn get_block_timestamp(&self, number: u64) -> Result<u64, ChainError>;
}

/// Receiving end of a push subscription.
///
/// Yields `Err` once if the subscription drops, then closes.
pub type LogStream = mpsc::Receiver<Result<RawEvent, ChainError>>;

/// Push access to new logs.
#[async_trait]
pub trait LogSubscriber: Send + Sync {
    /// Subscribe to logs of `address` matching `topics`, starting at `from_block`
    /// when the node supports it, otherwise at the next block.
    async fn subscribe_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: Option<u64>,
    ) -> Result<LogStream, ChainError>;
}
