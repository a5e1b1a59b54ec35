//! In-memory chain and log builders for unit tests.

use crate::chain::{ChainClient, LogStream, LogSubscriber};
use crate::error::ChainError;
use crate::events::EventKind;
use crate::types::{BlockRange, RawEvent};
use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const CONTRACT: Address = address!("239b4dbf964df383ae79c4fae2bbd92438ceb1ad");
pub const TRADER: Address = address!("70997970c51812dc3a010c7d01b50e0d17dc79c8");

pub fn tx_hash(n: u8) -> B256 {
    B256::with_last_byte(n)
}

fn word_u64(value: u64) -> [u8; 32] {
    U256::from(value).to_be_bytes()
}

fn word_i64(value: i64) -> [u8; 32] {
    if value < 0 {
        (U256::MAX - U256::from(value.unsigned_abs()) + U256::from(1u64)).to_be_bytes()
    } else {
        word_u64(value as u64)
    }
}

fn word_address(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_slice());
    word
}

pub fn dev_gov_fee_log(
    block_number: u64,
    tx: B256,
    log_index: u32,
    value_usdc: u64,
    is_positive: bool,
) -> RawEvent {
    let mut data = Vec::with_capacity(64);
    data.extend_from_slice(&word_u64(value_usdc));
    data.extend_from_slice(&word_u64(is_positive as u64));
    RawEvent {
        address: CONTRACT,
        block_number,
        transaction_hash: tx,
        log_index,
        topics: vec![
            EventKind::DevGovFeeCharged.topic(),
            B256::from(word_address(TRADER)),
        ],
        data,
        removed: false,
    }
}

pub fn market_executed_log(
    block_number: u64,
    tx: B256,
    log_index: u32,
    order_id: u64,
    percent_profit: i64,
) -> RawEvent {
    let mut data = Vec::with_capacity(16 * 32);
    data.extend_from_slice(&word_address(TRADER));
    for value in [
        1u64,                        // pairIndex
        0,                           // index
        2_000_000_000_000_000_000,   // initialPosToken
        250_000_000,                 // positionSizeUsdc
        3_000_000_000_000_000_000,   // openPrice
        1,                           // buy
        10,                          // leverage
        3_300_000_000_000_000_000,   // tp
        2_700_000_000_000_000_000,   // sl
        1,                           // open
        3_001_000_000_000_000_000,   // price
        500_000_000_000_000,         // priceImpactP
        2_500_000_000,               // positionSizeUsdc
    ] {
        data.extend_from_slice(&word_u64(value));
    }
    data.extend_from_slice(&word_i64(percent_profit));
    data.extend_from_slice(&word_u64(12_345_678));
    RawEvent {
        address: CONTRACT,
        block_number,
        transaction_hash: tx,
        log_index,
        topics: vec![EventKind::MarketExecuted.topic(), B256::from(word_u64(order_id))],
        data,
        removed: false,
    }
}

/// Scripted chain node.
///
/// Logs are served per topic0 and block range in `(block, log_index)` order.
#[derive(Default)]
pub struct MockChain {
    pub head: Mutex<u64>,
    pub head_fails: Mutex<bool>,
    pub head_calls: Mutex<usize>,
    pub timestamps_fail: Mutex<bool>,
    pub logs: Mutex<Vec<RawEvent>>,
    /// Queries wider than this are rejected as too large
    pub max_span: Mutex<Option<u64>>,
    /// Rejection text for `max_span`, defaults to a BSC-style message
    pub max_span_message: Mutex<Option<String>>,
    /// Queries touching these blocks fail with a transient error
    pub broken_blocks: Mutex<HashSet<u64>>,
    /// Queries touching these blocks are always rejected as too large
    pub oversized_blocks: Mutex<HashSet<u64>>,
    pub calls: Mutex<Vec<(BlockRange, B256)>>,
    subscribers: Mutex<Vec<(B256, mpsc::Sender<Result<RawEvent, ChainError>>)>>,
}

impl MockChain {
    pub fn new(head: u64) -> Self {
        let chain = Self::default();
        *chain.head.lock().unwrap() = head;
        chain
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn add_log(&self, log: RawEvent) {
        self.logs.lock().unwrap().push(log);
    }

    pub fn calls(&self) -> Vec<(BlockRange, B256)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// Deliver a log to every matching subscription.
    pub async fn push(&self, log: RawEvent) {
        let senders: Vec<_> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(topic, _)| Some(topic) == log.topics.first())
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(Ok(log.clone())).await;
        }
    }

    /// Fail and close every open subscription.
    pub async fn drop_subscriptions(&self) {
        let senders: Vec<_> = self.subscribers.lock().unwrap().drain(..).collect();
        for (_, tx) in senders {
            let _ = tx
                .send(Err(ChainError::SubscriptionClosed("connection reset".into())))
                .await;
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn current_block(&self) -> Result<u64, ChainError> {
        *self.head_calls.lock().unwrap() += 1;
        if *self.head_fails.lock().unwrap() {
            return Err(ChainError::Rpc("eth_blockNumber timed out".into()));
        }
        Ok(*self.head.lock().unwrap())
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let topic0 = topics.first().copied().unwrap_or_default();
        self.calls.lock().unwrap().push((range, topic0));

        let touches = |blocks: &HashSet<u64>| blocks.iter().any(|b| *b >= range.from && *b <= range.to);
        if touches(&self.oversized_blocks.lock().unwrap()) {
            return Err(ChainError::from_rpc_message("exceed maximum block range: 0"));
        }
        if let Some(max) = *self.max_span.lock().unwrap() {
            if range.len() > max {
                let message = self
                    .max_span_message
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or_else(|| format!("exceed maximum block range: {}", max));
                return Err(ChainError::from_rpc_message(message));
            }
        }
        if touches(&self.broken_blocks.lock().unwrap()) {
            return Err(ChainError::Rpc(format!("upstream error for {}", range)));
        }

        let mut logs: Vec<RawEvent> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.address == address)
            .filter(|log| log.topics.first() == Some(&topic0))
            .filter(|log| log.block_number >= range.from && log.block_number <= range.to)
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn get_block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        if *self.timestamps_fail.lock().unwrap() {
            return Err(ChainError::Rpc(format!("block {} not found", number)));
        }
        Ok(1_700_000_000 + number * 3)
    }
}

#[async_trait]
impl LogSubscriber for MockChain {
    async fn subscribe_logs(
        &self,
        _address: Address,
        topics: &[B256],
        _from_block: Option<u64>,
    ) -> Result<LogStream, ChainError> {
        let topic0 = topics
            .first()
            .copied()
            .ok_or_else(|| ChainError::Connection("no topic".into()))?;
        let (tx, rx) = mpsc::channel(64);
        self.subscribers.lock().unwrap().push((topic0, tx));
        Ok(rx)
    }
}
