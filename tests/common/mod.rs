//! Shared fixtures for the integration tests.

use alloy_primitives::{address, Address, B256, U256};
use async_trait::async_trait;
use std::sync::Mutex;
use tradewatch::chain::ChainClient;
use tradewatch::{BlockRange, ChainError, EventKind, RawEvent};

pub const CONTRACT: Address = address!("239b4dbf964df383ae79c4fae2bbd92438ceb1ad");

fn word(value: u64) -> B256 {
    B256::from(U256::from(value).to_be_bytes())
}

/// A `DevGovFeeCharged` log with `trader = 0x..01`.
pub fn fee_log(block_number: u64, tx: u8, log_index: u32, value_usdc: u64) -> RawEvent {
    let mut data = word(value_usdc).to_vec();
    data.extend_from_slice(word(1).as_slice());
    RawEvent {
        address: CONTRACT,
        block_number,
        transaction_hash: B256::with_last_byte(tx),
        log_index,
        topics: vec![EventKind::DevGovFeeCharged.topic(), word(1)],
        data,
        removed: false,
    }
}

/// Node that rejects any `eth_getLogs` wider than `max_span` blocks.
pub struct LimitedNode {
    pub head: Mutex<u64>,
    pub max_span: u64,
    pub logs: Mutex<Vec<RawEvent>>,
    pub queries: Mutex<usize>,
}

impl LimitedNode {
    pub fn new(head: u64, max_span: u64) -> Self {
        Self {
            head: Mutex::new(head),
            max_span,
            logs: Mutex::new(Vec::new()),
            queries: Mutex::new(0),
        }
    }

    pub fn set_head(&self, head: u64) {
        *self.head.lock().unwrap() = head;
    }

    pub fn add_log(&self, log: RawEvent) {
        self.logs.lock().unwrap().push(log);
    }
}

#[async_trait]
impl ChainClient for LimitedNode {
    async fn current_block(&self) -> Result<u64, ChainError> {
        Ok(*self.head.lock().unwrap())
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, ChainError> {
        *self.queries.lock().unwrap() += 1;
        if range.len() > self.max_span {
            return Err(ChainError::from_rpc_message(format!(
                "exceed maximum block range: {}",
                self.max_span
            )));
        }
        let mut logs: Vec<RawEvent> = self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|log| log.address == address && log.topics.first() == topics.first())
            .filter(|log| log.block_number >= range.from && log.block_number <= range.to)
            .cloned()
            .collect();
        logs.sort_by_key(|log| (log.block_number, log.log_index));
        Ok(logs)
    }

    async fn get_block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        Ok(1_700_000_000 + number * 3)
    }
}
