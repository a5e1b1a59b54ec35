//! Typed records for the two contract events
//!
//! Built once by the decoder from a raw log and never mutated afterwards.

use crate::types::LogIdentity;
use alloy_primitives::{keccak256, Address, B256, I256, U256};

/// The events this crate knows how to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DevGovFeeCharged,
    MarketExecuted,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::DevGovFeeCharged, EventKind::MarketExecuted];

    pub fn name(&self) -> &'static str {
        match self {
            EventKind::DevGovFeeCharged => "DevGovFeeCharged",
            EventKind::MarketExecuted => "MarketExecuted",
        }
    }

    /// Canonical ABI signature.
    ///
    /// `MarketExecuted` embeds the `Trade` struct as a static tuple.
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::DevGovFeeCharged => "DevGovFeeCharged(address,uint256,bool)",
            EventKind::MarketExecuted => concat!(
                "MarketExecuted(uint256,",
                "(address,uint256,uint256,uint256,uint256,uint256,bool,uint256,uint256,uint256),",
                "bool,uint256,uint256,uint256,int256,uint256)"
            ),
        }
    }

    /// keccak256 of the signature, i.e. topic0 of every log of this kind.
    pub fn topic(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }

    pub fn from_topic(topic: &B256) -> Option<EventKind> {
        EventKind::ALL.into_iter().find(|kind| kind.topic() == *topic)
    }
}

/// Where a decoded event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    pub block_number: u64,
    pub transaction_hash: B256,
    pub log_index: u32,
    /// Unix epoch seconds, when the caller looked it up
    pub timestamp: Option<u64>,
}

/// Fee charged to (or refunded to) a trader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevGovFeeCharged {
    pub trader: Address,
    /// 6 decimals
    pub value_usdc: U256,
    pub is_positive: bool,
}

/// The trade struct embedded in `MarketExecuted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSnapshot {
    pub trader: Address,
    pub pair_index: U256,
    pub index: U256,
    /// 18 decimals
    pub initial_pos_token: U256,
    /// 6 decimals
    pub position_size_usdc: U256,
    /// 18 decimals
    pub open_price: U256,
    pub buy: bool,
    pub leverage: U256,
    /// 18 decimals
    pub tp: U256,
    /// 18 decimals
    pub sl: U256,
}

/// A market order executed against the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketExecuted {
    pub order_id: U256,
    pub trade: TradeSnapshot,
    pub open: bool,
    /// 18 decimals
    pub price: U256,
    /// 18 decimals
    pub price_impact_p: U256,
    /// 6 decimals
    pub position_size_usdc: U256,
    pub percent_profit: I256,
    /// 6 decimals
    pub usdc_sent_to_trader: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    DevGovFeeCharged(DevGovFeeCharged),
    MarketExecuted(MarketExecuted),
}

impl EventBody {
    pub fn kind(&self) -> EventKind {
        match self {
            EventBody::DevGovFeeCharged(_) => EventKind::DevGovFeeCharged,
            EventBody::MarketExecuted(_) => EventKind::MarketExecuted,
        }
    }
}

/// A decoded log plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub meta: EventMeta,
    pub body: EventBody,
}

impl DecodedEvent {
    pub fn kind(&self) -> EventKind {
        self.body.kind()
    }

    pub fn identity(&self) -> LogIdentity {
        LogIdentity {
            transaction_hash: self.meta.transaction_hash,
            log_index: self.meta.log_index,
        }
    }

    /// Sort key for emission order.
    pub fn position(&self) -> (u64, u32) {
        (self.meta.block_number, self.meta.log_index)
    }
}
