//! Log decoder for the two contract events
//!
//! Dispatches on topic0 to a fixed decoder per event. Every parameter is
//! a static ABI type, so the data section is a flat run of 32-byte words.

use crate::error::DecodeError;
use crate::events::{
    DecodedEvent, DevGovFeeCharged, EventBody, EventKind, EventMeta, MarketExecuted, TradeSnapshot,
};
use crate::types::RawEvent;
use alloy_primitives::{Address, B256, I256, U256};

const WORD: usize = 32;

/// DevGovFeeCharged: topic1 = trader; data = valueUsdc, isPositive
const DEV_GOV_DATA_WORDS: usize = 2;

/// MarketExecuted: topic1 = orderId; data = 10 trade words + 6 trailing words
const MARKET_EXECUTED_DATA_WORDS: usize = 16;

/// Decode a raw log into a typed event.
///
/// `timestamp` is attached to the metadata as-is.
pub fn decode_log(raw: &RawEvent, timestamp: Option<u64>) -> Result<DecodedEvent, DecodeError> {
    let topic0 = raw.topics.first().ok_or(DecodeError::NoTopics)?;
    let kind = EventKind::from_topic(topic0).ok_or(DecodeError::UnknownSignature(*topic0))?;

    let body = match kind {
        EventKind::DevGovFeeCharged => EventBody::DevGovFeeCharged(decode_dev_gov_fee(raw)?),
        EventKind::MarketExecuted => EventBody::MarketExecuted(decode_market_executed(raw)?),
    };

    Ok(DecodedEvent {
        meta: EventMeta {
            block_number: raw.block_number,
            transaction_hash: raw.transaction_hash,
            log_index: raw.log_index,
            timestamp,
        },
        body,
    })
}

fn decode_dev_gov_fee(raw: &RawEvent) -> Result<DevGovFeeCharged, DecodeError> {
    let words = Words::new(raw, EventKind::DevGovFeeCharged, 2, DEV_GOV_DATA_WORDS)?;
    Ok(DevGovFeeCharged {
        trader: address_from_topic(&raw.topics[1]).ok_or(DecodeError::InvalidWord {
            event: words.event,
            word: 0,
            kind: "indexed address",
        })?,
        value_usdc: words.uint(0),
        is_positive: words.bool(1)?,
    })
}

fn decode_market_executed(raw: &RawEvent) -> Result<MarketExecuted, DecodeError> {
    let words = Words::new(raw, EventKind::MarketExecuted, 2, MARKET_EXECUTED_DATA_WORDS)?;
    let trade = TradeSnapshot {
        trader: words.address(0)?,
        pair_index: words.uint(1),
        index: words.uint(2),
        initial_pos_token: words.uint(3),
        position_size_usdc: words.uint(4),
        open_price: words.uint(5),
        buy: words.bool(6)?,
        leverage: words.uint(7),
        tp: words.uint(8),
        sl: words.uint(9),
    };
    Ok(MarketExecuted {
        order_id: U256::from_be_slice(raw.topics[1].as_slice()),
        trade,
        open: words.bool(10)?,
        price: words.uint(11),
        price_impact_p: words.uint(12),
        position_size_usdc: words.uint(13),
        percent_profit: I256::from_raw(words.uint(14)),
        usdc_sent_to_trader: words.uint(15),
    })
}

/// Address from a 32-byte topic; the upper 12 bytes must be zero.
fn address_from_topic(topic: &B256) -> Option<Address> {
    address_from_word(topic.as_slice())
}

fn address_from_word(word: &[u8]) -> Option<Address> {
    if word[..12].iter().any(|b| *b != 0) {
        return None;
    }
    Some(Address::from_slice(&word[12..]))
}

/// Checked view over the data words of one log.
struct Words<'a> {
    event: &'static str,
    data: &'a [u8],
}

impl<'a> Words<'a> {
    fn new(
        raw: &'a RawEvent,
        kind: EventKind,
        topics: usize,
        words: usize,
    ) -> Result<Self, DecodeError> {
        let event = kind.name();
        if raw.topics.len() != topics {
            return Err(DecodeError::TopicCount {
                event,
                expected: topics,
                got: raw.topics.len(),
            });
        }
        // Trailing bytes beyond the static layout are tolerated, a short payload is not.
        if raw.data.len() < words * WORD {
            return Err(DecodeError::DataLength {
                event,
                expected: words * WORD,
                got: raw.data.len(),
            });
        }
        Ok(Self {
            event,
            data: &raw.data,
        })
    }

    fn word(&self, i: usize) -> &'a [u8] {
        &self.data[i * WORD..(i + 1) * WORD]
    }

    fn uint(&self, i: usize) -> U256 {
        U256::from_be_slice(self.word(i))
    }

    fn bool(&self, i: usize) -> Result<bool, DecodeError> {
        match self.uint(i) {
            v if v == U256::ZERO => Ok(false),
            v if v == U256::from(1u64) => Ok(true),
            _ => Err(DecodeError::InvalidWord {
                event: self.event,
                word: i,
                kind: "bool",
            }),
        }
    }

    fn address(&self, i: usize) -> Result<Address, DecodeError> {
        address_from_word(self.word(i)).ok_or(DecodeError::InvalidWord {
            event: self.event,
            word: i,
            kind: "address",
        })
    }
}
