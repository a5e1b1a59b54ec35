//! Ethereum JSON-RPC types
//!
//! Logs and block headers as returned by JSON-RPC endpoints, plus the
//! block range and log identity types the fetcher and poller work with.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Deserializer};
use std::fmt;

/// Inclusive range of block numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// Create a range. `from > to` yields an empty range.
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// An empty range is a no-op for every consumer, never an error.
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Number of blocks covered (0 when empty).
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.to - self.from + 1
        }
    }

    /// Split into consecutive sub-ranges of at most `chunk_size` blocks.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is 0.
    pub fn chunks(&self, chunk_size: u64) -> Chunks {
        assert!(chunk_size >= 1, "chunk_size must be at least 1");
        Chunks {
            next: self.from,
            end: self.to,
            chunk_size,
            done: self.is_empty(),
        }
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Iterator over the sub-ranges of a [`BlockRange`].
#[derive(Debug, Clone)]
pub struct Chunks {
    next: u64,
    end: u64,
    chunk_size: u64,
    done: bool,
}

impl Iterator for Chunks {
    type Item = BlockRange;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let from = self.next;
        let to = from.saturating_add(self.chunk_size - 1).min(self.end);
        if to == self.end {
            self.done = true;
        } else {
            self.next = to + 1;
        }
        Some(BlockRange { from, to })
    }
}

/// Identity of one emitted log. Used as the deduplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogIdentity {
    pub transaction_hash: B256,
    pub log_index: u32,
}

impl fmt::Display for LogIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}-{}", self.transaction_hash, self.log_index)
    }
}

/// Log entry as returned by `eth_getLogs` or a `logs` subscription.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawEvent {
    /// Address of the contract that emitted the log
    #[serde(rename = "address", deserialize_with = "deserialize_hex_address")]
    pub address: Address,

    /// Block number (hex string in JSON, parsed to u64)
    #[serde(rename = "blockNumber", deserialize_with = "deserialize_hex_u64")]
    pub block_number: u64,

    /// Transaction hash (hex string in JSON)
    #[serde(rename = "transactionHash", deserialize_with = "deserialize_hex_b256")]
    pub transaction_hash: B256,

    /// Position of the log in the block (hex string in JSON)
    #[serde(rename = "logIndex", deserialize_with = "deserialize_hex_u32")]
    pub log_index: u32,

    /// Indexed topics (topic0 = event signature, topics[1..] = indexed params)
    #[serde(rename = "topics", default, deserialize_with = "deserialize_hex_b256_vec")]
    pub topics: Vec<B256>,

    /// Non-indexed event data (hex string)
    #[serde(rename = "data", deserialize_with = "deserialize_hex_bytes")]
    pub data: Vec<u8>,

    /// Set by subscriptions when a log was dropped by a reorg
    #[serde(rename = "removed", default)]
    pub removed: bool,
}

impl RawEvent {
    pub fn identity(&self) -> LogIdentity {
        LogIdentity {
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }
}

/// The subset of a block we read: its number and timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    #[serde(rename = "number", deserialize_with = "deserialize_hex_u64")]
    pub number: u64,

    /// Unix epoch seconds
    #[serde(rename = "timestamp", deserialize_with = "deserialize_hex_u64")]
    pub timestamp: u64,
}

// Hex deserialization helpers

/// Pad an odd-length hex string with a leading zero.
/// This handles cases where RPC returns hex strings without leading zeros.
pub(crate) fn pad_hex_string(s: &str) -> String {
    if s.len() % 2 == 1 {
        format!("0{}", s)
    } else {
        s.to_string()
    }
}

/// Parse a quantity like `0x1a` into a u64.
pub(crate) fn parse_hex_u64(s: &str) -> Result<u64, std::num::ParseIntError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(s, 16)
}

/// Parse a 32-byte hex word.
pub(crate) fn parse_b256(s: &str) -> Result<B256, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(pad_hex_string(s)).map_err(|e| e.to_string())?;
    if bytes.len() != 32 {
        return Err(format!("Expected 32 bytes for hash, got {}", bytes.len()));
    }
    Ok(B256::from_slice(&bytes))
}

fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_hex_u64(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_hex_u64(deserializer)?;
    u32::try_from(value).map_err(serde::de::Error::custom)
}

fn deserialize_hex_b256<'de, D>(deserializer: D) -> Result<B256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_b256(&s).map_err(serde::de::Error::custom)
}

fn deserialize_hex_b256_vec<'de, D>(deserializer: D) -> Result<Vec<B256>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Vec::<String>::deserialize(deserializer)?;
    items
        .iter()
        .map(|s| parse_b256(s).map_err(serde::de::Error::custom))
        .collect()
}

fn deserialize_hex_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    let bytes = hex::decode(pad_hex_string(s)).map_err(serde::de::Error::custom)?;
    if bytes.len() != 20 {
        return Err(serde::de::Error::custom(format!(
            "Expected 20 bytes for address, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

fn deserialize_hex_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.strip_prefix("0x").unwrap_or(&s);
    if s.is_empty() {
        Ok(Vec::new())
    } else {
        hex::decode(pad_hex_string(s)).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use serde_json::json;

    #[test]
    fn test_chunks_scenario() {
        let chunks: Vec<_> = BlockRange::new(100, 25_100).chunks(10_000).collect();
        assert_eq!(
            chunks,
            vec![
                BlockRange::new(100, 10_099),
                BlockRange::new(10_100, 20_099),
                BlockRange::new(20_100, 25_100),
            ]
        );
    }

    #[test]
    fn test_chunks_cover_range_without_gaps() {
        for (from, to, size) in [(0u64, 0u64, 1u64), (5, 17, 4), (10, 19, 10), (1, 1000, 7)] {
            let chunks: Vec<_> = BlockRange::new(from, to).chunks(size).collect();
            assert_eq!(chunks.first().unwrap().from, from);
            assert_eq!(chunks.last().unwrap().to, to);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].to + 1, pair[1].from);
            }
            assert!(chunks.iter().all(|c| c.len() >= 1 && c.len() <= size));
            assert_eq!(chunks.iter().map(BlockRange::len).sum::<u64>(), to - from + 1);
        }
    }

    #[test]
    fn test_chunks_single_block_and_empty() {
        let chunks: Vec<_> = BlockRange::new(42, 42).chunks(10_000).collect();
        assert_eq!(chunks, vec![BlockRange::new(42, 42)]);

        assert_eq!(BlockRange::new(43, 42).chunks(10).count(), 0);
        assert!(BlockRange::new(43, 42).is_empty());
        assert_eq!(BlockRange::new(43, 42).len(), 0);
    }

    #[test]
    fn test_chunks_reach_u64_max() {
        let chunks: Vec<_> = BlockRange::new(u64::MAX - 2, u64::MAX).chunks(2).collect();
        assert_eq!(
            chunks,
            vec![
                BlockRange::new(u64::MAX - 2, u64::MAX - 1),
                BlockRange::new(u64::MAX, u64::MAX),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "chunk_size must be at least 1")]
    fn test_chunks_zero_size_panics() {
        let _ = BlockRange::new(1, 2).chunks(0);
    }

    #[test]
    fn test_raw_event_deserialize() {
        let log = json!({
            "address": "0x239b4dbf964df383ae79c4fae2bbd92438ceb1ad",
            "blockNumber": "0x3636b3e",
            "transactionHash": "0x0000000000000000000000000000000000000000000000000000000000000abc",
            "logIndex": "0x2",
            "topics": [
                "0x1111111111111111111111111111111111111111111111111111111111111111"
            ],
            "data": "0x01",
            "removed": false
        });
        let event: RawEvent = serde_json::from_value(log).unwrap();
        assert_eq!(event.block_number, 56_847_166);
        assert_eq!(event.log_index, 2);
        assert_eq!(event.topics.len(), 1);
        assert_eq!(event.data, vec![1]);
        assert_eq!(
            event.identity(),
            LogIdentity {
                transaction_hash: b256!(
                    "0000000000000000000000000000000000000000000000000000000000000abc"
                ),
                log_index: 2,
            }
        );
    }

    #[test]
    fn test_raw_event_rejects_short_hash() {
        let log = json!({
            "address": "0x239b4dbf964df383ae79c4fae2bbd92438ceb1ad",
            "blockNumber": "0x1",
            "transactionHash": "0xabc",
            "logIndex": "0x0",
            "topics": [],
            "data": "0x"
        });
        assert!(serde_json::from_value::<RawEvent>(log).is_err());
    }
}
