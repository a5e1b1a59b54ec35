//! JSON-RPC client for Ethereum nodes
//!
//! Provides a typed interface to Ethereum JSON-RPC endpoints.
//! Handles hex string parsing and error handling.

use crate::chain::ChainClient;
use crate::error::ChainError;
use crate::types::{parse_hex_u64, BlockHeader, BlockRange, RawEvent};
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-request timeout. A hung call counts as a transient RPC error.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC client for Ethereum nodes.
pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Create a new RPC client.
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url,
            next_id: AtomicU64::new(1),
        }
    }

    /// Make a JSON-RPC call.
    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params
        });

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        let json: Value = response.json().await.map_err(|e| {
            ChainError::InvalidResponse(format!("{} returned HTTP {}: {}", method, status, e))
        })?;

        // Check for RPC error
        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(ChainError::from_rpc_message(message));
        }

        json.get("result").cloned().ok_or_else(|| {
            ChainError::InvalidResponse(format!("{} response missing 'result' field", method))
        })
    }

    /// Fetch a block header by number.
    pub async fn get_block_header(&self, number: u64) -> Result<BlockHeader, ChainError> {
        let params = json!([format!("0x{:x}", number), false]);
        let result = self.call("eth_getBlockByNumber", params).await?;
        if result.is_null() {
            return Err(ChainError::Rpc(format!("block {} not found", number)));
        }
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("block {}: {}", number, e)))
    }
}

#[async_trait]
impl ChainClient for RpcClient {
    async fn current_block(&self) -> Result<u64, ChainError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&result)
    }

    async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        range: BlockRange,
    ) -> Result<Vec<RawEvent>, ChainError> {
        let params = json!([log_filter(address, topics, range)]);
        let result = self.call("eth_getLogs", params).await?;
        serde_json::from_value(result)
            .map_err(|e| ChainError::InvalidResponse(format!("logs {}: {}", range, e)))
    }

    async fn get_block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        Ok(self.get_block_header(number).await?.timestamp)
    }
}

/// Build an `eth_getLogs` filter object.
pub(crate) fn log_filter(address: Address, topics: &[B256], range: BlockRange) -> Value {
    let topics: Vec<String> = topics.iter().map(|t| format!("0x{:x}", t)).collect();
    json!({
        "address": format!("0x{:x}", address),
        "topics": topics,
        "fromBlock": format!("0x{:x}", range.from),
        "toBlock": format!("0x{:x}", range.to),
    })
}

fn parse_quantity(value: &Value) -> Result<u64, ChainError> {
    let s = value
        .as_str()
        .ok_or_else(|| ChainError::InvalidResponse(format!("expected hex quantity, got {}", value)))?;
    parse_hex_u64(s).map_err(|e| ChainError::InvalidResponse(format!("bad quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_log_filter_shape() {
        let filter = log_filter(
            address!("239b4dbf964df383ae79c4fae2bbd92438ceb1ad"),
            &[B256::repeat_byte(0xab)],
            BlockRange::new(16, 255),
        );
        assert_eq!(filter["address"], "0x239b4dbf964df383ae79c4fae2bbd92438ceb1ad");
        assert_eq!(filter["fromBlock"], "0x10");
        assert_eq!(filter["toBlock"], "0xff");
        assert_eq!(filter["topics"][0], format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x3636b3e")).unwrap(), 56_847_166);
        assert_eq!(parse_quantity(&json!("0x")).unwrap(), 0);
        assert!(parse_quantity(&json!(12)).is_err());
        assert!(parse_quantity(&json!("0xzz")).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        let client = RpcClient::new("http://127.0.0.1:9".to_string());
        let err = client.current_block().await.unwrap_err();
        assert!(matches!(err, ChainError::Connection(_)), "got {:?}", err);
    }
}
