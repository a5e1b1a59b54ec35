//! `eth_subscribe` log subscriptions over WebSocket
//!
//! Each subscription gets its own connection and a reader task that forwards
//! notifications into a bounded channel. The task ends when the socket
//! closes, errors, or the receiving side is dropped.

use crate::chain::{LogStream, LogSubscriber};
use crate::error::ChainError;
use crate::types::RawEvent;
use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(10);
const CHANNEL_CAPACITY: usize = 256;

type WsError = tokio_tungstenite::tungstenite::Error;

/// Push subscriptions against a WebSocket JSON-RPC endpoint.
pub struct WsSubscriber {
    url: String,
}

impl WsSubscriber {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// The `eth_subscribe` request for a logs filter.
pub(crate) fn subscribe_request(address: Address, topics: &[B256], from_block: Option<u64>) -> Value {
    let topics: Vec<String> = topics.iter().map(|t| format!("0x{:x}", t)).collect();
    let mut filter = json!({
        "address": format!("0x{:x}", address),
        "topics": topics,
    });
    if let (Some(block), Value::Object(map)) = (from_block, &mut filter) {
        map.insert("fromBlock".into(), json!(format!("0x{:x}", block)));
    }
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": ["logs", filter],
    })
}

/// Log carried by a notification for `subscription_id`, if `message` is one.
pub(crate) fn notification_log(message: &Value, subscription_id: &str) -> Option<Value> {
    if message.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return None;
    }
    let params = message.get("params")?;
    if params.get("subscription").and_then(Value::as_str) != Some(subscription_id) {
        return None;
    }
    params.get("result").cloned()
}

async fn wait_for_subscription<S>(read: &mut S) -> Result<String, ChainError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let confirm = async {
        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| ChainError::Connection(format!("WebSocket: {}", e)))?;
            let Message::Text(text) = msg else {
                continue;
            };
            let parsed: Value = serde_json::from_str(&text)
                .map_err(|e| ChainError::InvalidResponse(format!("subscription reply: {}", e)))?;
            if parsed.get("id") != Some(&json!(1)) {
                continue;
            }
            if let Some(id) = parsed.get("result").and_then(Value::as_str) {
                return Ok(id.to_string());
            }
            if let Some(error) = parsed.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                return Err(ChainError::Connection(format!("eth_subscribe rejected: {}", message)));
            }
        }
        Err(ChainError::Connection(
            "WebSocket closed during subscription".to_string(),
        ))
    };
    tokio::time::timeout(SUBSCRIBE_TIMEOUT, confirm)
        .await
        .map_err(|_| ChainError::Connection("subscription timeout".to_string()))?
}

#[async_trait]
impl LogSubscriber for WsSubscriber {
    async fn subscribe_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: Option<u64>,
    ) -> Result<LogStream, ChainError> {
        let (ws_stream, response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| ChainError::Connection(format!("WebSocket connect: {}", e)))?;
        debug!(status = ?response.status(), "WebSocket connection established");

        let (mut write, mut read) = ws_stream.split();
        let request = subscribe_request(address, topics, from_block);
        write
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| ChainError::Connection(format!("WebSocket send: {}", e)))?;

        let subscription_id = wait_for_subscription(&mut read).await?;
        debug!(subscription_id = %subscription_id, "subscription confirmed");

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = tx.closed() => {
                        let _ = write.send(Message::Close(None)).await;
                        return;
                    }
                    msg = read.next() => msg,
                };

                let closed = match msg {
                    Some(Ok(Message::Text(text))) => {
                        let parsed: Value = match serde_json::from_str(&text) {
                            Ok(v) => v,
                            Err(e) => {
                                warn!(error = %e, "unparseable WebSocket message");
                                continue;
                            }
                        };
                        let Some(log) = notification_log(&parsed, &subscription_id) else {
                            trace!("non-subscription message");
                            continue;
                        };
                        match serde_json::from_value::<RawEvent>(log) {
                            Ok(raw) => {
                                if tx.send(Ok(raw)).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!(error = %e, "malformed log notification"),
                        }
                        continue;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => format!("closed by server: {:?}", frame),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => format!("WebSocket: {}", e),
                    None => "connection ended".to_string(),
                };

                let _ = tx.send(Err(ChainError::SubscriptionClosed(closed))).await;
                return;
            }
        });

        Ok(rx)
    }
}
