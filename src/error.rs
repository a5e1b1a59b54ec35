//! Error types for chain access, decoding and range fetching
//!
//! Library seams return these typed errors; the binaries wrap them
//! in `anyhow` with context.

use alloy_primitives::B256;
use thiserror::Error;

/// Substrings providers use when rejecting an `eth_getLogs` span.
///
/// Matched case-insensitively against the RPC error text.
const RANGE_LIMIT_MARKERS: &[&str] = &[
    "exceed maximum block range",
    "max block range",
    "block range",
    "range too large",
    "range limit",
    "limited to a",
    "query returned more than",
    "too many blocks",
    "max range",
];

/// Errors produced by a chain client.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// The provider rejected the requested block span.
    #[error("block range rejected by provider: {0}")]
    RangeTooLarge(String),

    /// Timeouts, rate limits and generic provider errors.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Could not reach the endpoint or set up a subscription.
    #[error("connection error: {0}")]
    Connection(String),

    /// The endpoint answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// A push subscription ended.
    #[error("subscription closed: {0}")]
    SubscriptionClosed(String),
}

impl ChainError {
    /// Build an error from the text of a JSON-RPC error object.
    ///
    /// Range-limit rejections are recognised by message, everything
    /// else is treated as transient.
    pub fn from_rpc_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_range_limit_message(&message) {
            ChainError::RangeTooLarge(message)
        } else {
            ChainError::Rpc(message)
        }
    }

    /// Whether this error asks us to query a smaller block span.
    pub fn is_range_limit(&self) -> bool {
        matches!(self, ChainError::RangeTooLarge(_))
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            ChainError::Connection(err.to_string())
        } else if err.is_decode() {
            ChainError::InvalidResponse(err.to_string())
        } else {
            ChainError::Rpc(err.to_string())
        }
    }
}

fn is_range_limit_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    RANGE_LIMIT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A log did not match the shape of either known event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("log has no topics")]
    NoTopics,

    #[error("unknown event signature {0:#x}")]
    UnknownSignature(B256),

    #[error("{event}: expected {expected} topics, got {got}")]
    TopicCount {
        event: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{event}: expected {expected} data bytes, got {got}")]
    DataLength {
        event: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{event}: word {word} is not a valid {kind}")]
    InvalidWord {
        event: &'static str,
        word: usize,
        kind: &'static str,
    },
}

/// Errors that abort a whole range fetch.
///
/// Individual chunk failures never surface here; they are reported
/// in the fetch outcome instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("no topic filters registered")]
    NoTopics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_limit_classification() {
        let err = ChainError::from_rpc_message(
            r#"{"code":-32000,"message":"exceed maximum block range: 5000"}"#,
        );
        assert!(err.is_range_limit());

        let err = ChainError::from_rpc_message("Query returned more than 10000 results");
        assert!(err.is_range_limit());

        for message in [
            "exceeds max block range 100000",
            "Log response size exceeded. You can make eth_getLogs requests with up to a 2K block range",
            "block range exceeds limit",
            "eth_getLogs is limited to a 10000 range",
            "requested range limit exceeded",
        ] {
            assert!(
                ChainError::from_rpc_message(message).is_range_limit(),
                "{}",
                message
            );
        }

        let err = ChainError::from_rpc_message("header not found");
        assert!(!err.is_range_limit());
        assert!(matches!(err, ChainError::Rpc(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::DataLength {
            event: "DevGovFeeCharged",
            expected: 64,
            got: 32,
        };
        assert_eq!(
            err.to_string(),
            "DevGovFeeCharged: expected 64 data bytes, got 32"
        );
    }
}
