//! tradewatch - contract event monitor
//!
//! Retrieves, decodes and reports `DevGovFeeCharged` and `MarketExecuted`
//! events from a trading contract, either over a historical block range or
//! continuously as new blocks arrive.

// Chain access
pub mod chain;
pub mod error;
pub mod rpc;
pub mod types;
pub mod ws;

// Decoding
pub mod decoder;
pub mod events;
pub mod units;

// Retrieval and emission
pub mod cache;
pub mod dedup;
pub mod fetcher;
pub mod pipeline;
pub mod poller;
pub mod report;
pub mod sink;
pub mod subscription;

// Watermark persistence
pub mod records;
pub mod store;

pub mod cli;
pub mod config;
pub mod logging;

#[cfg(test)]
mod test_utils;

pub use error::{ChainError, DecodeError, FetchError};
pub use events::{DecodedEvent, EventKind};
pub use types::{BlockRange, LogIdentity, RawEvent};
