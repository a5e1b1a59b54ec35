//! Record types for the checkpoint store
//!
//! These structs use postcard for binary serialization, which is compact
//! and deterministic.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Durable poller progress for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Contract the watermark belongs to
    pub contract: Address,
    /// Highest block whose logs were fetched
    pub last_processed_block: u64,
    /// Unix epoch seconds of the write
    pub updated_at: u64,
}

impl Checkpoint {
    /// Checkpoint stamped with the current wall-clock time.
    pub fn now(contract: Address, last_processed_block: u64) -> Self {
        Self {
            contract,
            last_processed_block,
            updated_at: u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).context("Failed to serialize checkpoint")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        postcard::from_bytes(bytes).context("Failed to deserialize checkpoint")
    }
}
