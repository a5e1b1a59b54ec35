//! Runtime configuration
//!
//! Every setting has a default. The block window comes from `START_BLOCK`
//! and `END_BLOCK`; connection settings are overridden through the
//! binaries' flags, which clap also reads from the environment.

use crate::report::DEFAULT_EXPLORER_URL;
use crate::types::pad_hex_string;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_RPC_URL: &str = "https://bsc-dataseed.bnbchain.org";
pub const DEFAULT_WS_URL: &str = "wss://bsc-rpc.publicnode.com";
pub const DEFAULT_CONTRACT: &str = "0x239B4dBf964dF383ae79c4fAE2bBD92438cEB1aD";
pub const DEFAULT_START_BLOCK: &str = "56845886";
pub const DEFAULT_END_BLOCK: &str = "latest";

/// A block number or the chain head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSpec {
    Latest,
    Number(u64),
}

impl BlockSpec {
    /// Concrete block number, with `head` standing in for `Latest`.
    pub fn resolve(self, head: u64) -> u64 {
        match self {
            BlockSpec::Latest => head,
            BlockSpec::Number(n) => n,
        }
    }
}

impl FromStr for BlockSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("latest") {
            return Ok(BlockSpec::Latest);
        }
        s.parse::<u64>()
            .map(BlockSpec::Number)
            .with_context(|| format!("Invalid block number: {}", s))
    }
}

impl fmt::Display for BlockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSpec::Latest => write!(f, "latest"),
            BlockSpec::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Runtime settings shared by both binaries.
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub ws_url: String,
    pub contract: Address,
    pub start_block: BlockSpec,
    pub end_block: BlockSpec,
    pub explorer_url: String,
}

impl Config {
    /// Defaults plus the block window from `START_BLOCK` and `END_BLOCK`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let start_block = get("START_BLOCK", DEFAULT_START_BLOCK);
        let end_block = get("END_BLOCK", DEFAULT_END_BLOCK);

        Ok(Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            contract: parse_address(DEFAULT_CONTRACT).context("Invalid default contract")?,
            start_block: start_block.parse().context("Invalid START_BLOCK")?,
            end_block: end_block.parse().context("Invalid END_BLOCK")?,
            explorer_url: DEFAULT_EXPLORER_URL.to_string(),
        })
    }
}

/// Parse an address from a hex string.
///
/// Accepts addresses with or without 0x prefix, in any letter case.
pub fn parse_address(s: &str) -> Result<Address> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let s = pad_hex_string(s);
    let bytes = hex::decode(&s).with_context(|| format!("Invalid hex address: {}", s))?;

    if bytes.len() != 20 {
        anyhow::bail!(
            "Address must be 20 bytes (40 hex chars), got {} bytes",
            bytes.len()
        );
    }

    Ok(Address::from_slice(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.start_block, BlockSpec::Number(56_845_886));
        assert_eq!(config.end_block, BlockSpec::Latest);
        assert_eq!(config.contract, parse_address(DEFAULT_CONTRACT).unwrap());
        assert_eq!(config.explorer_url, "https://bscscan.com");
    }

    #[test]
    fn test_block_window_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("START_BLOCK", "latest"),
            ("END_BLOCK", "100"),
        ]))
        .unwrap();
        assert_eq!(config.start_block, BlockSpec::Latest);
        assert_eq!(config.end_block, BlockSpec::Number(100));
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);

        let config = Config::from_lookup(lookup(&[("START_BLOCK", "  ")])).unwrap();
        assert_eq!(config.start_block, BlockSpec::Number(56_845_886));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("START_BLOCK", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("END_BLOCK", "-1")])).is_err());
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_parse_address() {
        let addr1 = parse_address("0x239B4dBf964dF383ae79c4fAE2bBD92438cEB1aD").unwrap();
        let addr2 = parse_address("239b4dbf964df383ae79c4fae2bbd92438ceb1ad").unwrap();
        assert_eq!(addr1, addr2);

        // odd-length input is left-padded
        let short = parse_address("0x00000000000000000000000000000000000000f").unwrap();
        assert_eq!(short, Address::with_last_byte(0x0f));
    }

    #[test]
    fn test_block_spec() {
        assert_eq!("LATEST".parse::<BlockSpec>().unwrap(), BlockSpec::Latest);
        assert_eq!(" 42 ".parse::<BlockSpec>().unwrap(), BlockSpec::Number(42));
        assert_eq!(BlockSpec::Latest.resolve(9), 9);
        assert_eq!(BlockSpec::Number(3).resolve(9), 3);
        assert_eq!(BlockSpec::Number(3).to_string(), "3");
    }
}
