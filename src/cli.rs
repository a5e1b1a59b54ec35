//! Historical query command
//!
//! Fetches both contract events over a block range, prints one block (or
//! one JSON line) per event, then summary statistics.

use crate::chain::ChainClient;
use crate::config::{parse_address, BlockSpec, Config};
use crate::dedup::EventDeduplicator;
use crate::events::DecodedEvent;
use crate::fetcher::{ChunkedRangeFetcher, FetchConfig, DEFAULT_CHUNK_SIZE};
use crate::pipeline::EventPipeline;
use crate::report::Summary;
use crate::rpc::RpcClient;
use crate::sink::{CollectingSink, ConsoleSink, EventSink, JsonLinesSink};
use crate::types::BlockRange;
use anyhow::{Context, Result};
use clap::{Args, Parser};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, warn};

/// Connection settings shared by both binaries. Unset flags keep the
/// built-in default.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// HTTP JSON-RPC endpoint
    #[arg(long, env = "BSC_RPC_URL")]
    pub rpc_url: Option<String>,

    /// Contract address (hex, with or without 0x prefix)
    #[arg(long, env = "CONTRACT_ADDRESS")]
    pub contract: Option<String>,

    /// Block explorer base URL
    #[arg(long, env = "EXPLORER_URL")]
    pub explorer_url: Option<String>,
}

impl ConnectionArgs {
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(url) = &self.rpc_url {
            config.rpc_url = url.clone();
        }
        if let Some(contract) = &self.contract {
            config.contract = parse_address(contract).context("Invalid --contract")?;
        }
        if let Some(url) = &self.explorer_url {
            config.explorer_url = url.clone();
        }
        Ok(())
    }
}

/// Query historical DevGovFeeCharged and MarketExecuted events
#[derive(Parser, Debug)]
#[command(name = "query")]
#[command(about = "Query historical DevGovFeeCharged and MarketExecuted events")]
#[command(after_help = "Examples:
  query                    # From START_BLOCK to latest
  query all                # All blocks (may be slow)
  query 35000000           # From block 35000000 to latest
  query 35000000 35001000  # From block 35000000 to 35001000")]
pub struct QueryArgs {
    /// First block, or "all" for block 0 [default: START_BLOCK]
    pub from_block: Option<String>,

    /// Last block [default: END_BLOCK]
    pub to_block: Option<String>,

    /// Print one JSON object per event instead of text blocks
    #[arg(long)]
    pub json: bool,

    /// Blocks per eth_getLogs query
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: u64,

    #[command(flatten)]
    pub connection: ConnectionArgs,
}

/// Start block from the first positional argument.
///
/// `"all"` means block 0; anything non-numeric is ignored.
pub fn parse_from_arg(arg: Option<&str>) -> Option<BlockSpec> {
    match arg.map(str::trim) {
        Some("all") => Some(BlockSpec::Number(0)),
        Some(s) => lenient_block(s),
        None => None,
    }
}

/// End block from the second positional argument. Non-numeric is ignored.
pub fn parse_to_arg(arg: Option<&str>) -> Option<BlockSpec> {
    arg.map(str::trim).and_then(lenient_block)
}

fn lenient_block(s: &str) -> Option<BlockSpec> {
    match s.parse::<u64>() {
        Ok(n) => Some(BlockSpec::Number(n)),
        Err(_) => {
            warn!(argument = s, "ignoring non-numeric block argument");
            None
        }
    }
}

/// Resolve the query range against the current head.
pub fn query_range(args: &QueryArgs, config: &Config, head: u64) -> BlockRange {
    let from = parse_from_arg(args.from_block.as_deref()).unwrap_or(config.start_block);
    let to = parse_to_arg(args.to_block.as_deref()).unwrap_or(config.end_block);
    BlockRange::new(from.resolve(head), to.resolve(head))
}

/// Run the query command.
pub async fn run(args: QueryArgs) -> Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.connection.apply(&mut config)?;

    info!(contract = %config.contract, rpc_url = %config.rpc_url, "querying historical events");

    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone()));
    let head = rpc
        .current_block()
        .await
        .context("Failed to get current block number")?;
    info!(head, "current block");

    let range = query_range(&args, &config, head);
    info!(from = range.from, to = range.to, blocks = range.len(), "searching");

    let fetcher = ChunkedRangeFetcher::new(rpc.clone(), config.contract).with_config(FetchConfig {
        chunk_size: args.chunk_size,
        ..FetchConfig::default()
    });
    let outcome = fetcher.fetch(range).await.context("Failed to fetch logs")?;
    if !outcome.is_complete() {
        warn!(
            failed_chunks = outcome.failed.len(),
            "some block ranges could not be fetched; results are incomplete"
        );
    }

    let collected = CollectingSink::new();
    let mut pipeline = EventPipeline::new(collected.clone(), EventDeduplicator::unbounded())
        .with_timestamps(rpc.clone());
    pipeline.ingest(outcome.events).await;
    let events = collected.events();
    info!(events = events.len(), "found events");

    if args.json {
        emit_all(JsonLinesSink::new(std::io::stdout(), &config.explorer_url), &events)?;
        info!(summary = %Summary::from_events(&events).to_json(), "summary");
        return Ok(());
    }

    if events.is_empty() {
        println!("No events found in the specified block range.");
        println!("Try a wider range, e.g. `query all`, or check the contract address.");
        return Ok(());
    }
    emit_all(
        ConsoleSink::new(std::io::stdout(), &config.explorer_url).with_total(events.len()),
        &events,
    )?;
    let mut out = std::io::stdout().lock();
    write!(out, "{}", Summary::from_events(&events).render())?;
    out.flush()?;
    Ok(())
}

fn emit_all<S: EventSink>(mut sink: S, events: &[DecodedEvent]) -> Result<()> {
    for event in events {
        sink.emit(event)?;
    }
    Ok(())
}
