//! listener - real-time event monitor
//!
//! Polls the chain head on an interval (default) or subscribes to both
//! events over WebSocket (`--live`), printing each new event once.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Stdout;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tradewatch::chain::ChainClient;
use tradewatch::cli::ConnectionArgs;
use tradewatch::config::{BlockSpec, Config};
use tradewatch::dedup::EventDeduplicator;
use tradewatch::fetcher::ChunkedRangeFetcher;
use tradewatch::logging;
use tradewatch::pipeline::EventPipeline;
use tradewatch::poller::Poller;
use tradewatch::rpc::RpcClient;
use tradewatch::sink::{ConsoleSink, EventSink, JsonLinesSink};
use tradewatch::store::RocksCheckpointStore;
use tradewatch::subscription::{LiveSubscription, SubscriptionEnd};
use tradewatch::ws::WsSubscriber;

/// Monitor DevGovFeeCharged and MarketExecuted events as they happen
#[derive(Parser)]
#[command(name = "listener")]
#[command(about = "Monitor DevGovFeeCharged and MarketExecuted events in real time")]
struct Args {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// WebSocket JSON-RPC endpoint, used with --live
    #[arg(long, env = "BSC_WS_URL")]
    ws_url: Option<String>,

    /// Subscribe over WebSocket instead of polling
    #[arg(long)]
    live: bool,

    /// Watermark to poll from, a block number or "latest" [default: START_BLOCK]
    #[arg(long)]
    from_block: Option<BlockSpec>,

    /// Seconds between poll ticks
    #[arg(long, default_value_t = 10)]
    interval_secs: u64,

    /// Blocks of seen events to remember for deduplication (0 keeps all)
    #[arg(long, default_value_t = 50_000)]
    retention: u64,

    /// RocksDB directory for the poll watermark checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Print one JSON object per event instead of text blocks
    #[arg(long)]
    json: bool,
}

impl Args {
    fn dedup(&self) -> EventDeduplicator {
        if self.retention == 0 {
            EventDeduplicator::unbounded()
        } else {
            EventDeduplicator::with_retention(self.retention)
        }
    }
}

fn stdout_sink(json: bool, explorer_url: &str) -> Box<dyn EventSink> {
    let out: Stdout = std::io::stdout();
    if json {
        Box::new(JsonLinesSink::new(out, explorer_url))
    } else {
        Box::new(ConsoleSink::new(out, explorer_url))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down gracefully...");
}

async fn run_poll(args: &Args, config: &Config) -> Result<()> {
    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone()));
    let head = rpc
        .current_block()
        .await
        .context("Failed to connect to RPC endpoint")?;
    info!(head, "current block");

    let start = args.from_block.unwrap_or(config.start_block).resolve(head);
    let fetcher = ChunkedRangeFetcher::new(rpc.clone(), config.contract);
    let pipeline = EventPipeline::new(stdout_sink(args.json, &config.explorer_url), args.dedup())
        .with_timestamps(rpc.clone());

    let mut poller = Poller::new(fetcher, pipeline, start)
        .with_interval(Duration::from_secs(args.interval_secs.max(1)));
    if let Some(path) = &args.checkpoint {
        let store = RocksCheckpointStore::open(path)
            .with_context(|| format!("Failed to open checkpoint store at {:?}", path))?;
        poller = poller.with_checkpoint(Box::new(store))?;
    }

    info!(watermark = poller.last_processed_block(), "polling for new events");
    poller.run(shutdown_signal()).await;
    Ok(())
}

async fn run_live(args: &Args, config: &Config) -> Result<()> {
    let subscriber = Arc::new(WsSubscriber::new(config.ws_url.clone()));
    info!(ws_url = %subscriber.url(), "subscribing to events");

    let pipeline = EventPipeline::new(stdout_sink(args.json, &config.explorer_url), args.dedup());
    let mut live = LiveSubscription::new(subscriber, config.contract, pipeline);

    let end = live
        .run(None, shutdown_signal())
        .await
        .context("Failed to subscribe to events")?;
    let stats = live.stats();
    info!(emitted = stats.emitted, duplicates = stats.duplicates, "listener stopped");

    match end {
        SubscriptionEnd::Shutdown => Ok(()),
        SubscriptionEnd::Dropped { kind, error } => {
            error!(event = kind.name(), "subscription lost, not reconnecting");
            Err(anyhow::Error::new(error).context("Subscription dropped"))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_tracing();

    let args = Args::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    args.connection.apply(&mut config)?;
    if let Some(url) = &args.ws_url {
        config.ws_url = url.clone();
    }

    info!(contract = %config.contract, "starting event listener");
    if args.live {
        run_live(&args, &config).await
    } else {
        info!(rpc_url = %config.rpc_url, interval_secs = args.interval_secs, "polling mode");
        run_poll(&args, &config).await
    }
}
