//! query - historical event report
//!
//! Fetches DevGovFeeCharged and MarketExecuted events for a block range and
//! prints them with summary statistics.

use clap::error::ErrorKind;
use clap::Parser;
use tradewatch::cli::{self, QueryArgs};
use tradewatch::logging;

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let args = match QueryArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 1,
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Err(e) = cli::run(args).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
