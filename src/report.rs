//! Human and JSON renderings of decoded events
//!
//! Every fixed-point amount is rendered twice: the raw integer string under a
//! `...Raw` key and the scaled decimal. Only the raw values are authoritative.

use crate::events::{DecodedEvent, DevGovFeeCharged, EventBody, EventMeta, MarketExecuted};
use crate::units::{format_units, format_units_fixed, PRICE_DECIMALS, USDC_DECIMALS};
use alloy_primitives::{B256, U256};
use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};
use std::fmt::Write as _;

pub const DEFAULT_EXPLORER_URL: &str = "https://bscscan.com";

const RULE: &str = "═══════════════════════════════════════";

/// Transaction link on a block explorer.
pub fn explorer_tx_url(base: &str, hash: &B256) -> String {
    format!("{}/tx/0x{:x}", base.trim_end_matches('/'), hash)
}

/// RFC 3339 UTC with milliseconds, or `"Unknown"`.
pub fn format_timestamp(timestamp: Option<u64>) -> String {
    timestamp
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "Unknown".to_string())
}

/// One JSON object describing `event`.
pub fn event_record(event: &DecodedEvent, explorer_base: &str) -> Value {
    let meta = &event.meta;
    let mut record = match &event.body {
        EventBody::DevGovFeeCharged(fee) => fee_fields(fee),
        EventBody::MarketExecuted(exec) => market_fields(exec),
    };
    if let Value::Object(map) = &mut record {
        map.insert("eventType".into(), json!(event.kind().name()));
        map.insert("blockNumber".into(), json!(meta.block_number));
        map.insert(
            "transactionHash".into(),
            json!(format!("0x{:x}", meta.transaction_hash)),
        );
        map.insert("logIndex".into(), json!(meta.log_index));
        map.insert(
            "timestamp".into(),
            meta.timestamp
                .map(|ts| json!(format_timestamp(Some(ts))))
                .unwrap_or(Value::Null),
        );
        map.insert(
            "explorerUrl".into(),
            json!(explorer_tx_url(explorer_base, &meta.transaction_hash)),
        );
    }
    record
}

fn usdc(value: U256) -> Value {
    json!(format_units(value, USDC_DECIMALS))
}

fn price(value: U256) -> Value {
    json!(format_units(value, PRICE_DECIMALS))
}

fn fee_fields(fee: &DevGovFeeCharged) -> Value {
    json!({
        "trader": format!("0x{:x}", fee.trader),
        "valueUsdc": usdc(fee.value_usdc),
        "valueUsdcRaw": fee.value_usdc.to_string(),
        "isPositive": fee.is_positive,
    })
}

fn market_fields(exec: &MarketExecuted) -> Value {
    let t = &exec.trade;
    json!({
        "orderId": exec.order_id.to_string(),
        "trade": {
            "trader": format!("0x{:x}", t.trader),
            "pairIndex": t.pair_index.to_string(),
            "index": t.index.to_string(),
            "initialPosToken": price(t.initial_pos_token),
            "initialPosTokenRaw": t.initial_pos_token.to_string(),
            "positionSizeUsdc": usdc(t.position_size_usdc),
            "positionSizeUsdcRaw": t.position_size_usdc.to_string(),
            "openPrice": price(t.open_price),
            "openPriceRaw": t.open_price.to_string(),
            "buy": t.buy,
            "leverage": t.leverage.to_string(),
            "tp": price(t.tp),
            "tpRaw": t.tp.to_string(),
            "sl": price(t.sl),
            "slRaw": t.sl.to_string(),
        },
        "open": exec.open,
        "price": price(exec.price),
        "priceRaw": exec.price.to_string(),
        "priceImpactP": price(exec.price_impact_p),
        "priceImpactPRaw": exec.price_impact_p.to_string(),
        "positionSizeUsdc": usdc(exec.position_size_usdc),
        "positionSizeUsdcRaw": exec.position_size_usdc.to_string(),
        "percentProfit": exec.percent_profit.to_string(),
        "usdcSentToTrader": usdc(exec.usdc_sent_to_trader),
        "usdcSentToTraderRaw": exec.usdc_sent_to_trader.to_string(),
    })
}

/// Console block for one event. `position` is `(n, total)` when known.
pub fn render_event(event: &DecodedEvent, position: Option<(usize, usize)>, explorer_base: &str) -> String {
    let mut out = String::new();
    let heading = match position {
        Some((n, total)) => format!("{} Event {}/{}", event.kind().name(), n, total),
        None => format!("{} Event", event.kind().name()),
    };
    let _ = writeln!(out, "{}", heading);
    let _ = writeln!(out, "{}", RULE);
    write_meta(&mut out, &event.meta);

    match &event.body {
        EventBody::DevGovFeeCharged(fee) => {
            let _ = writeln!(out, "Trader: 0x{:x}", fee.trader);
            let _ = writeln!(out, "Value USDC: {}", format_units(fee.value_usdc, USDC_DECIMALS));
            let _ = writeln!(out, "Value USDC (raw): {}", fee.value_usdc);
            let _ = writeln!(out, "Is Positive: {}", fee.is_positive);
        }
        EventBody::MarketExecuted(exec) => {
            let t = &exec.trade;
            let _ = writeln!(out, "Order ID: {}", exec.order_id);
            let _ = writeln!(out, "Trader: 0x{:x}", t.trader);
            let _ = writeln!(out, "Pair Index: {}", t.pair_index);
            let _ = writeln!(out, "Position Index: {}", t.index);
            let _ = writeln!(
                out,
                "Position Size USDC: {}",
                format_units(exec.position_size_usdc, USDC_DECIMALS)
            );
            let _ = writeln!(out, "Open Price: {}", format_units(t.open_price, PRICE_DECIMALS));
            let _ = writeln!(out, "Buy: {}", t.buy);
            let _ = writeln!(out, "Leverage: {}", t.leverage);
            let _ = writeln!(out, "Take Profit: {}", format_units(t.tp, PRICE_DECIMALS));
            let _ = writeln!(out, "Stop Loss: {}", format_units(t.sl, PRICE_DECIMALS));
            let _ = writeln!(out, "Open: {}", exec.open);
            let _ = writeln!(out, "Execution Price: {}", format_units(exec.price, PRICE_DECIMALS));
            let _ = writeln!(
                out,
                "Price Impact P: {}",
                format_units(exec.price_impact_p, PRICE_DECIMALS)
            );
            let _ = writeln!(out, "Percent Profit: {}", exec.percent_profit);
            let _ = writeln!(
                out,
                "USDC Sent to Trader: {}",
                format_units(exec.usdc_sent_to_trader, USDC_DECIMALS)
            );
        }
    }

    let _ = writeln!(
        out,
        "Explorer: {}",
        explorer_tx_url(explorer_base, &event.meta.transaction_hash)
    );
    let _ = writeln!(out, "{}", RULE);
    out
}

fn write_meta(out: &mut String, meta: &EventMeta) {
    let _ = writeln!(out, "Block: {}", meta.block_number);
    let _ = writeln!(out, "Timestamp: {}", format_timestamp(meta.timestamp));
    let _ = writeln!(out, "Transaction: 0x{:x}", meta.transaction_hash);
    let _ = writeln!(out, "Log Index: {}", meta.log_index);
}

/// Totals over a historical query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub fee_events: usize,
    pub market_events: usize,
    pub positive_fees: usize,
    pub negative_fees: usize,
    /// Sum of fee values regardless of sign, 6 decimals
    pub total_fee_value: U256,
    /// Sum of `positionSizeUsdc` over executions, 6 decimals
    pub total_market_volume: U256,
}

impl Summary {
    pub fn from_events<'a>(events: impl IntoIterator<Item = &'a DecodedEvent>) -> Self {
        let mut summary = Summary::default();
        for event in events {
            summary.record(event);
        }
        summary
    }

    pub fn record(&mut self, event: &DecodedEvent) {
        self.total += 1;
        match &event.body {
            EventBody::DevGovFeeCharged(fee) => {
                self.fee_events += 1;
                if fee.is_positive {
                    self.positive_fees += 1;
                } else {
                    self.negative_fees += 1;
                }
                self.total_fee_value = self.total_fee_value.saturating_add(fee.value_usdc);
            }
            EventBody::MarketExecuted(exec) => {
                self.market_events += 1;
                self.total_market_volume = self
                    .total_market_volume
                    .saturating_add(exec.position_size_usdc);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "SUMMARY STATISTICS");
        let _ = writeln!(out, "{}", RULE);
        let _ = writeln!(out, "Total Events: {}", self.total);
        let _ = writeln!(out, "DevGovFeeCharged Events: {}", self.fee_events);
        let _ = writeln!(out, "MarketExecuted Events: {}", self.market_events);
        let _ = writeln!(out, "Positive Fee Events: {}", self.positive_fees);
        let _ = writeln!(out, "Negative Fee Events: {}", self.negative_fees);
        let _ = writeln!(
            out,
            "Total Fee Value: {} USDC",
            format_units_fixed(self.total_fee_value, USDC_DECIMALS)
        );
        let _ = writeln!(
            out,
            "Total Market Volume: {} USDC",
            format_units_fixed(self.total_market_volume, USDC_DECIMALS)
        );
        let _ = writeln!(out, "{}", RULE);
        out
    }

    pub fn to_json(&self) -> Value {
        json!({
            "totalEvents": self.total,
            "devGovFeeChargedEvents": self.fee_events,
            "marketExecutedEvents": self.market_events,
            "positiveFeeEvents": self.positive_fees,
            "negativeFeeEvents": self.negative_fees,
            "totalFeeValueUsdc": format_units_fixed(self.total_fee_value, USDC_DECIMALS),
            "totalMarketVolumeUsdc": format_units_fixed(self.total_market_volume, USDC_DECIMALS),
        })
    }
}
