//! Fixed-point scaling for on-chain integers
//!
//! USDC amounts carry 6 implied decimals, prices and token sizes 18.
//! Scaled strings are for display only; raw integers stay the source of truth.

use alloy_primitives::{I256, U256};
use anyhow::{Context, Result};

/// Decimals of USDC-denominated fields.
pub const USDC_DECIMALS: u8 = 6;

/// Decimals of price, price impact, token size, TP and SL fields.
pub const PRICE_DECIMALS: u8 = 18;

fn ten_pow(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Render `raw / 10^decimals` with trailing fractional zeros trimmed.
///
/// Whole values print without a decimal point: `1000000` at 6 decimals is `"1"`,
/// `1500000` is `"1.5"`.
pub fn format_units(raw: U256, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let divisor = ten_pow(decimals);
    let whole = raw / divisor;
    let frac = raw % divisor;
    if frac == U256::ZERO {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Render with exactly `decimals` fractional digits (`"12.500000"`).
pub fn format_units_fixed(raw: U256, decimals: u8) -> String {
    if decimals == 0 {
        return raw.to_string();
    }
    let divisor = ten_pow(decimals);
    format!(
        "{}.{:0>width$}",
        raw / divisor,
        (raw % divisor).to_string(),
        width = decimals as usize
    )
}

/// Signed variant of [`format_units`].
pub fn format_signed_units(raw: I256, decimals: u8) -> String {
    let magnitude = format_units(raw.unsigned_abs(), decimals);
    if raw.is_negative() {
        format!("-{}", magnitude)
    } else {
        magnitude
    }
}

/// Parse a human decimal back into its raw integer.
///
/// Fractional digits beyond `decimals` are truncated.
pub fn parse_units(text: &str, decimals: u8) -> Result<U256> {
    let text = text.trim();
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        anyhow::bail!("Empty decimal value");
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid decimal value: {}", text);
    }

    let frac: String = frac
        .chars()
        .chain(std::iter::repeat('0'))
        .take(decimals as usize)
        .collect();
    let digits = format!("{}{}", whole, frac);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).with_context(|| format!("Value out of range: {}", text))
}
