//! Conversion between USD amounts and integer token micro-units.
//!
//! All monetary arithmetic downstream of this module uses integer micro-units;
//! floats only appear at the USD-facing edges (challenge construction, payment
//! context display).

use crate::errors::{Result, X402Error};
use regex::Regex;
use rust_decimal::prelude::*;
use std::sync::OnceLock;

/// Decimal places of a token micro-unit (1 USD = 10^DECIMALS micro-units).
pub const DECIMALS: u32 = 6;

/// `10^DECIMALS`.
pub const SCALE: u64 = 1_000_000;

fn currency_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^0-9.]").expect("static regex is valid"))
}

/// Converts a finite, non-negative USD amount to integer micro-units, flooring.
///
/// Uses exact decimal arithmetic rather than binary floating point so that
/// values like `0.0000019` floor to exactly `1` instead of being perturbed by
/// base-2 rounding error.
///
/// # Examples
///
/// ```
/// use x402_solana::currency::usd_to_micro;
///
/// assert_eq!(usd_to_micro(1.0).unwrap(), 1_000_000);
/// assert_eq!(usd_to_micro(0.0000019).unwrap(), 1);
/// ```
pub fn usd_to_micro(usd: f64) -> Result<u64> {
    if !usd.is_finite() || usd < 0.0 {
        return Err(X402Error::InvalidAmount(format!(
            "usd amount must be finite and non-negative, got {usd}"
        )));
    }
    let decimal = Decimal::from_f64(usd)
        .ok_or_else(|| X402Error::InvalidAmount(format!("cannot represent {usd} as decimal")))?;
    decimal_to_micro(decimal)
}

fn decimal_to_micro(decimal: Decimal) -> Result<u64> {
    let scaled = decimal * Decimal::from(SCALE);
    let floored = scaled.floor();
    floored
        .to_u64()
        .ok_or_else(|| X402Error::InvalidAmount(format!("amount {floored} overflows u64 micro-units")))
}

/// Converts integer micro-units back to a USD float.
///
/// # Examples
///
/// ```
/// use x402_solana::currency::micro_to_usd;
///
/// assert_eq!(micro_to_usd(1_000_000), 1.0);
/// ```
pub fn micro_to_usd(micro: u64) -> f64 {
    micro as f64 / SCALE as f64
}

/// Parses a human-entered USD string (`"$1,234.56"`, `"1234.56 USD"`, `" 0.01 "`)
/// into integer micro-units.
///
/// Strips whitespace, currency symbols, and thousand-separator commas before
/// parsing; rejects empty or non-numeric input.
///
/// # Examples
///
/// ```
/// use x402_solana::currency::parse_usd_string;
///
/// assert_eq!(parse_usd_string("$1,234.56").unwrap(), 1_234_560_000);
/// assert_eq!(parse_usd_string("0.01").unwrap(), 10_000);
/// ```
pub fn parse_usd_string(s: &str) -> Result<u64> {
    let cleaned = currency_strip_re().replace_all(s.trim(), "");
    if cleaned.is_empty() {
        return Err(X402Error::InvalidAmount(format!("empty or non-numeric amount: {s:?}")));
    }
    let decimal = Decimal::from_str(&cleaned)
        .map_err(|e| X402Error::InvalidAmount(format!("cannot parse {s:?} as a decimal amount: {e}")))?;
    if decimal.is_sign_negative() {
        return Err(X402Error::InvalidAmount(format!("amount must be non-negative: {s:?}")));
    }
    decimal_to_micro(decimal)
}

/// Whether a paid amount satisfies a required amount, both in micro-units.
///
/// # Examples
///
/// ```
/// use x402_solana::currency::sufficient;
///
/// assert!(sufficient(1_000, 1_000));
/// assert!(sufficient(1_001, 1_000));
/// assert!(!sufficient(999, 1_000));
/// ```
pub fn sufficient(paid: u64, required: u64) -> bool {
    paid >= required
}
