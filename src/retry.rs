//! Backoff delay computation shared by the verifier's ledger-fetch retry and
//! the webhook dispatcher's delivery retry, so both follow one tested formula.

use crate::types::BackoffStrategy;
use std::time::Duration;

/// Computes the delay before the `attempt`-th retry (0-indexed), capped at `max_delay`.
///
/// - `Exponential`: `initial * 2^attempt`, capped by `max`.
/// - `Linear`: `initial * (attempt + 1)`, capped by `max`.
///
/// # Examples
///
/// ```
/// use x402_solana::retry::backoff_delay_ms;
/// use x402_solana::types::BackoffStrategy;
///
/// assert_eq!(backoff_delay_ms(BackoffStrategy::Exponential, 100, 5_000, 0), 100);
/// assert_eq!(backoff_delay_ms(BackoffStrategy::Exponential, 100, 5_000, 3), 800);
/// assert_eq!(backoff_delay_ms(BackoffStrategy::Linear, 100, 5_000, 3), 400);
/// ```
pub fn backoff_delay_ms(strategy: BackoffStrategy, initial_delay_ms: u64, max_delay_ms: u64, attempt: u32) -> u64 {
    let raw = match strategy {
        BackoffStrategy::Exponential => initial_delay_ms.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX)),
        BackoffStrategy::Linear => initial_delay_ms.saturating_mul(attempt as u64 + 1),
    };
    raw.min(max_delay_ms)
}

/// `backoff_delay_ms` as a `Duration`, for direct use with `tokio::time::sleep`.
pub fn backoff_delay(strategy: BackoffStrategy, initial_delay_ms: u64, max_delay_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(backoff_delay_ms(strategy, initial_delay_ms, max_delay_ms, attempt))
}

/// Fixed exponential schedule used for the ledger-fetch retry (§4.6 step 2):
/// 100ms -> 5000ms cap, independent of the webhook queue's per-subscriber policy.
pub fn ledger_fetch_delay(attempt: u32) -> Duration {
    backoff_delay(BackoffStrategy::Exponential, 100, 5_000, attempt)
}
