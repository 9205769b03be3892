//! Orchestrates C1-C6 into a single payment verdict.
//!
//! This is the largest and most subtle component: cache lookup, bounded
//! ledger-fetch retry, success/freshness checks, transfer extraction and
//! matching, and writing the verdict back to the cache.

use crate::cache::{VerificationCache, DEFAULT_TTL_SECONDS};
use crate::currency::usd_to_micro;
use crate::errors::VerificationErrorCode;
use crate::ledger::{ConfirmationLevel, LedgerClient};
use crate::retry::ledger_fetch_delay;
use crate::transfer_parser::{extract_usdc_transfers, find_matching, FetchedTransaction, MatchCriteria};
use crate::types::VerificationOutcome;
use serde_json::json;
use solana_pubkey::Pubkey;
use std::sync::Arc;
use tracing::{debug, warn};

/// TTL applied to deterministic failures that aren't permanent (§4.6 steps 4-6).
const DETERMINISTIC_FAILURE_TTL_SECONDS: i64 = DEFAULT_TTL_SECONDS;

/// TTL applied when a transaction genuinely isn't found yet, to allow propagation.
const NOT_FOUND_TTL_SECONDS: i64 = 10;

/// TTL applied to a failed-transaction verdict: the chain's outcome never changes.
const PERMANENT_TTL_SECONDS: i64 = 10 * 365 * 24 * 3600;

/// Bounded retry attempts for the ledger fetch step.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Configuration for a [`Verifier`].
pub struct VerifierConfig {
    ledger_client: Arc<dyn LedgerClient>,
    cache: Arc<dyn VerificationCache>,
    usdc_mint: Pubkey,
    max_payment_age_ms: i64,
    confirmation_level: ConfirmationLevel,
}

impl VerifierConfig {
    /// Creates a configuration with the spec's defaults
    /// (`maxPaymentAgeMs=300_000`, `confirmationLevel="confirmed"`).
    pub fn new(ledger_client: Arc<dyn LedgerClient>, cache: Arc<dyn VerificationCache>, usdc_mint: Pubkey) -> Self {
        VerifierConfig {
            ledger_client,
            cache,
            usdc_mint,
            max_payment_age_ms: 300_000,
            confirmation_level: ConfirmationLevel::Confirmed,
        }
    }

    /// Overrides the freshness window.
    pub fn with_max_payment_age_ms(mut self, ms: i64) -> Self {
        self.max_payment_age_ms = ms;
        self
    }

    /// Overrides the confirmation depth requested from the ledger.
    pub fn with_confirmation_level(mut self, level: ConfirmationLevel) -> Self {
        self.confirmation_level = level;
        self
    }
}

/// Verifies that a claimed settlement-chain transaction pays a required
/// amount to a specific token account, has not been replayed, and is fresh.
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    /// Builds a verifier from an injected ledger client, cache, and mint.
    /// No process-wide singletons: construct one per application.
    pub fn new(config: VerifierConfig) -> Self {
        Verifier { config }
    }

    /// Runs the full verification algorithm for one claimed payment.
    ///
    /// Always returns a [`VerificationOutcome`] — every failure mode is a
    /// classified variant, never a propagated Rust error.
    pub async fn verify_payment(
        &self,
        signature: &str,
        expected_recipient_token_acct: &str,
        required_usd: f64,
    ) -> VerificationOutcome {
        if let Some(outcome) = self.check_cache(signature).await {
            return outcome;
        }

        let tx = match self.fetch_with_retry(signature).await {
            Some(tx) => tx,
            None => {
                let outcome = VerificationOutcome::failed(VerificationErrorCode::TxNotFound, "transaction not found after retries");
                self.cache_outcome(signature, outcome.clone(), NOT_FOUND_TTL_SECONDS).await;
                return outcome;
            }
        };

        if let Some(err) = &tx.error {
            let outcome = VerificationOutcome::failed(VerificationErrorCode::TxFailed, format!("transaction executed with error: {err}"));
            self.cache_outcome(signature, outcome.clone(), PERMANENT_TTL_SECONDS).await;
            return outcome;
        }

        let block_time = match tx.block_time {
            Some(bt) => bt,
            None => {
                let outcome = VerificationOutcome::failed(VerificationErrorCode::VerificationError, "transaction has no block time");
                self.cache_outcome(signature, outcome.clone(), NOT_FOUND_TTL_SECONDS).await;
                return outcome;
            }
        };

        let now_ms = chrono::Utc::now().timestamp_millis();
        if now_ms - block_time * 1000 > self.config.max_payment_age_ms {
            let outcome = VerificationOutcome::failed(VerificationErrorCode::TxExpired, "transaction is older than the freshness window");
            self.cache_outcome(signature, outcome.clone(), DETERMINISTIC_FAILURE_TTL_SECONDS).await;
            return outcome;
        }

        let transfers = extract_usdc_transfers(&tx, &self.config.usdc_mint);
        if transfers.is_empty() {
            let outcome = VerificationOutcome::failed(VerificationErrorCode::NoUsdcTransfer, "no transfer of the configured mint found");
            self.cache_outcome(signature, outcome.clone(), DETERMINISTIC_FAILURE_TTL_SECONDS).await;
            return outcome;
        }

        let min_amount = match usd_to_micro(required_usd) {
            Ok(amount) => amount,
            Err(e) => return VerificationOutcome::failed(VerificationErrorCode::VerificationError, e.to_string()),
        };
        let mint_str = self.config.usdc_mint.to_string();
        let matched = find_matching(
            &transfers,
            MatchCriteria {
                dest_acct: expected_recipient_token_acct,
                min_amount,
                mint: &mint_str,
            },
        );

        let matched = match matched {
            Some(transfer) => transfer,
            None => {
                let outcome = VerificationOutcome::failed_with_details(
                    VerificationErrorCode::TransferMismatch,
                    "no transfer satisfied the required recipient/amount",
                    json!({ "found": transfers, "required": min_amount }),
                );
                self.cache_outcome(signature, outcome.clone(), DETERMINISTIC_FAILURE_TTL_SECONDS).await;
                return outcome;
            }
        };

        let outcome = VerificationOutcome::Verified {
            transfer: matched,
            block_time,
            slot: tx.slot,
            signature: signature.to_string(),
        };
        let ttl = (self.config.max_payment_age_ms / 1000).max(DEFAULT_TTL_SECONDS);
        self.cache_outcome(signature, outcome.clone(), ttl).await;
        outcome
    }

    async fn check_cache(&self, signature: &str) -> Option<VerificationOutcome> {
        let entry = match self.config.cache.get(signature).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "cache lookup failed; treating as miss");
                return None;
            }
        };
        let entry = entry?;
        if entry.outcome.is_verified() {
            debug!(signature, "replay detected: signature already produced a successful verdict");
            return Some(VerificationOutcome::failed_with_details(
                VerificationErrorCode::ReplayAttack,
                "this signature has already satisfied a prior request",
                json!({ "originalVerdict": entry.outcome }),
            ));
        }
        match entry.outcome.error_code() {
            Some(code) if code.is_transient() => None,
            _ => Some(entry.outcome),
        }
    }

    async fn fetch_with_retry(&self, signature: &str) -> Option<FetchedTransaction> {
        for attempt in 0..MAX_FETCH_ATTEMPTS {
            match self.config.ledger_client.get_transaction(signature, self.config.confirmation_level).await {
                Ok(Some(tx)) => return Some(tx),
                Ok(None) => debug!(signature, attempt, "transaction not yet visible to ledger client"),
                Err(e) => warn!(signature, attempt, error = %e, "ledger fetch failed, will retry"),
            }
            if attempt + 1 < MAX_FETCH_ATTEMPTS {
                tokio::time::sleep(ledger_fetch_delay(attempt)).await;
            }
        }
        None
    }

    async fn cache_outcome(&self, signature: &str, outcome: VerificationOutcome, ttl_seconds: i64) {
        if let Err(e) = self.config.cache.put(signature, outcome, ttl_seconds).await {
            warn!(signature, error = %e, "failed to persist verification verdict to cache");
        }
    }
}
