//! Core type definitions for the x402 Solana payment-gating protocol.
//!
//! This module contains the wire-level data model: the 402 challenge document,
//! the client's payment header, the verifier's internal transfer/result types,
//! the cache entry shape, and the webhook queue entry shape.

use crate::errors::VerificationErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the x402 protocol.
pub const X402_VERSION: u32 = 1;

/// Response returned by a server when payment is required (HTTP 402).
///
/// Contains the list of accepted payment requirements that the client can choose from.
///
/// # Examples
///
/// ```
/// use x402_solana::types::PaymentRequiredResponse;
///
/// let response = PaymentRequiredResponse {
///     x402_version: 1,
///     accepts: vec![],
///     error: None,
/// };
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentRequiredResponse {
    /// Protocol version (currently 1).
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Ordered, non-empty list of accepted payment options.
    pub accepts: Vec<PaymentRequirements>,

    /// Human message shown when no header is present, or naming the specific
    /// reason a submitted header was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The receiving token account and mint for one payment option.
///
/// `address` is a token-account address, never the owning wallet — on Solana,
/// SPL-token transfers target token accounts, not wallets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PayTo {
    /// Receiving token-account address.
    pub address: String,
    /// Token mint address.
    pub asset: String,
}

/// One entry of a 402 challenge's `accepts` list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentRequirements {
    /// Payment scheme. Only `"exact"` is supported by this core.
    pub scheme: String,

    /// Namespaced network identifier, e.g. `"solana-devnet"`.
    pub network: String,

    /// Stringified positive integer, token micro-units.
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,

    /// Receiving token account and mint.
    #[serde(rename = "payTo")]
    pub pay_to: PayTo,

    /// Opaque string naming the protected resource (usually the URL path).
    pub resource: String,

    /// Short human-readable purpose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Maximum age in seconds of a satisfying transfer once seen on-ledger.
    pub timeout: u64,

    /// MIME type of the resource body on success.
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Client → server proof-of-payment envelope, base64(JSON) in `X-PAYMENT`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentHeader {
    /// Protocol version.
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Must match one of the challenge's `accepts[].scheme`.
    pub scheme: String,

    /// Must match one of the challenge's `accepts[].network`.
    pub network: String,

    /// Scheme-specific payload.
    pub payload: PaymentHeaderPayload,
}

/// The `"exact"` scheme's payload: a settlement-chain transaction signature.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentHeaderPayload {
    /// The settlement-chain transaction signature, a 64-128 char opaque identifier.
    pub transaction: String,

    /// Reserved for future extensions; ignored by the "exact" scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<Value>,
}

/// Position of a decoded instruction within its transaction, for diagnostics only.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionIndex {
    /// Index of the outer (top-level) instruction.
    pub outer: usize,
    /// Index of the inner instruction within `outer`, if this came from a CPI.
    pub inner: Option<usize>,
}

/// A single decoded SPL-token transfer, output of `TransferParser`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParsedTransfer {
    /// Source token-account address.
    pub source: String,
    /// Destination token-account address.
    pub destination: String,
    /// Signing wallet address that authorized the transfer.
    pub authority: String,
    /// Token mint address.
    pub mint: String,
    /// Transfer amount in integer micro-units.
    pub amount: u64,
    /// Where this transfer was decoded from, for diagnostics only.
    pub instruction_index: InstructionIndex,
}

/// Closed sum type for a verification attempt's outcome.
///
/// The source system distinguishes these by presence/absence of optional
/// fields; here they are a single exhaustively-matched enum, per the
/// dynamic-typing-to-tagged-variants design note.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    /// The transaction was confirmed, fresh, unreplayed, and paid enough to
    /// the expected recipient.
    Verified {
        /// The matched transfer.
        transfer: ParsedTransfer,
        /// Unix seconds the block was produced.
        block_time: i64,
        /// Ledger slot.
        slot: u64,
        /// The transaction signature that was verified.
        signature: String,
    },
    /// The transaction failed one of the verification checks.
    Failed {
        /// Classified error code.
        code: VerificationErrorCode,
        /// Human-readable detail.
        message: String,
        /// Optional machine-readable context (e.g. the transfers found).
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl VerificationOutcome {
    /// Builds a `Failed` outcome with no extra details.
    pub fn failed(code: VerificationErrorCode, message: impl Into<String>) -> Self {
        VerificationOutcome::Failed {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Builds a `Failed` outcome carrying machine-readable context.
    pub fn failed_with_details(
        code: VerificationErrorCode,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        VerificationOutcome::Failed {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Returns the error code if this outcome is `Failed`.
    pub fn error_code(&self) -> Option<VerificationErrorCode> {
        match self {
            VerificationOutcome::Failed { code, .. } => Some(*code),
            VerificationOutcome::Verified { .. } => None,
        }
    }

    /// Whether this outcome represents a successful verification.
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationOutcome::Verified { .. })
    }
}

/// A cached verdict keyed by transaction signature, with absolute expiry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// The verdict reached the first time this signature was verified.
    pub outcome: VerificationOutcome,
    /// Absolute unix-second timestamp after which this entry is stale.
    pub expires_at: i64,
}

impl CacheEntry {
    /// Whether this entry is still valid at the given unix-second timestamp.
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// Payment context surfaced to downstream handlers after a successful verify.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentContext {
    /// The paying wallet (transfer authority).
    pub payer: String,
    /// Amount paid, in micro-units.
    pub amount: u64,
    /// Amount paid, in USD.
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
    /// The verified transaction signature.
    pub signature: String,
    /// Unix seconds the block was produced.
    pub block_time: i64,
    /// Ledger slot.
    pub slot: u64,
    /// The protected resource this payment satisfies.
    pub resource: String,
}

/// Backoff strategy for webhook delivery retries.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// `delay = initial_delay * 2^attempts`, capped at `max_delay`.
    Exponential,
    /// `delay = initial_delay * (attempts + 1)`, capped at `max_delay`.
    Linear,
}

/// Retry policy for one webhook subscriber.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts (including the first) before the entry is dead-lettered.
    pub max_attempts: u32,
    /// Initial delay before the first retry, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound on any computed delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Growth function applied to successive retries.
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff: BackoffStrategy::Exponential,
        }
    }
}

/// Destination and signing secret for one webhook subscriber.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookConfig {
    /// URL to POST the signed payload to.
    pub url: String,
    /// Shared secret used to compute `X-Webhook-Signature`.
    pub secret: String,
    /// Retry policy for this subscriber.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// The kind of event a webhook payload reports.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEvent {
    /// A payment was verified successfully.
    PaymentVerified,
    /// A payment attempt failed verification.
    PaymentFailed,
}

/// Body data carried in a webhook's `data` field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookData {
    /// The transaction signature involved.
    pub signature: String,
    /// The paying wallet, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Amount in micro-units, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// The protected resource this payment was for.
    pub resource: String,
    /// Additional machine-readable context (e.g. failure code).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// The JSON body POSTed to a webhook subscriber.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    /// The event kind.
    pub event: WebhookEvent,
    /// Unix-millisecond timestamp the event was recorded.
    pub timestamp: i64,
    /// Event-specific data.
    pub data: WebhookData,
}

/// A queued, not-yet-delivered (or still-retrying) webhook notification.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueuedWebhook {
    /// Unique identifier for this queue entry.
    pub id: String,
    /// Destination and retry policy.
    pub config: WebhookConfig,
    /// The body to deliver.
    pub payload: WebhookPayload,
    /// Number of delivery attempts made so far.
    pub attempts: u32,
    /// Absolute unix-millisecond timestamp of the next allowed attempt.
    pub next_attempt: i64,
    /// The error from the most recent failed attempt, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Unix-millisecond timestamp this entry was created.
    pub created_at: i64,
}
