//! Error types for the x402-solana library.
//!
//! This module defines the taxonomy of verification error codes the spec requires
//! plus the local error variants used by configuration, encoding, and I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes that a `Verifier` can return in a `VerificationResult::Err`.
///
/// These map 1:1 onto the wire-level error codes carried in 402 responses and
/// webhook failure payloads, so `code()` returns the exact string and the
/// serde representation uses the same strings on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationErrorCode {
    /// The `X-PAYMENT` header was missing required fields, malformed, or used
    /// an unsupported scheme/network.
    #[serde(rename = "INVALID_HEADER")]
    InvalidHeader,
    /// The claimed transaction signature does not exist on the ledger (or the
    /// ledger client could not locate it after its retry budget).
    #[serde(rename = "TX_NOT_FOUND")]
    TxNotFound,
    /// The transaction landed but executed with an error.
    #[serde(rename = "TX_FAILED")]
    TxFailed,
    /// No token transfer for the configured mint was found in the transaction.
    #[serde(rename = "NO_USDC_TRANSFER")]
    NoUsdcTransfer,
    /// A transfer was found but it targets the wrong token account or is
    /// short of the required amount.
    #[serde(rename = "TRANSFER_MISMATCH")]
    TransferMismatch,
    /// The transaction is older than the configured freshness window.
    #[serde(rename = "TX_EXPIRED")]
    TxExpired,
    /// This signature has already produced a successful verdict.
    #[serde(rename = "REPLAY_ATTACK")]
    ReplayAttack,
    /// An error that doesn't fit the other categories but isn't necessarily
    /// retryable (e.g. cache serialization failure).
    #[serde(rename = "VERIFICATION_ERROR")]
    VerificationError,
    /// A ledger or cache RPC call failed transiently; callers may retry.
    #[serde(rename = "RPC_ERROR")]
    RpcError,
}

impl VerificationErrorCode {
    /// The stable wire string for this code, used in JSON bodies.
    pub fn code(&self) -> &'static str {
        match self {
            VerificationErrorCode::InvalidHeader => "INVALID_HEADER",
            VerificationErrorCode::TxNotFound => "TX_NOT_FOUND",
            VerificationErrorCode::TxFailed => "TX_FAILED",
            VerificationErrorCode::NoUsdcTransfer => "NO_USDC_TRANSFER",
            VerificationErrorCode::TransferMismatch => "TRANSFER_MISMATCH",
            VerificationErrorCode::TxExpired => "TX_EXPIRED",
            VerificationErrorCode::ReplayAttack => "REPLAY_ATTACK",
            VerificationErrorCode::VerificationError => "VERIFICATION_ERROR",
            VerificationErrorCode::RpcError => "RPC_ERROR",
        }
    }

    /// Whether a cached entry carrying this code should be treated as
    /// retryable (i.e. the verifier should ignore the cache hit and re-fetch)
    /// rather than returned verbatim.
    pub fn is_transient(&self) -> bool {
        matches!(self, VerificationErrorCode::RpcError | VerificationErrorCode::TxNotFound)
    }
}

impl std::fmt::Display for VerificationErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Main error type for x402-solana operations.
#[derive(Error, Debug)]
pub enum X402Error {
    /// A verification step produced one of the taxonomy's classified failures.
    #[error("verification failed [{code}]: {message}")]
    Verification {
        /// The classified error code.
        code: VerificationErrorCode,
        /// Human-readable detail.
        message: String,
    },

    /// Error during HTTP request/response handling.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Error during JSON serialization/deserialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error during Base64 encoding/decoding.
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Error parsing a URL.
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Error parsing a Solana address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount (non-finite, negative, or unparseable).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook signing or verification failure.
    #[error("webhook signature error: {0}")]
    WebhookSignature(String),

    /// Durable cache/queue backend error (Redis).
    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Timeout waiting on a bounded operation (ledger confirmation, webhook POST).
    #[error("timeout exceeded: {0}")]
    Timeout(String),

    /// No payment requirement in the challenge matched the client's configuration.
    #[error("unsupported payment requirements")]
    UnsupportedPaymentRequirements,

    /// The configured wallet does not hold enough balance to pay.
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance {
        /// Balance held, in micro-units.
        have: u64,
        /// Balance required, in micro-units.
        need: u64,
    },

    /// Generic error with a custom message.
    #[error("{0}")]
    Other(String),
}

impl X402Error {
    /// Convenience constructor for classified verification failures.
    pub fn verification(code: VerificationErrorCode, message: impl Into<String>) -> Self {
        X402Error::Verification {
            code,
            message: message.into(),
        }
    }

    /// Returns the taxonomy code for this error, if it is a classified
    /// verification failure.
    pub fn code(&self) -> Option<VerificationErrorCode> {
        match self {
            X402Error::Verification { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type alias for x402-solana operations.
pub type Result<T> = std::result::Result<T, X402Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = X402Error::verification(VerificationErrorCode::TxExpired, "400s old");
        assert_eq!(err.to_string(), "verification failed [TX_EXPIRED]: 400s old");
    }

    #[test]
    fn test_error_code_roundtrip() {
        let err = X402Error::verification(VerificationErrorCode::ReplayAttack, "seen before");
        assert_eq!(err.code(), Some(VerificationErrorCode::ReplayAttack));
        assert_eq!(err.code().unwrap().code(), "REPLAY_ATTACK");
    }

    #[test]
    fn test_transient_classification() {
        assert!(VerificationErrorCode::RpcError.is_transient());
        assert!(VerificationErrorCode::TxNotFound.is_transient());
        assert!(!VerificationErrorCode::TxFailed.is_transient());
        assert!(!VerificationErrorCode::ReplayAttack.is_transient());
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let x402_err: X402Error = json_err.into();
        assert!(matches!(x402_err, X402Error::Json(_)));
    }
}
