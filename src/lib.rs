//! # x402-solana
//!
//! An HTTP 402 payment-gating protocol for Solana: a server issues a 402
//! challenge naming an SPL-token amount and receiving token account, the
//! client broadcasts a transfer and retries with a proof-of-payment header,
//! and the server verifies the claimed transaction on-ledger before serving
//! the resource.
//!
//! ## Components
//!
//! - [`transfer_parser`] — decodes SPL-token `Transfer`/`TransferChecked`
//!   instructions out of a fetched transaction.
//! - [`currency`] — USD ⟷ token-micro-unit fixed-point conversion.
//! - [`challenge`] — builds 402 challenge documents, deriving the recipient's
//!   associated token account.
//! - [`codec`] — base64(JSON) round-trip and schema validation for challenges
//!   and payment headers.
//! - [`cache`] — replay/verification cache, in-memory or Redis-backed.
//! - [`ledger`] — the abstract transaction-fetch capability `Verifier` depends on.
//! - [`retry`] — shared backoff-delay computation.
//! - [`verifier`] — orchestrates the above into a single verification verdict.
//! - [`handler`] — framework-agnostic request dispatch built on `verifier`.
//! - [`client`] — request wrapper that pays on 402 and retries once.
//! - [`webhook`] — signed webhook queue and delivery dispatcher.
//! - [`config`] — environment-driven configuration.
//! - [`types`] — the wire-level and internal data model shared by every module.
//! - [`errors`] — the error taxonomy.
//!
//! ## Quick Start
//!
//! ### Server: issuing and verifying a challenge
//!
//! ```ignore
//! use x402_solana::challenge::ChallengeGenerator;
//! use x402_solana::verifier::{Verifier, VerifierConfig};
//! use x402_solana::handler::ChallengeHandler;
//! use x402_solana::cache::InMemoryVerificationCache;
//! use solana_pubkey::Pubkey;
//! use std::str::FromStr;
//! use std::sync::Arc;
//!
//! # async fn example(ledger: Arc<dyn x402_solana::ledger::LedgerClient>) -> Result<(), Box<dyn std::error::Error>> {
//! let wallet = Pubkey::from_str("11111111111111111111111111111111")?;
//! let mint = Pubkey::from_str("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU")?;
//! let generator = ChallengeGenerator::new(wallet, "solana-devnet", mint, spl_token::ID);
//!
//! let cache = Arc::new(InMemoryVerificationCache::new());
//! let verifier = Verifier::new(VerifierConfig::new(ledger, cache, mint));
//!
//! let handler = ChallengeHandler::new(verifier, generator, 0.01);
//! let outcome = handler.handle("/api/premium", None).await;
//! # let _ = outcome;
//! # Ok(())
//! # }
//! ```
//!
//! ## Protocol Overview
//!
//! 1. **Client requests a resource.**
//! 2. **Server responds 402** with a challenge naming accepted payment options.
//! 3. **Client broadcasts a transfer** via its `TransferSender` and confirms it.
//! 4. **Client retries** with `X-PAYMENT: base64(JSON(PaymentHeader))`.
//! 5. **Server verifies** the claimed signature: fetch, check success, check
//!    freshness, extract transfers, match against the required amount/recipient.
//! 6. **Server responds 200** and enqueues any configured webhook notifications.
//!
//! ## Security
//!
//! - **Replay protection**: a successfully-verified signature is cached and
//!   rejected on reuse (`REPLAY_ATTACK`).
//! - **Freshness window**: transactions older than the challenge's timeout are
//!   rejected (`TX_EXPIRED`).
//! - **Webhook signing**: outbound webhook bodies carry an HMAC-SHA256
//!   signature, verified by receivers in constant time.
//!
//! ## References
//!
//! - [x402.org](https://x402.org)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cache;
pub mod challenge;
pub mod client;
pub mod codec;
pub mod config;
pub mod currency;
pub mod errors;
pub mod handler;
pub mod ledger;
pub mod retry;
pub mod transfer_parser;
pub mod types;
pub mod verifier;
pub mod webhook;

pub use errors::{Result, X402Error};
pub use types::{PaymentHeader, PaymentRequiredResponse, PaymentRequirements, VerificationOutcome, X402_VERSION};
