//! Framework-agnostic request dispatch (§4.7): decide what to do with an
//! incoming request given its `X-PAYMENT` header, if any.
//!
//! This module exposes a pure decision function. Translating its `Outcome`
//! into a concrete HTTP response (status code, body, headers) is left to a
//! framework adapter outside this crate — the same separation the teacher
//! draws between its protocol core and its `server`/`facilitator` glue.

use crate::challenge::ChallengeGenerator;
use crate::codec::decode_payment_header;
use crate::errors::VerificationErrorCode;
use crate::types::{PaymentContext, VerificationOutcome};
use crate::verifier::Verifier;

/// What the caller should do after [`ChallengeHandler::handle`] runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// No `X-PAYMENT` header (or it failed to decode/verify deterministically):
    /// respond 402 with this challenge body.
    Issue402 {
        /// Encoded challenge body, ready to write as the response.
        challenge_json: String,
        /// Error code to surface alongside the challenge, if this 402 is a
        /// rejection rather than the first request for the resource.
        code: Option<VerificationErrorCode>,
    },
    /// Verification succeeded: invoke the downstream handler with this context.
    Forward(PaymentContext),
    /// A transient failure (`RPC_ERROR`, `VERIFICATION_ERROR`) occurred:
    /// respond 500.
    ServerError {
        /// Error code to log/surface.
        code: VerificationErrorCode,
        /// Human-readable detail.
        message: String,
    },
}

/// Dispatches incoming requests: issues challenges, verifies payment headers,
/// and produces a framework-agnostic [`Outcome`].
pub struct ChallengeHandler {
    verifier: Verifier,
    challenge_generator: ChallengeGenerator,
    price_usd: f64,
}

impl ChallengeHandler {
    /// Builds a handler for one protected resource, priced in USD.
    pub fn new(verifier: Verifier, challenge_generator: ChallengeGenerator, price_usd: f64) -> Self {
        ChallengeHandler {
            verifier,
            challenge_generator,
            price_usd,
        }
    }

    /// Runs the state machine in §4.7 for one request.
    ///
    /// `payment_header` is the raw `X-PAYMENT` header value, if the request
    /// carried one. The handler never reads the request body.
    pub async fn handle(&self, resource: &str, payment_header: Option<&str>) -> Outcome {
        let header_value = match payment_header {
            Some(h) => h,
            None => return self.issue_challenge(resource, None),
        };

        let header = match decode_payment_header(header_value) {
            Ok(header) => header,
            Err(_) => return self.issue_challenge(resource, Some(VerificationErrorCode::InvalidHeader)),
        };

        let expected_token_acct = self.challenge_generator.recipient_token_account().to_string();
        let outcome = self
            .verifier
            .verify_payment(&header.payload.transaction, &expected_token_acct, self.price_usd)
            .await;

        match outcome {
            VerificationOutcome::Verified {
                transfer,
                block_time,
                slot,
                signature,
            } => Outcome::Forward(PaymentContext {
                payer: transfer.authority,
                amount: transfer.amount,
                amount_usd: crate::currency::micro_to_usd(transfer.amount),
                signature,
                block_time,
                slot,
                resource: resource.to_string(),
            }),
            VerificationOutcome::Failed { code, .. } if is_deterministic_rejection(code) => {
                self.issue_challenge(resource, Some(code))
            }
            VerificationOutcome::Failed { code, message, .. } => Outcome::ServerError { code, message },
        }
    }

    fn issue_challenge(&self, resource: &str, code: Option<VerificationErrorCode>) -> Outcome {
        let error_message = code.map(|c| format!("Payment required: {}", c.code()));
        let doc = self.challenge_generator.generate(
            self.price_usd,
            resource,
            crate::challenge::ChallengeOptions {
                error_message,
                ..Default::default()
            },
        );
        let challenge_json = match doc.and_then(|d| crate::codec::encode_challenge(&d)) {
            Ok(encoded) => encoded,
            Err(_) => String::new(),
        };
        Outcome::Issue402 { challenge_json, code }
    }
}

/// Rejections that map to a fresh 402, as opposed to a 500.
fn is_deterministic_rejection(code: VerificationErrorCode) -> bool {
    matches!(
        code,
        VerificationErrorCode::ReplayAttack
            | VerificationErrorCode::InvalidHeader
            | VerificationErrorCode::TransferMismatch
            | VerificationErrorCode::TxExpired
            | VerificationErrorCode::TxNotFound
            | VerificationErrorCode::TxFailed
            | VerificationErrorCode::NoUsdcTransfer
    )
}
