//! The abstract ledger-fetch capability the verifier depends on.
//!
//! `LedgerClient` is intentionally thin: fetch a confirmed transaction by its
//! signature, or report that it isn't there yet. RPC framing, connection
//! pooling, and retries at the transport level are a real client's concern
//! and out of scope for this crate — the verifier layers its own bounded
//! retry (see [`crate::retry`]) on top of whatever this trait returns.

use crate::transfer_parser::FetchedTransaction;
use async_trait::async_trait;

/// Confirmation depth to request when fetching a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationLevel {
    /// Seen by the leader, not yet voted on.
    Processed,
    /// Voted on by a supermajority of the cluster. The spec's default.
    #[default]
    Confirmed,
    /// Rooted; cannot be rolled back.
    Finalized,
}

/// Fetches confirmed transactions from the settlement chain.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Returns the transaction at `signature`, or `None` if it hasn't landed
    /// (or hasn't propagated to this node) at the requested confirmation
    /// level yet. Network/RPC failures should be surfaced as `Err` so the
    /// caller's retry loop can distinguish "not found" from "couldn't ask".
    async fn get_transaction(
        &self,
        signature: &str,
        confirmation_level: ConfirmationLevel,
    ) -> crate::errors::Result<Option<FetchedTransaction>>;
}

/// An in-memory [`LedgerClient`] for tests: pre-seeded transactions, with
/// optional injected transient failures per signature to exercise retry paths.
#[cfg(any(test, feature = "test-support"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A canned response for one signature.
    enum Canned {
        Found(FetchedTransaction),
        NotFound,
        /// Fails transiently `remaining` more times, then falls through to `then`.
        FlakyThen { remaining: Mutex<u32>, then: Box<Canned> },
    }

    /// A [`LedgerClient`] whose responses are configured ahead of time.
    #[derive(Default)]
    pub struct MockLedgerClient {
        responses: Mutex<HashMap<String, Canned>>,
    }

    impl MockLedgerClient {
        /// Creates an empty mock; unseeded signatures resolve to `None`.
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds a signature to resolve successfully.
        pub fn seed(&self, signature: &str, tx: FetchedTransaction) {
            self.responses.lock().unwrap().insert(signature.to_string(), Canned::Found(tx));
        }

        /// Seeds a signature to fail transiently `failures` times before
        /// resolving to `tx`.
        pub fn seed_flaky(&self, signature: &str, failures: u32, tx: FetchedTransaction) {
            self.responses.lock().unwrap().insert(
                signature.to_string(),
                Canned::FlakyThen {
                    remaining: Mutex::new(failures),
                    then: Box::new(Canned::Found(tx)),
                },
            );
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedgerClient {
        async fn get_transaction(
            &self,
            signature: &str,
            _confirmation_level: ConfirmationLevel,
        ) -> crate::errors::Result<Option<FetchedTransaction>> {
            let responses = self.responses.lock().unwrap();
            match responses.get(signature) {
                None | Some(Canned::NotFound) => Ok(None),
                Some(Canned::Found(tx)) => Ok(Some(tx.clone())),
                Some(Canned::FlakyThen { remaining, then }) => {
                    let mut remaining = remaining.lock().unwrap();
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(crate::errors::X402Error::verification(
                            crate::errors::VerificationErrorCode::RpcError,
                            "simulated transient RPC failure",
                        ));
                    }
                    match then.as_ref() {
                        Canned::Found(tx) => Ok(Some(tx.clone())),
                        _ => Ok(None),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLedgerClient;
    use super::*;

    #[tokio::test]
    async fn test_unseeded_signature_is_not_found() {
        let client = MockLedgerClient::new();
        let tx = client.get_transaction("unknown", ConfirmationLevel::Confirmed).await.unwrap();
        assert!(tx.is_none());
    }

    #[tokio::test]
    async fn test_seeded_signature_is_found() {
        let client = MockLedgerClient::new();
        client.seed("sig1", FetchedTransaction { signature: "sig1".to_string(), ..Default::default() });
        let tx = client.get_transaction("sig1", ConfirmationLevel::Confirmed).await.unwrap().unwrap();
        assert_eq!(tx.signature, "sig1");
    }

    #[tokio::test]
    async fn test_flaky_signature_eventually_resolves() {
        let client = MockLedgerClient::new();
        client.seed_flaky("sig1", 2, FetchedTransaction { signature: "sig1".to_string(), ..Default::default() });

        assert!(client.get_transaction("sig1", ConfirmationLevel::Confirmed).await.is_err());
        assert!(client.get_transaction("sig1", ConfirmationLevel::Confirmed).await.is_err());
        let tx = client.get_transaction("sig1", ConfirmationLevel::Confirmed).await.unwrap();
        assert!(tx.is_some());
    }
}
