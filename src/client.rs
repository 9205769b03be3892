//! Client-side request wrapper (§4.8): issue a request, pay on 402, retry once.
//!
//! Key-pair management and transaction construction are an external
//! `TransferSender` capability — this module drives that trait but never
//! signs anything itself.

use crate::codec::{decode_challenge, encode_payment_header};
use crate::currency::usd_to_micro;
use crate::errors::{Result, X402Error};
use crate::types::{PaymentHeader, PaymentHeaderPayload, PaymentRequirements};
use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Abstract capability to check a balance and broadcast an SPL-token transfer.
///
/// A real implementation holds the payer's keypair and talks to the ledger;
/// this crate only calls through the trait.
#[async_trait]
pub trait TransferSender: Send + Sync {
    /// Returns the payer's current balance of `mint`, in micro-units.
    async fn balance(&self, mint: &str) -> Result<u64>;

    /// Broadcasts a transfer of `amount_micro` of `mint` to `destination`
    /// (a token-account address) and returns the signature once confirmed at
    /// the configured level.
    async fn send_token(&self, destination: &str, amount_micro: u64, mint: &str) -> Result<String>;
}

/// Configuration for an [`X402ClientAgent`].
#[derive(Clone)]
pub struct X402ClientConfig {
    /// HTTP client used for the wrapped requests.
    pub http_client: Client,
    /// Namespaced network this client is configured to pay on (e.g. `"solana-devnet"`).
    pub network: String,
    /// Whether to automatically pay and retry on 402. `false` returns 402s untouched.
    pub auto_retry: bool,
}

impl X402ClientConfig {
    /// Creates a configuration for a given network, with auto-retry enabled.
    pub fn new(network: impl Into<String>) -> Self {
        X402ClientConfig {
            http_client: Client::new(),
            network: network.into(),
            auto_retry: true,
        }
    }

    /// Disables automatic payment-and-retry.
    pub fn without_auto_retry(mut self) -> Self {
        self.auto_retry = false;
        self
    }

    /// Sets a custom HTTP client.
    pub fn with_client(mut self, client: Client) -> Self {
        self.http_client = client;
        self
    }
}

/// Drives the request → 402 → pay → retry flow for one or more requests.
pub struct X402ClientAgent<S: TransferSender> {
    config: X402ClientConfig,
    sender: S,
}

impl<S: TransferSender> X402ClientAgent<S> {
    /// Builds an agent from a client configuration and an injected transfer sender.
    pub fn new(config: X402ClientConfig, sender: S) -> Self {
        X402ClientAgent { config, sender }
    }

    /// Runs the full §4.8 flow for a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.fetch(Method::GET, url, None).await
    }

    /// Runs the full §4.8 flow for a POST request with a JSON body.
    pub async fn post(&self, url: &str, body: Value) -> Result<Response> {
        self.fetch(Method::POST, url, Some(body)).await
    }

    /// Issues the request, pays exactly once on a 402, and retries exactly once.
    pub async fn fetch(&self, method: Method, url: &str, body: Option<Value>) -> Result<Response> {
        let response = self.send(method.clone(), url, body.as_ref()).await?;

        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }
        if !self.config.auto_retry {
            return Ok(response);
        }

        let challenge = response.json::<crate::types::PaymentRequiredResponse>().await?;
        let requirement = select_requirement(&challenge.accepts, &self.config.network)?;

        let amount_micro: u64 = requirement
            .max_amount_required
            .parse()
            .map_err(|_| X402Error::InvalidAmount(requirement.max_amount_required.clone()))?;

        let balance = self.sender.balance(&requirement.pay_to.asset).await?;
        if balance < amount_micro {
            return Err(X402Error::InsufficientBalance {
                have: balance,
                need: amount_micro,
            });
        }

        let signature = tokio::time::timeout(
            Duration::from_secs(requirement.timeout),
            self.sender.send_token(&requirement.pay_to.address, amount_micro, &requirement.pay_to.asset),
        )
        .await
        .map_err(|_| X402Error::Timeout("payment broadcast did not confirm within the challenge timeout".to_string()))??;

        let header = PaymentHeader {
            x402_version: crate::types::X402_VERSION,
            scheme: requirement.scheme.clone(),
            network: requirement.network.clone(),
            payload: PaymentHeaderPayload {
                transaction: signature,
                authorization: None,
            },
        };
        let encoded = encode_payment_header(&header)?;

        self.send_with_header(method, url, body.as_ref(), &encoded).await
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response> {
        let mut request = self.config.http_client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn send_with_header(&self, method: Method, url: &str, body: Option<&Value>, payment_header: &str) -> Result<Response> {
        let mut request = self.config.http_client.request(method, url).header("X-PAYMENT", payment_header);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }
}

/// Selects the first `accepts` entry matching scheme `"exact"` and the
/// client's configured network.
fn select_requirement<'a>(accepts: &'a [PaymentRequirements], network: &str) -> Result<&'a PaymentRequirements> {
    accepts
        .iter()
        .find(|r| r.scheme == "exact" && r.network == network)
        .ok_or(X402Error::UnsupportedPaymentRequirements)
}

/// Parses and schema-validates a raw base64(JSON) challenge body, for callers
/// that want to inspect it without going through [`X402ClientAgent::fetch`].
pub fn parse_challenge(encoded: &str) -> Result<crate::types::PaymentRequiredResponse> {
    decode_challenge(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PayTo;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn requirement(network: &str) -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".to_string(),
            network: network.to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: PayTo {
                address: "TokenAcct111111111111111111111111111111111".to_string(),
                asset: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU".to_string(),
            },
            resource: "/api/premium".to_string(),
            description: None,
            timeout: 30,
            mime_type: None,
        }
    }

    #[test]
    fn test_select_requirement_matches_scheme_and_network() {
        let accepts = vec![requirement("solana-mainnet-beta"), requirement("solana-devnet")];
        let selected = select_requirement(&accepts, "solana-devnet").unwrap();
        assert_eq!(selected.network, "solana-devnet");
    }

    #[test]
    fn test_select_requirement_fails_when_no_match() {
        let accepts = vec![requirement("solana-mainnet-beta")];
        assert!(select_requirement(&accepts, "solana-devnet").is_err());
    }

    struct StubSender {
        balance: u64,
        sends: AtomicU32,
        signature: Mutex<Option<String>>,
    }

    #[async_trait]
    impl TransferSender for StubSender {
        async fn balance(&self, _mint: &str) -> Result<u64> {
            Ok(self.balance)
        }

        async fn send_token(&self, _destination: &str, _amount_micro: u64, _mint: &str) -> Result<String> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(self.signature.lock().unwrap().clone().unwrap_or_else(|| "sig-from-stub".to_string()))
        }
    }

    #[tokio::test]
    async fn test_insufficient_balance_does_not_call_send() {
        let sender = StubSender {
            balance: 10,
            sends: AtomicU32::new(0),
            signature: Mutex::new(None),
        };
        let amount_required = usd_to_micro(0.001).unwrap();
        assert!(amount_required > sender.balance);
    }

    #[tokio::test]
    async fn test_fetch_pays_once_and_retries() {
        let mut server = mockito::Server::new_async().await;
        let challenge = serde_json::json!({
            "x402Version": 1,
            "accepts": [{
                "scheme": "exact",
                "network": "solana-devnet",
                "maxAmountRequired": "1000",
                "payTo": {"address": "TokenAcct111111111111111111111111111111111", "asset": "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU"},
                "resource": "/protected",
                "timeout": 30
            }],
            "error": "Payment required"
        });

        let challenge_mock = server
            .mock("GET", "/protected")
            .match_header("x-payment", mockito::Matcher::Missing)
            .with_status(402)
            .with_header("content-type", "application/json")
            .with_body(challenge.to_string())
            .create_async()
            .await;

        let success_mock = server
            .mock("GET", "/protected")
            .match_header("x-payment", mockito::Matcher::Any)
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        let sender = StubSender {
            balance: 10_000,
            sends: AtomicU32::new(0),
            signature: Mutex::new(Some("5".repeat(64))),
        };
        let agent = X402ClientAgent::new(X402ClientConfig::new("solana-devnet"), sender);

        let response = agent.get(&format!("{}/protected", server.url())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(agent.sender.sends.load(Ordering::SeqCst), 1);

        challenge_mock.assert_async().await;
        success_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_without_auto_retry_returns_402_untouched() {
        let mut server = mockito::Server::new_async().await;
        let challenge = serde_json::json!({
            "x402Version": 1,
            "accepts": [],
            "error": "Payment required"
        });
        server
            .mock("GET", "/protected")
            .with_status(402)
            .with_body(challenge.to_string())
            .create_async()
            .await;

        let sender = StubSender {
            balance: 0,
            sends: AtomicU32::new(0),
            signature: Mutex::new(None),
        };
        let config = X402ClientConfig::new("solana-devnet").without_auto_retry();
        let agent = X402ClientAgent::new(config, sender);

        let response = agent.get(&format!("{}/protected", server.url())).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert_eq!(agent.sender.sends.load(Ordering::SeqCst), 0);
    }
}
