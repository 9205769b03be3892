//! Environment-driven configuration (§6 environment variables).
//!
//! Mirrors the teacher's `PaymentConfig`/`FacilitatorConfig` builder shape:
//! a plain struct constructed once at startup, validated eagerly so
//! misconfiguration fails fast rather than surfacing mid-request.

use crate::errors::{Result, X402Error};
use solana_pubkey::Pubkey;
use std::str::FromStr;

/// Network identifier recognized in `NETWORK` / challenge `network` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    /// `"devnet"` / `"solana-devnet"`.
    Devnet,
    /// `"mainnet-beta"` / `"solana-mainnet-beta"`.
    MainnetBeta,
}

impl Network {
    /// Parses a bare cluster name (`"devnet"`, `"mainnet-beta"`) or a
    /// namespaced network string with the `"solana-"` prefix stripped.
    pub fn parse(raw: &str) -> Result<Self> {
        let stripped = raw.strip_prefix("solana-").unwrap_or(raw);
        match stripped {
            "devnet" => Ok(Network::Devnet),
            "mainnet-beta" => Ok(Network::MainnetBeta),
            other => Err(X402Error::Config(format!("unrecognized network: {other}"))),
        }
    }

    /// The namespaced network string used in challenge documents.
    pub fn as_namespaced(&self) -> &'static str {
        match self {
            Network::Devnet => "solana-devnet",
            Network::MainnetBeta => "solana-mainnet-beta",
        }
    }

    /// The canonical USDC mint for this network, and its decimal count (always 6).
    pub fn usdc_mint(&self) -> Pubkey {
        let addr = match self {
            Network::Devnet => "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
            Network::MainnetBeta => "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        };
        Pubkey::from_str(addr).expect("built-in mint address is valid")
    }
}

/// Server-side configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Ledger RPC endpoint.
    pub rpc_url: String,
    /// Server's receiving wallet (not a token account; the ATA is derived from it).
    pub recipient_wallet: Pubkey,
    /// Settlement network.
    pub network: Network,
    /// Optional durable cache/queue backend.
    pub redis_url: Option<String>,
}

impl ServerConfig {
    /// Loads configuration from process environment variables, optionally
    /// after loading a `.env` file via `dotenvy`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let rpc_url = env_var("SOLANA_RPC_URL")?;
        let recipient_raw = env_var("RECIPIENT_WALLET")?;
        let network_raw = env_var("NETWORK")?;
        let redis_url = std::env::var("REDIS_URL").ok();

        let recipient_wallet = Pubkey::from_str(&recipient_raw)
            .map_err(|e| X402Error::Config(format!("RECIPIENT_WALLET is not a valid address: {e}")))?;
        let network = Network::parse(&network_raw)?;

        Ok(ServerConfig {
            rpc_url,
            recipient_wallet,
            network,
            redis_url,
        })
    }
}

/// Client-side configuration assembled from the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Ledger RPC endpoint.
    pub rpc_url: String,
    /// Base58-encoded payer seed.
    pub wallet_private_key: String,
    /// Settlement network the client is configured to pay on.
    pub network: Network,
}

impl ClientConfig {
    /// Loads configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(ClientConfig {
            rpc_url: env_var("SOLANA_RPC_URL")?,
            wallet_private_key: env_var("WALLET_PRIVATE_KEY")?,
            network: Network::parse(&env_var("NETWORK")?)?,
        })
    }
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| X402Error::Config(format!("missing required environment variable: {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parse_strips_solana_prefix() {
        assert_eq!(Network::parse("solana-devnet").unwrap(), Network::Devnet);
        assert_eq!(Network::parse("devnet").unwrap(), Network::Devnet);
        assert_eq!(Network::parse("solana-mainnet-beta").unwrap(), Network::MainnetBeta);
    }

    #[test]
    fn test_network_parse_rejects_unknown() {
        assert!(Network::parse("ethereum-mainnet").is_err());
    }

    #[test]
    fn test_usdc_mints_are_distinct() {
        assert_ne!(Network::Devnet.usdc_mint(), Network::MainnetBeta.usdc_mint());
    }

    #[test]
    fn test_as_namespaced_roundtrips_through_parse() {
        for network in [Network::Devnet, Network::MainnetBeta] {
            assert_eq!(Network::parse(network.as_namespaced()).unwrap(), network);
        }
    }
}
