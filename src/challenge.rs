//! Builds the 402 challenge document declaring accepted payment methods.

use crate::currency::usd_to_micro;
use crate::errors::{Result, X402Error};
use crate::types::{PayTo, PaymentRequiredResponse, PaymentRequirements};
use solana_pubkey::Pubkey;
use std::str::FromStr;

/// The on-chain program that derives associated token account addresses.
const ATA_PROGRAM_PUBKEY: Pubkey = solana_pubkey::pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// Derives the associated token account address for `wallet` holding `mint`
/// under `token_program`.
///
/// This is the address published in `payTo.address` — never the wallet itself.
pub fn derive_associated_token_account(wallet: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    let (ata, _bump) = Pubkey::find_program_address(
        &[wallet.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ATA_PROGRAM_PUBKEY,
    );
    ata
}

/// Optional overrides for `ChallengeGenerator::generate`.
#[derive(Debug, Clone, Default)]
pub struct ChallengeOptions {
    /// Overrides the default 300s freshness timeout.
    pub timeout_seconds: Option<u64>,
    /// Human-readable purpose of the payment.
    pub description: Option<String>,
    /// Opaque resource identifier; defaults to the caller-supplied resource.
    pub resource: Option<String>,
    /// Overrides the default "Payment required" error message.
    pub error_message: Option<String>,
    /// MIME type of the resource body on success.
    pub mime_type: Option<String>,
}

/// One payment option to offer in `generate_multiple`.
#[derive(Debug, Clone)]
pub struct ChallengeOption {
    /// Price of the resource, in USD.
    pub price_usd: f64,
    /// Network this option settles on.
    pub network: String,
    /// Token mint for this option.
    pub mint: Pubkey,
    /// SPL-token program owning `mint` (legacy or 2022).
    pub token_program: Pubkey,
    /// Per-option overrides.
    pub options: ChallengeOptions,
}

/// Builds 402 challenge documents for a fixed recipient wallet and network.
pub struct ChallengeGenerator {
    recipient_wallet: Pubkey,
    network: String,
    mint: Pubkey,
    token_program: Pubkey,
}

impl ChallengeGenerator {
    /// Creates a generator for a recipient wallet on a given network, token,
    /// and SPL-token program variant.
    pub fn new(recipient_wallet: Pubkey, network: impl Into<String>, mint: Pubkey, token_program: Pubkey) -> Self {
        ChallengeGenerator {
            recipient_wallet,
            network: network.into(),
            mint,
            token_program,
        }
    }

    /// Convenience constructor parsing a base58 wallet address.
    pub fn from_address(
        recipient_wallet: &str,
        network: impl Into<String>,
        mint: Pubkey,
        token_program: Pubkey,
    ) -> Result<Self> {
        let wallet = Pubkey::from_str(recipient_wallet)
            .map_err(|e| X402Error::InvalidAddress(format!("{recipient_wallet}: {e}")))?;
        Ok(Self::new(wallet, network, mint, token_program))
    }

    /// The derived token account that will appear in `payTo.address`.
    pub fn recipient_token_account(&self) -> Pubkey {
        derive_associated_token_account(&self.recipient_wallet, &self.mint, &self.token_program)
    }

    /// Builds a single-option challenge for a resource priced in USD.
    ///
    /// # Examples
    ///
    /// ```
    /// use x402_solana::challenge::ChallengeGenerator;
    /// use solana_pubkey::Pubkey;
    /// use std::str::FromStr;
    ///
    /// let wallet = Pubkey::from_str("11111111111111111111111111111111").unwrap();
    /// let mint = Pubkey::from_str("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU").unwrap();
    /// let generator = ChallengeGenerator::new(wallet, "solana-devnet", mint, spl_token::ID);
    ///
    /// let doc = generator.generate(0.01, "/api/premium", Default::default()).unwrap();
    /// assert_eq!(doc.accepts[0].max_amount_required, "10000");
    /// ```
    pub fn generate(&self, price_usd: f64, resource: &str, opts: ChallengeOptions) -> Result<PaymentRequiredResponse> {
        if price_usd <= 0.0 {
            return Err(X402Error::InvalidAmount(format!(
                "priceUSD must be positive, got {price_usd}"
            )));
        }
        let requirement = self.build_requirement(price_usd, resource, &opts)?;
        Ok(PaymentRequiredResponse {
            x402_version: 1,
            accepts: vec![requirement],
            error: Some(
                opts.error_message
                    .unwrap_or_else(|| "Payment required".to_string()),
            ),
        })
    }

    /// Builds a multi-option challenge; `options` must be non-empty.
    pub fn generate_multiple(&self, options: &[ChallengeOption], resource: &str) -> Result<PaymentRequiredResponse> {
        if options.is_empty() {
            return Err(X402Error::InvalidAmount(
                "generateMultiple requires at least one option".to_string(),
            ));
        }
        let mut accepts = Vec::with_capacity(options.len());
        for option in options {
            if option.price_usd <= 0.0 {
                return Err(X402Error::InvalidAmount(format!(
                    "priceUSD must be positive, got {}",
                    option.price_usd
                )));
            }
            let token_account = derive_associated_token_account(&self.recipient_wallet, &option.mint, &option.token_program);
            accepts.push(PaymentRequirements {
                scheme: "exact".to_string(),
                network: option.network.clone(),
                max_amount_required: usd_to_micro(option.price_usd)?.to_string(),
                pay_to: PayTo {
                    address: token_account.to_string(),
                    asset: option.mint.to_string(),
                },
                resource: option.options.resource.clone().unwrap_or_else(|| resource.to_string()),
                description: option.options.description.clone(),
                timeout: option.options.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
                mime_type: option.options.mime_type.clone(),
            });
        }
        Ok(PaymentRequiredResponse {
            x402_version: 1,
            accepts,
            error: Some("Payment required".to_string()),
        })
    }

    fn build_requirement(&self, price_usd: f64, resource: &str, opts: &ChallengeOptions) -> Result<PaymentRequirements> {
        Ok(PaymentRequirements {
            scheme: "exact".to_string(),
            network: self.network.clone(),
            max_amount_required: usd_to_micro(price_usd)?.to_string(),
            pay_to: PayTo {
                address: self.recipient_token_account().to_string(),
                asset: self.mint.to_string(),
            },
            resource: opts.resource.clone().unwrap_or_else(|| resource.to_string()),
            description: opts.description.clone(),
            timeout: opts.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            mime_type: opts.mime_type.clone(),
        })
    }
}
