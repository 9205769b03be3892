//! Base64/JSON round-trip and schema validation for challenges and payment headers.

use crate::errors::{Result, VerificationErrorCode, X402Error};
use crate::types::{PaymentHeader, PaymentRequiredResponse};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Networks this core supports, identified by their chain prefix.
const SUPPORTED_CHAIN_PREFIX: &str = "solana-";

/// Encodes a challenge document as base64(JSON), for the HTTP 402 response body.
///
/// # Examples
///
/// ```
/// use x402_solana::codec::encode_challenge;
/// use x402_solana::types::PaymentRequiredResponse;
///
/// let doc = PaymentRequiredResponse { x402_version: 1, accepts: vec![], error: None };
/// let encoded = encode_challenge(&doc).unwrap();
/// assert!(!encoded.is_empty());
/// ```
pub fn encode_challenge(doc: &PaymentRequiredResponse) -> Result<String> {
    let json = serde_json::to_string(doc)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes and schema-validates a base64(JSON) challenge document.
pub fn decode_challenge(encoded: &str) -> Result<PaymentRequiredResponse> {
    let doc: PaymentRequiredResponse = decode_json(encoded)?;
    for option in &doc.accepts {
        validate_requirements(option)?;
    }
    Ok(doc)
}

/// Encodes a `PaymentHeader` as base64(JSON), for the `X-PAYMENT` request header.
///
/// # Examples
///
/// ```
/// use x402_solana::codec::{encode_payment_header, decode_payment_header};
/// use x402_solana::types::{PaymentHeader, PaymentHeaderPayload};
///
/// let header = PaymentHeader {
///     x402_version: 1,
///     scheme: "exact".to_string(),
///     network: "solana-devnet".to_string(),
///     payload: PaymentHeaderPayload { transaction: "sig".repeat(20), authorization: None },
/// };
///
/// let encoded = encode_payment_header(&header).unwrap();
/// let decoded = decode_payment_header(&encoded).unwrap();
/// assert_eq!(decoded.scheme, "exact");
/// ```
pub fn encode_payment_header(header: &PaymentHeader) -> Result<String> {
    let json = serde_json::to_string(header)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Decodes and schema-validates a base64(JSON) `X-PAYMENT` header value.
///
/// Fails with `INVALID_HEADER` on malformed base64/JSON, unsupported scheme,
/// unsupported network prefix, or a missing `payTo`-equivalent transaction field.
pub fn decode_payment_header(encoded: &str) -> Result<PaymentHeader> {
    let header: PaymentHeader = decode_json(encoded)?;
    validate_header(&header)?;
    Ok(header)
}

fn decode_json<T: serde::de::DeserializeOwned>(encoded: &str) -> Result<T> {
    let bytes = BASE64
        .decode(encoded.as_bytes())
        .map_err(|e| X402Error::verification(VerificationErrorCode::InvalidHeader, e.to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| X402Error::verification(VerificationErrorCode::InvalidHeader, e.to_string()))?;
    serde_json::from_str(&text)
        .map_err(|e| X402Error::verification(VerificationErrorCode::InvalidHeader, e.to_string()))
}

fn validate_requirements(req: &crate::types::PaymentRequirements) -> Result<()> {
    if req.scheme != "exact" {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            format!("unsupported scheme: {}", req.scheme),
        ));
    }
    if !req.network.starts_with(SUPPORTED_CHAIN_PREFIX) {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            format!("unsupported network: {}", req.network),
        ));
    }
    match req.max_amount_required.parse::<u64>() {
        Ok(amount) if amount >= 1 => {}
        _ => {
            return Err(X402Error::verification(
                VerificationErrorCode::InvalidHeader,
                format!("maxAmountRequired must be a positive integer: {}", req.max_amount_required),
            ));
        }
    }
    if req.pay_to.address.is_empty() {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            "payTo.address is required",
        ));
    }
    Ok(())
}

fn validate_header(header: &PaymentHeader) -> Result<()> {
    if header.scheme != "exact" {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            format!("unsupported scheme: {}", header.scheme),
        ));
    }
    if !header.network.starts_with(SUPPORTED_CHAIN_PREFIX) {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            format!("unsupported network: {}", header.network),
        ));
    }
    if header.payload.transaction.is_empty() {
        return Err(X402Error::verification(
            VerificationErrorCode::InvalidHeader,
            "payload.transaction is required",
        ));
    }
    Ok(())
}
