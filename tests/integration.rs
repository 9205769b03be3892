//! End-to-end scenarios for the x402 Solana payment-gating protocol:
//! challenge issuance, verification, replay rejection, and webhook delivery.

use solana_pubkey::Pubkey;
use std::str::FromStr;
use std::sync::Arc;
use x402_solana::cache::InMemoryVerificationCache;
use x402_solana::challenge::ChallengeGenerator;
use x402_solana::codec::{decode_payment_header, encode_payment_header};
use x402_solana::errors::VerificationErrorCode;
use x402_solana::handler::{ChallengeHandler, Outcome};
use x402_solana::ledger::mock::MockLedgerClient;
use x402_solana::transfer_parser::{FetchedTransaction, TokenInstructionData};
use x402_solana::types::{PaymentHeader, PaymentHeaderPayload};
use x402_solana::verifier::{Verifier, VerifierConfig};
use x402_solana::webhook::{InMemoryWebhookQueue, WebhookDispatcher, WebhookQueue};

fn devnet_mint() -> Pubkey {
    Pubkey::from_str("4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU").unwrap()
}

fn recipient_wallet() -> Pubkey {
    Pubkey::from_str("11111111111111111111111111111111").unwrap()
}

fn payer_wallet() -> Pubkey {
    Pubkey::new_from_array([7; 32])
}

fn transfer_checked_ix(source: Pubkey, mint: Pubkey, destination: Pubkey, authority: Pubkey, amount: u64) -> TokenInstructionData {
    let mut data = vec![12u8];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(6);
    TokenInstructionData {
        program_id: spl_token::ID,
        accounts: vec![source, mint, destination, authority],
        data,
    }
}

fn fixture_tx(dest: Pubkey, amount: u64, block_time: i64) -> FetchedTransaction {
    FetchedTransaction {
        signature: "sig".to_string(),
        slot: 100,
        block_time: Some(block_time),
        error: None,
        outer_instructions: vec![transfer_checked_ix(payer_wallet(), devnet_mint(), dest, payer_wallet(), amount)],
        inner_instructions: Default::default(),
        post_token_balances: vec![],
    }
}

fn payment_header(signature: &str) -> String {
    let header = PaymentHeader {
        x402_version: 1,
        scheme: "exact".to_string(),
        network: "solana-devnet".to_string(),
        payload: PaymentHeaderPayload {
            transaction: signature.to_string(),
            authorization: None,
        },
    };
    encode_payment_header(&header).unwrap()
}

fn make_handler() -> (ChallengeHandler, Arc<MockLedgerClient>, Pubkey) {
    let ledger = Arc::new(MockLedgerClient::new());
    let cache = Arc::new(InMemoryVerificationCache::new());
    let verifier = Verifier::new(VerifierConfig::new(ledger.clone(), cache, devnet_mint()));
    let generator = ChallengeGenerator::new(recipient_wallet(), "solana-devnet", devnet_mint(), spl_token::ID);
    let dest = generator.recipient_token_account();
    (ChallengeHandler::new(verifier, generator, 0.001), ledger, dest)
}

#[tokio::test]
async fn scenario_1_happy_path() {
    let (handler, ledger, dest) = make_handler();
    ledger.seed("sig-happy", fixture_tx(dest, 1_000, chrono::Utc::now().timestamp()));

    let outcome = handler.handle("/api/premium", Some(&payment_header("sig-happy"))).await;
    match outcome {
        Outcome::Forward(ctx) => {
            assert_eq!(ctx.payer, payer_wallet().to_string());
            assert_eq!(ctx.amount, 1_000);
            assert_eq!(ctx.resource, "/api/premium");
        }
        other => panic!("expected Forward, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_2_underpayment_is_transfer_mismatch_no_double_charge() {
    let (handler, ledger, dest) = make_handler();
    ledger.seed("sig-under", fixture_tx(dest, 500, chrono::Utc::now().timestamp()));

    let outcome = handler.handle("/api/premium", Some(&payment_header("sig-under"))).await;
    match outcome {
        Outcome::Issue402 { code, .. } => assert_eq!(code, Some(VerificationErrorCode::TransferMismatch)),
        other => panic!("expected Issue402, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_3_replay_rejected_after_first_success() {
    let (handler, ledger, dest) = make_handler();
    ledger.seed("sig-replay", fixture_tx(dest, 1_000, chrono::Utc::now().timestamp()));
    let header = payment_header("sig-replay");

    let first = handler.handle("/api/premium", Some(&header)).await;
    assert!(matches!(first, Outcome::Forward(_)));

    let second = handler.handle("/api/premium", Some(&header)).await;
    match second {
        Outcome::Issue402 { code, .. } => assert_eq!(code, Some(VerificationErrorCode::ReplayAttack)),
        other => panic!("expected Issue402, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_4_wrong_recipient_is_transfer_mismatch() {
    let (handler, ledger, _dest) = make_handler();
    let wrong_dest = Pubkey::new_from_array([42; 32]);
    ledger.seed("sig-wrong-dest", fixture_tx(wrong_dest, 1_000, chrono::Utc::now().timestamp()));

    let outcome = handler.handle("/api/premium", Some(&payment_header("sig-wrong-dest"))).await;
    match outcome {
        Outcome::Issue402 { code, .. } => assert_eq!(code, Some(VerificationErrorCode::TransferMismatch)),
        other => panic!("expected Issue402, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_5_expired_transaction_rejected() {
    let (handler, ledger, dest) = make_handler();
    let stale_block_time = chrono::Utc::now().timestamp() - 400;
    ledger.seed("sig-expired", fixture_tx(dest, 1_000, stale_block_time));

    let outcome = handler.handle("/api/premium", Some(&payment_header("sig-expired"))).await;
    match outcome {
        Outcome::Issue402 { code, .. } => assert_eq!(code, Some(VerificationErrorCode::TxExpired)),
        other => panic!("expected Issue402, got {other:?}"),
    }
}

#[tokio::test]
async fn scenario_6_webhook_retries_then_succeeds() {
    let mut server = mockito::Server::new_async().await;
    // mockito matches the most-recently-created non-exhausted mock first, so
    // registering the 503 mock after the 200 one makes the first three
    // deliveries hit it before falling back to the success mock.
    let succeeding = server.mock("POST", "/hook").with_status(200).expect(1).create_async().await;
    let failing = server.mock("POST", "/hook").with_status(503).expect(3).create_async().await;

    let queue = Arc::new(InMemoryWebhookQueue::new());
    let dispatcher = WebhookDispatcher::new(queue.clone());

    let config = x402_solana::types::WebhookConfig {
        url: format!("{}/hook", server.url()),
        secret: "topsecret".to_string(),
        retry: x402_solana::types::RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 5,
            max_delay_ms: 50,
            backoff: x402_solana::types::BackoffStrategy::Exponential,
        },
    };
    let payload = x402_solana::types::WebhookPayload {
        event: x402_solana::types::WebhookEvent::PaymentVerified,
        timestamp: chrono::Utc::now().timestamp_millis(),
        data: x402_solana::types::WebhookData {
            signature: "sig-happy".to_string(),
            payer: Some(payer_wallet().to_string()),
            amount: Some(1_000),
            resource: "/api/premium".to_string(),
            extra: None,
        },
    };
    queue.enqueue(config, payload).await.unwrap();

    for _ in 0..5 {
        let now = chrono::Utc::now().timestamp_millis();
        if let Some(entry) = queue.dequeue(now).await.unwrap() {
            dispatcher.deliver_one(entry).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(queue.size().await.unwrap(), 0);
    failing.assert_async().await;
    succeeding.assert_async().await;
}

#[test]
fn property_challenge_codec_roundtrip() {
    use x402_solana::codec::{decode_challenge, encode_challenge};
    use x402_solana::types::{PayTo, PaymentRequiredResponse, PaymentRequirements};

    let doc = PaymentRequiredResponse {
        x402_version: 1,
        accepts: vec![PaymentRequirements {
            scheme: "exact".to_string(),
            network: "solana-devnet".to_string(),
            max_amount_required: "1000".to_string(),
            pay_to: PayTo {
                address: "TokenAcct111111111111111111111111111111111".to_string(),
                asset: devnet_mint().to_string(),
            },
            resource: "/api/premium".to_string(),
            description: None,
            timeout: 300,
            mime_type: None,
        }],
        error: Some("Payment required".to_string()),
    };

    let encoded = encode_challenge(&doc).unwrap();
    let decoded = decode_challenge(&encoded).unwrap();
    assert_eq!(decoded, doc);
}

#[test]
fn property_payment_header_roundtrip() {
    let encoded = payment_header("5".repeat(64).as_str());
    let decoded = decode_payment_header(&encoded).unwrap();
    assert_eq!(decoded.payload.transaction, "5".repeat(64));
}
