//! Extracts SPL-token transfers from a fetched transaction.
//!
//! Input is a deliberately minimal, already-resolved view of a confirmed
//! transaction (see [`FetchedTransaction`]) — raw RPC framing and compiled
//! account-index resolution are `LedgerClient`'s concern, out of scope here.

use crate::types::{InstructionIndex, ParsedTransfer};
use solana_pubkey::Pubkey;
use std::collections::HashMap;

/// One instruction with its accounts already resolved to addresses.
#[derive(Debug, Clone)]
pub struct TokenInstructionData {
    /// The program this instruction invokes.
    pub program_id: Pubkey,
    /// Resolved account addresses, in instruction order.
    pub accounts: Vec<Pubkey>,
    /// Raw instruction data.
    pub data: Vec<u8>,
}

/// A token account's mint, as reported in a transaction's post-balance records.
#[derive(Debug, Clone, Copy)]
pub struct TokenBalanceEntry {
    /// The token account address.
    pub account: Pubkey,
    /// The mint it holds a balance of.
    pub mint: Pubkey,
}

/// A confirmed transaction, reduced to what `TransferParser` needs.
#[derive(Debug, Clone, Default)]
pub struct FetchedTransaction {
    /// The transaction signature.
    pub signature: String,
    /// Ledger slot the transaction landed in.
    pub slot: u64,
    /// Unix-second block time, if the ledger reported one.
    pub block_time: Option<i64>,
    /// Non-empty if the transaction executed with an error.
    pub error: Option<String>,
    /// Top-level instructions, in order.
    pub outer_instructions: Vec<TokenInstructionData>,
    /// Inner (CPI) instructions, keyed by the outer instruction index that invoked them.
    pub inner_instructions: HashMap<usize, Vec<TokenInstructionData>>,
    /// Post-transaction token account metadata, used to resolve legacy `Transfer` mints.
    pub post_token_balances: Vec<TokenBalanceEntry>,
}

const TRANSFER_OPCODE: u8 = 3;
const TRANSFER_CHECKED_OPCODE: u8 = 12;

fn is_token_program(program_id: &Pubkey) -> bool {
    *program_id == spl_token::ID || *program_id == spl_token_2022::ID
}

fn resolve_mint(post_token_balances: &[TokenBalanceEntry], account: &Pubkey) -> Option<Pubkey> {
    post_token_balances
        .iter()
        .find(|entry| entry.account == *account)
        .map(|entry| entry.mint)
}

/// Decodes a single instruction into a `ParsedTransfer`, if it is a
/// recognized SPL-token `Transfer`/`TransferChecked` with the right account
/// arity and decodable data. Returns `None` silently otherwise — undecodable
/// instructions are not errors, just not transfers.
fn decode_instruction(
    ix: &TokenInstructionData,
    post_token_balances: &[TokenBalanceEntry],
    index: InstructionIndex,
) -> Option<ParsedTransfer> {
    if !is_token_program(&ix.program_id) {
        return None;
    }
    if ix.data.is_empty() {
        return None;
    }
    match ix.data[0] {
        TRANSFER_OPCODE => {
            if ix.accounts.len() < 3 || ix.data.len() < 9 {
                return None;
            }
            let amount = u64::from_le_bytes(ix.data[1..9].try_into().ok()?);
            let source = ix.accounts[0];
            let destination = ix.accounts[1];
            let authority = ix.accounts[2];
            let mint = resolve_mint(post_token_balances, &source)?;
            Some(ParsedTransfer {
                source: source.to_string(),
                destination: destination.to_string(),
                authority: authority.to_string(),
                mint: mint.to_string(),
                amount,
                instruction_index: index,
            })
        }
        TRANSFER_CHECKED_OPCODE => {
            if ix.accounts.len() < 4 || ix.data.len() < 10 {
                return None;
            }
            let amount = u64::from_le_bytes(ix.data[1..9].try_into().ok()?);
            let source = ix.accounts[0];
            let mint = ix.accounts[1];
            let destination = ix.accounts[2];
            let authority = ix.accounts[3];
            Some(ParsedTransfer {
                source: source.to_string(),
                destination: destination.to_string(),
                authority: authority.to_string(),
                mint: mint.to_string(),
                amount,
                instruction_index: index,
            })
        }
        _ => None,
    }
}

/// Extracts every token transfer from a transaction, in instruction order
/// (each outer instruction immediately followed by its inner instructions).
///
/// # Examples
///
/// ```
/// use x402_solana::transfer_parser::{extract_transfers, FetchedTransaction};
///
/// let tx = FetchedTransaction::default();
/// assert!(extract_transfers(&tx).is_empty());
/// ```
pub fn extract_transfers(tx: &FetchedTransaction) -> Vec<ParsedTransfer> {
    let mut transfers = Vec::new();
    for (outer_idx, outer_ix) in tx.outer_instructions.iter().enumerate() {
        if let Some(transfer) = decode_instruction(
            outer_ix,
            &tx.post_token_balances,
            InstructionIndex { outer: outer_idx, inner: None },
        ) {
            transfers.push(transfer);
        }
        if let Some(inner_ixs) = tx.inner_instructions.get(&outer_idx) {
            for (inner_idx, inner_ix) in inner_ixs.iter().enumerate() {
                if let Some(transfer) = decode_instruction(
                    inner_ix,
                    &tx.post_token_balances,
                    InstructionIndex { outer: outer_idx, inner: Some(inner_idx) },
                ) {
                    transfers.push(transfer);
                }
            }
        }
    }
    transfers
}

/// Filters extracted transfers to those moving the given mint.
pub fn extract_usdc_transfers(tx: &FetchedTransaction, usdc_mint: &Pubkey) -> Vec<ParsedTransfer> {
    let mint_str = usdc_mint.to_string();
    extract_transfers(tx)
        .into_iter()
        .filter(|t| t.mint == mint_str)
        .collect()
}

/// Filters a transfer list to those targeting a specific destination token account.
pub fn find_by_destination(transfers: &[ParsedTransfer], dest_acct: &str) -> Vec<ParsedTransfer> {
    transfers.iter().filter(|t| t.destination == dest_acct).cloned().collect()
}

/// Criteria for `find_matching`.
pub struct MatchCriteria<'a> {
    /// Required destination token account.
    pub dest_acct: &'a str,
    /// Minimum acceptable amount, in micro-units.
    pub min_amount: u64,
    /// Required mint.
    pub mint: &'a str,
}

/// Finds the first transfer satisfying the given criteria, in instruction order.
///
/// First-match semantics: when several transfers in the same transaction
/// satisfy the criteria, the earliest in instruction order is used.
/// Overpayment is accepted; there is no summing across multiple transfers.
pub fn find_matching(transfers: &[ParsedTransfer], criteria: MatchCriteria) -> Option<ParsedTransfer> {
    transfers
        .iter()
        .find(|t| t.destination == criteria.dest_acct && t.mint == criteria.mint && t.amount >= criteria.min_amount)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn transfer_ix(source: Pubkey, destination: Pubkey, authority: Pubkey, amount: u64) -> TokenInstructionData {
        let mut data = vec![TRANSFER_OPCODE];
        data.extend_from_slice(&amount.to_le_bytes());
        TokenInstructionData {
            program_id: spl_token::ID,
            accounts: vec![source, destination, authority],
            data,
        }
    }

    fn transfer_checked_ix(source: Pubkey, mint: Pubkey, destination: Pubkey, authority: Pubkey, amount: u64) -> TokenInstructionData {
        let mut data = vec![TRANSFER_CHECKED_OPCODE];
        data.extend_from_slice(&amount.to_le_bytes());
        data.push(6); // decimals
        TokenInstructionData {
            program_id: spl_token::ID,
            accounts: vec![source, mint, destination, authority],
            data,
        }
    }

    #[test]
    fn test_extract_transfer_checked() {
        let (source, mint, dest, authority) = (pk(1), pk(2), pk(3), pk(4));
        let tx = FetchedTransaction {
            outer_instructions: vec![transfer_checked_ix(source, mint, dest, authority, 1_000)],
            ..Default::default()
        };
        let transfers = extract_transfers(&tx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].amount, 1_000);
        assert_eq!(transfers[0].mint, mint.to_string());
    }

    #[test]
    fn test_extract_legacy_transfer_resolves_mint_from_balances() {
        let (source, dest, authority, mint) = (pk(1), pk(2), pk(3), pk(9));
        let tx = FetchedTransaction {
            outer_instructions: vec![transfer_ix(source, dest, authority, 500)],
            post_token_balances: vec![TokenBalanceEntry { account: source, mint }],
            ..Default::default()
        };
        let transfers = extract_transfers(&tx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].mint, mint.to_string());
    }

    #[test]
    fn test_legacy_transfer_without_balance_record_is_skipped() {
        let (source, dest, authority) = (pk(1), pk(2), pk(3));
        let tx = FetchedTransaction {
            outer_instructions: vec![transfer_ix(source, dest, authority, 500)],
            ..Default::default()
        };
        assert!(extract_transfers(&tx).is_empty());
    }

    #[test]
    fn test_non_token_program_instruction_is_skipped() {
        let tx = FetchedTransaction {
            outer_instructions: vec![TokenInstructionData {
                program_id: pk(99),
                accounts: vec![pk(1), pk(2), pk(3)],
                data: vec![TRANSFER_OPCODE, 1, 0, 0, 0, 0, 0, 0, 0],
            }],
            ..Default::default()
        };
        assert!(extract_transfers(&tx).is_empty());
    }

    #[test]
    fn test_truncated_data_is_skipped() {
        let tx = FetchedTransaction {
            outer_instructions: vec![TokenInstructionData {
                program_id: spl_token::ID,
                accounts: vec![pk(1), pk(2), pk(3)],
                data: vec![TRANSFER_OPCODE, 1, 2],
            }],
            ..Default::default()
        };
        assert!(extract_transfers(&tx).is_empty());
    }

    #[test]
    fn test_extraction_completeness_and_order() {
        let (source, mint, dest, authority) = (pk(1), pk(2), pk(3), pk(4));
        let mut inner = HashMap::new();
        inner.insert(0, vec![transfer_checked_ix(source, mint, dest, authority, 2)]);
        let tx = FetchedTransaction {
            outer_instructions: vec![
                transfer_checked_ix(source, mint, dest, authority, 1),
                transfer_checked_ix(source, mint, dest, authority, 3),
            ],
            inner_instructions: inner,
            ..Default::default()
        };
        let transfers = extract_transfers(&tx);
        assert_eq!(transfers.len(), 3);
        assert_eq!(transfers.iter().map(|t| t.amount).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(transfers[1].instruction_index, InstructionIndex { outer: 0, inner: Some(0) });
    }

    #[test]
    fn test_find_matching_first_match_wins() {
        let (source, mint, dest, authority) = (pk(1), pk(2), pk(3), pk(4));
        let tx = FetchedTransaction {
            outer_instructions: vec![
                transfer_checked_ix(source, mint, dest, authority, 2_000),
                transfer_checked_ix(source, mint, dest, authority, 5_000),
            ],
            ..Default::default()
        };
        let transfers = extract_usdc_transfers(&tx, &mint);
        let found = find_matching(&transfers, MatchCriteria { dest_acct: &dest.to_string(), min_amount: 1_000, mint: &mint.to_string() });
        assert_eq!(found.unwrap().amount, 2_000);
    }

    #[test]
    fn test_find_matching_rejects_underpayment() {
        let (source, mint, dest, authority) = (pk(1), pk(2), pk(3), pk(4));
        let tx = FetchedTransaction {
            outer_instructions: vec![transfer_checked_ix(source, mint, dest, authority, 500)],
            ..Default::default()
        };
        let transfers = extract_usdc_transfers(&tx, &mint);
        let found = find_matching(&transfers, MatchCriteria { dest_acct: &dest.to_string(), min_amount: 1_000, mint: &mint.to_string() });
        assert!(found.is_none());
    }

    #[test]
    fn test_find_by_destination() {
        let (source, mint, dest, authority) = (pk(1), pk(2), pk(3), pk(4));
        let other_dest = pk(5);
        let tx = FetchedTransaction {
            outer_instructions: vec![
                transfer_checked_ix(source, mint, dest, authority, 1),
                transfer_checked_ix(source, mint, other_dest, authority, 1),
            ],
            ..Default::default()
        };
        let transfers = extract_transfers(&tx);
        let matched = find_by_destination(&transfers, &dest.to_string());
        assert_eq!(matched.len(), 1);
    }
}
