use serde::{Deserialize, Serialize};

use crate::transaction::TxType;
use crate::types::{AccountId, Amount, LedgerEntryId, Metadata, SignedAmount, Timestamp, TransactionId};

/// One link in a per-account hash chain. `checksum` commits to this entry's
/// own fields plus `previous_checksum`; the literal string `"GENESIS"` seeds
/// the chain for an account's first entry. See `balance_crypto::hash` for
/// the canonical-JSON + SHA-256 construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: LedgerEntryId,
    pub account_id: AccountId,
    pub transaction_id: TransactionId,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Positive for a credit, negative for a debit.
    pub amount: SignedAmount,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub metadata: Metadata,
    pub timestamp: Timestamp,
    pub sequence: u64,
    pub previous_checksum: String,
    pub checksum: String,
}
