use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Amount, IdempotencyKey, Metadata, Timestamp, TransactionId};

// ── TxType ────────────────────────────────────────────────────────────────────

/// Every balance-affecting operation recorded against an account is tagged
/// with one of these. The tag alone must be enough to reconstruct intent
/// when auditing the ledger chain.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Deposit,
    Withdraw,
    BuyIn,
    CashOut,
    Blind,
    Bet,
    PotWin,
    Rake,
    Bonus,
    Referral,
    Refund,
}

impl TxType {
    /// The `SCREAMING_SNAKE_CASE` wire tag, used verbatim as the `type` field
    /// in a ledger entry's canonical hash input.
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Deposit => "DEPOSIT",
            TxType::Withdraw => "WITHDRAW",
            TxType::BuyIn => "BUY_IN",
            TxType::CashOut => "CASH_OUT",
            TxType::Blind => "BLIND",
            TxType::Bet => "BET",
            TxType::PotWin => "POT_WIN",
            TxType::Rake => "RAKE",
            TxType::Bonus => "BONUS",
            TxType::Referral => "REFERRAL",
            TxType::Refund => "REFUND",
        }
    }
}

// ── TxStatus ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Completed,
    Failed,
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// A single completed (or failed) balance movement against one account.
/// Once `status` is `Completed` or `Failed` a transaction is immutable and
/// is the unit appended to the per-account ledger chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub idempotency_key: Option<IdempotencyKey>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub account_id: AccountId,
    pub amount: Amount,
    pub balance_before: Amount,
    pub balance_after: Amount,
    pub metadata: Metadata,
    pub status: TxStatus,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}
