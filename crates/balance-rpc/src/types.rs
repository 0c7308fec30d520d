use serde::{Deserialize, Serialize};

/// JSON-serializable account summary returned by `getBalance` and
/// `ensureAccount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcAccount {
    pub account_id: String,
    pub balance: u64,
    pub available_balance: u64,
    pub currency: String,
    pub version: u64,
    pub created: bool,
}

/// JSON-serializable transaction receipt returned by most mutating methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcTransaction {
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub account_id: String,
    pub amount: u64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub status: String,
    pub created_at: i64,
    pub completed_at: Option<i64>,
}

/// JSON-serializable reservation returned by the hold/commit/release methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcReservation {
    pub reservation_id: String,
    pub account_id: String,
    pub amount: u64,
    pub status: String,
    pub table_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub created_at: i64,
    pub expires_at: i64,
    pub committed_at: Option<i64>,
    pub released_at: Option<i64>,
}

/// JSON-serializable pot snapshot returned by `recordContribution`,
/// `settlePot`, and `cancelPot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcPot {
    pub pot_id: String,
    pub table_id: String,
    pub hand_id: String,
    pub status: String,
    pub total: u64,
    pub contributions: Vec<RpcContribution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcContribution {
    pub seat_id: String,
    pub account_id: String,
    pub amount: u64,
}

/// One winner's claim passed to `settlePot`, mirroring the external
/// `winners[{seat_id,account_id,amount}]` shape. `amount` is a raw claimed
/// weight, scaled proportionally against the other winners' claims to fit
/// the settleable pot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcWinnerClaim {
    pub seat_id: String,
    pub account_id: String,
    pub amount: u64,
}
