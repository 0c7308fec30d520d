use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Amount, PotId, Timestamp};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PotStatus {
    Open,
    Settled,
    Cancelled,
}

/// One seat's accumulated chip contribution toward a hand's pot. Tracked
/// separately from the main accounting ledger since a seat may contribute
/// across several streets before the pot is ever settled.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Contribution {
    pub seat_id: String,
    pub account_id: AccountId,
    pub amount: Amount,
}

/// One layer of a multi-way all-in pot: the per-seat increment and the set
/// of seats still eligible to win it. Side pots are produced by splitting
/// contributions at each distinct all-in amount, ascending.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SidePot {
    pub amount: Amount,
    pub eligible_seats: Vec<String>,
}

/// The full pot state for a single table/hand, accumulated contribution by
/// contribution and settled once winners are known.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TablePot {
    pub pot_id: PotId,
    pub table_id: String,
    pub hand_id: String,
    pub status: PotStatus,
    /// Running total per seat, in contribution order; side-pot computation
    /// reads this map at settlement time.
    pub contributions: BTreeMap<String, Contribution>,
    pub rake_basis_points: u32,
    pub rake_cap: Amount,
    pub rake_min_pot: Amount,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<Timestamp>,
}

impl TablePot {
    pub fn new(
        pot_id: PotId,
        table_id: impl Into<String>,
        hand_id: impl Into<String>,
        rake_basis_points: u32,
        rake_cap: Amount,
        rake_min_pot: Amount,
        now_ms: Timestamp,
    ) -> Self {
        Self {
            pot_id,
            table_id: table_id.into(),
            hand_id: hand_id.into(),
            status: PotStatus::Open,
            contributions: BTreeMap::new(),
            rake_basis_points,
            rake_cap,
            rake_min_pot,
            created_at: now_ms,
            settled_at: None,
        }
    }

    pub fn total(&self) -> Amount {
        self.contributions.values().map(|c| c.amount).sum()
    }
}

/// One winner's claim against a settled pot, supplied by the caller of
/// `settlePot`. `amount` is the raw chip count the caller believes this seat
/// is owed (typically its share of one or more side pots, pre-computed by
/// the caller from [`SidePot`]); claims need not sum to the settleable
/// total — `normalizeWinners` scales them proportionally.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WinnerClaim {
    pub seat_id: String,
    pub account_id: AccountId,
    pub amount: Amount,
}
