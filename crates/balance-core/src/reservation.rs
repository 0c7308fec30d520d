use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Amount, IdempotencyKey, ReservationId, Timestamp, TransactionId};

/// Lifecycle of a buy-in reservation. `Held` is the only non-terminal state;
/// every other variant is reached exactly once and never left.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Held,
    Committed,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Held)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Held => "HELD",
            ReservationStatus::Committed => "COMMITTED",
            ReservationStatus::Released => "RELEASED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }
}

/// A two-phase hold against an account's available balance, created when a
/// player sits down with a buy-in and resolved when the table confirms the
/// seat (commit) or the attempt is abandoned (release) or it times out
/// unattended (expire).
///
/// Holding never moves chips out of `Account::balance` — the amount stays
/// counted against `availableBalance` only for as long as `status` is HELD.
/// `commitReservation` is the one operation that actually debits the account.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub account_id: AccountId,
    pub amount: Amount,
    pub status: ReservationStatus,
    pub table_id: String,
    pub idempotency_key: IdempotencyKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<Timestamp>,
}

impl Reservation {
    pub fn is_expired_at(&self, now_ms: Timestamp) -> bool {
        self.status == ReservationStatus::Held && now_ms >= self.expires_at
    }
}
