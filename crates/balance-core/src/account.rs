//! Account record: the versioned, CAS-updated balance state for one player.
//!
//! [`Account`] is the unit of optimistic concurrency control in the engine:
//! every mutation reads a copy, computes a new value, and writes it back
//! conditioned on `version` being unchanged (see `balance-engine`'s
//! accounting module). `balance` is the only persisted balance field — the
//! chips held by open reservations are never subtracted here. An account's
//! available balance is always recomputed under the account lock as
//! `balance` minus the sum of its HELD reservations; it is never stored.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_CURRENCY;
use crate::types::{AccountId, Amount, Timestamp, Version};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    /// Total chips owned by the account, reservations included.
    pub balance: Amount,
    pub currency: String,
    /// Optimistic-concurrency version; bumped on every successful update.
    pub version: Version,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Account {
    pub fn new(account_id: AccountId, initial_balance: Amount, now_ms: Timestamp) -> Self {
        Self {
            account_id,
            balance: initial_balance,
            currency: DEFAULT_CURRENCY.to_string(),
            version: 0,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }
}
