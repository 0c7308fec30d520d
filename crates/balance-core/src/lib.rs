pub mod account;
pub mod constants;
pub mod error;
pub mod idempotency;
pub mod ledger;
pub mod pot;
pub mod reservation;
pub mod transaction;
pub mod types;

pub use account::Account;
pub use constants::*;
pub use error::{BalanceError, BalanceResult};
pub use idempotency::IdempotencyRecord;
pub use ledger::LedgerEntry;
pub use pot::{Contribution, PotStatus, SidePot, TablePot, WinnerClaim};
pub use reservation::{Reservation, ReservationStatus};
pub use transaction::{Transaction, TxStatus, TxType};
pub use types::{
    AccountId, Amount, IdempotencyKey, LedgerEntryId, Metadata, PotId, ReservationId, SignedAmount,
    Timestamp, TransactionId, Version,
};
