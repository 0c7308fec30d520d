pub mod accounting;
pub mod ledger;
pub mod pot;
pub mod reservation;

pub use accounting::AccountingEngine;
pub use ledger::{LedgerEngine, LedgerVerification, LedgerVerificationBatch};
pub use pot::{calculate_rake, calculate_side_pots, normalize_winners, PotEngine};
pub use reservation::{plan_transition, ReservationEngine, ReservationPlan};
