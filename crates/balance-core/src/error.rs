use thiserror::Error;

use crate::types::Amount;

#[derive(Debug, Error)]
pub enum BalanceError {
    // ── Account errors ───────────────────────────────────────────────────────
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("insufficient balance: need {need}, have available {have}")]
    InsufficientBalance { need: Amount, have: Amount },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    // ── Idempotency errors ───────────────────────────────────────────────────
    #[error("idempotency key {key} already used with a different request payload")]
    IdempotencyKeyConflict { key: String },

    #[error("idempotent request {key} is still in flight")]
    IdempotentRequestInProgress { key: String },

    // ── Reservation errors ───────────────────────────────────────────────────
    #[error("reservation not found: {0}")]
    ReservationNotFound(String),

    #[error("reservation {id} is not in HELD state (current: {current})")]
    ReservationNotHeld { id: String, current: String },

    #[error("reservation {0} has already expired")]
    ReservationExpired(String),

    #[error("invalid reservation state transition: {from} -> {to}")]
    InvalidReservationTransition { from: String, to: String },

    // ── Pot errors ────────────────────────────────────────────────────────────
    #[error("pot not found: {0}")]
    PotNotFound(String),

    #[error("pot {id} is not OPEN (current: {current})")]
    PotNotOpen { id: String, current: String },

    // ── Ledger errors ─────────────────────────────────────────────────────────
    #[error("ledger chain broken for account {account}: expected previous hash {expected}, found {found}")]
    LedgerChainBroken {
        account: String,
        expected: String,
        found: String,
    },

    #[error("ledger checksum mismatch for entry {entry_id}")]
    LedgerChecksumMismatch { entry_id: String },

    // ── Concurrency / storage errors ─────────────────────────────────────────
    #[error("concurrent modification of account {0}; retries exhausted")]
    ConcurrencyConflict(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    // ── General ──────────────────────────────────────────────────────────────
    #[error("invalid transaction type for this operation: {0}")]
    InvalidTransactionType(String),

    #[error("{0}")]
    Other(String),
}

pub type BalanceResult<T> = Result<T, BalanceError>;
