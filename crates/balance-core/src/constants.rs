//! ─── Balance Service Defaults ───────────────────────────────────────────────
//!
//! Tunable defaults for reservation lifetime, idempotency retention, rake,
//! and the background verification/expiry jobs. A deployment may override
//! any of these via `balance-node`'s config struct; these are the values
//! used when it does not.

use crate::types::Amount;

// ── Reservations ─────────────────────────────────────────────────────────────

/// Default time a HELD reservation lives before the expiry job releases it.
pub const DEFAULT_RESERVATION_TIMEOUT_MS: i64 = 30_000;

/// How often the reservation-expiry job scans for HELD reservations past TTL.
pub const DEFAULT_RESERVATION_EXPIRY_INTERVAL_MS: u64 = 5_000;

// ── Idempotency cache ─────────────────────────────────────────────────────────

/// How long a completed idempotent response is retained and replayed.
pub const DEFAULT_IDEMPOTENCY_TTL_MS: i64 = 86_400_000;

/// Soft cap on cache entries; eviction order is oldest-insertion-first.
pub const DEFAULT_IDEMPOTENCY_CACHE_MAX_ENTRIES: usize = 100_000;

// ── Ledger verification job ──────────────────────────────────────────────────

/// How often the ledger-verification job walks chains checking checksums.
pub const DEFAULT_LEDGER_VERIFICATION_INTERVAL_MS: u64 = 60_000;

// ── Rake ──────────────────────────────────────────────────────────────────────

/// Default rake rate, in basis points of the settleable pot (500 = 5%).
pub const DEFAULT_RAKE_BASIS_POINTS: u32 = 500;

/// Basis points denominator; a rake_basis_points value above this is invalid.
pub const MAX_RAKE_BASIS_POINTS: u32 = 10_000;

/// Default maximum rake taken from a single pot, regardless of rate.
pub const DEFAULT_RAKE_CAP: Amount = 5;

/// Pots at or below this size are not raked at all.
pub const DEFAULT_RAKE_MIN_POT: Amount = 20;

// ── Engine retry policy ───────────────────────────────────────────────────────

/// Maximum compare-and-set retries on a versioned account update before the
/// engine gives up and surfaces `BalanceError::ConcurrencyConflict`.
pub const MAX_CAS_RETRIES: u32 = 10;

// ── Currency ──────────────────────────────────────────────────────────────────

/// The single currency every account balance is denominated in.
pub const DEFAULT_CURRENCY: &str = "CHIPS";
