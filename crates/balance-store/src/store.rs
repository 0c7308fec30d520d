use async_trait::async_trait;

use balance_core::{
    Account, AccountId, IdempotencyKey, IdempotencyRecord, LedgerEntry, PotId, Reservation,
    ReservationId, TablePot, Timestamp, Transaction, TransactionId, Version,
};
use balance_core::error::BalanceResult;

/// Persisted-state surface the engines and jobs are written against.
///
/// Two implementations exist: [`crate::memory::MemoryStore`] (a sharded
/// in-process map, the default) and, behind the `redis-backend` feature,
/// [`crate::redis_store::RedisStore`]. Keyspace layout mirrors a
/// Redis-shaped hash/list/sorted-set/set/TTL model even in the in-memory
/// backend, so the two stay interchangeable.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Accounts ─────────────────────────────────────────────────────────────

    async fn get_account(&self, id: &AccountId) -> BalanceResult<Option<Account>>;

    /// Insert a brand-new account. Returns `AccountAlreadyExists` if one is
    /// already stored under this id.
    async fn create_account(&self, account: Account) -> BalanceResult<()>;

    /// Compare-and-set update: succeeds only if the currently stored
    /// account's version equals `expected_version`, then stores `account`
    /// (whose version must be `expected_version + 1`). Returns
    /// `ConcurrencyConflict` on a version mismatch.
    async fn cas_account(&self, expected_version: Version, account: Account) -> BalanceResult<()>;

    async fn list_account_ids(&self) -> BalanceResult<Vec<AccountId>>;

    // ── Transactions ─────────────────────────────────────────────────────────

    async fn put_transaction(&self, tx: Transaction) -> BalanceResult<()>;

    async fn get_transaction(&self, id: &TransactionId) -> BalanceResult<Option<Transaction>>;

    async fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> BalanceResult<Vec<Transaction>>;

    // ── Reservations ─────────────────────────────────────────────────────────

    async fn put_reservation(&self, reservation: Reservation) -> BalanceResult<()>;

    async fn get_reservation(&self, id: &ReservationId) -> BalanceResult<Option<Reservation>>;

    async fn list_reservations_by_account(
        &self,
        account_id: &AccountId,
    ) -> BalanceResult<Vec<Reservation>>;

    /// All HELD reservations whose `expires_at` is at or before `now_ms`.
    /// Backs the reservation-expiry background job.
    async fn list_expired_held_reservations(
        &self,
        now_ms: Timestamp,
    ) -> BalanceResult<Vec<Reservation>>;

    // ── Ledger ───────────────────────────────────────────────────────────────

    /// Append one entry to an account's hash chain. `entry.previous_checksum`
    /// must match the account's current latest checksum; implementations
    /// enforce this atomically so concurrent appends can't interleave.
    async fn append_ledger_entry(&self, entry: LedgerEntry) -> BalanceResult<()>;

    async fn latest_checksum(&self, account_id: &AccountId) -> BalanceResult<String>;

    async fn list_ledger_entries(&self, account_id: &AccountId) -> BalanceResult<Vec<LedgerEntry>>;

    // ── Pots ─────────────────────────────────────────────────────────────────

    async fn put_pot(&self, pot: TablePot) -> BalanceResult<()>;

    async fn get_pot(&self, id: &PotId) -> BalanceResult<Option<TablePot>>;

    async fn list_active_pot_ids(&self) -> BalanceResult<Vec<PotId>>;

    // ── Idempotency ──────────────────────────────────────────────────────────

    async fn get_idempotency(&self, key: &IdempotencyKey) -> BalanceResult<Option<IdempotencyRecord>>;

    async fn put_idempotency(&self, record: IdempotencyRecord) -> BalanceResult<()>;

    async fn remove_expired_idempotency(&self, now_ms: Timestamp) -> BalanceResult<u64>;
}
