use std::sync::Arc;

use tracing::{info, warn};

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{
    Account, AccountId, Amount, IdempotencyKey, LedgerEntry, Metadata, ReservationStatus, SignedAmount,
    Timestamp, Transaction, TransactionId, TxStatus, TxType, MAX_CAS_RETRIES,
};
use balance_crypto::{ledger_checksum, LedgerChecksumInput};
use balance_store::{IdempotencyCache, KeyedMutex, Store};

/// The accounting surface: account lifecycle and single-account balance
/// movements, each recorded as an immutable [`Transaction`] and appended to
/// that account's ledger chain. Every mutation goes through the keyed
/// mutex for the account id, then a bounded compare-and-set retry loop
/// against the store.
///
/// `Account::balance` is the only persisted balance field — it is never
/// split into "available" and "reserved" halves. Available balance is
/// always derived on read as `balance` minus the sum of the account's HELD
/// reservations; see [`AccountingEngine::available_balance`].
pub struct AccountingEngine {
    store: Arc<dyn Store>,
    mutex: Arc<KeyedMutex>,
    idempotency_ttl_ms: i64,
}

impl AccountingEngine {
    pub fn new(store: Arc<dyn Store>, mutex: Arc<KeyedMutex>, idempotency_ttl_ms: i64) -> Self {
        Self {
            store,
            mutex,
            idempotency_ttl_ms,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn mutex(&self) -> &Arc<KeyedMutex> {
        &self.mutex
    }

    /// Sum of `amount` across every HELD reservation against this account.
    async fn held_reservations_total(&self, account_id: &AccountId) -> BalanceResult<Amount> {
        let reservations = self.store.list_reservations_by_account(account_id).await?;
        Ok(reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Held)
            .map(|r| r.amount)
            .sum())
    }

    /// `account.balance` minus the chips held by its open reservations.
    /// Never persisted; recomputed on every call.
    pub async fn available_balance(&self, account: &Account) -> BalanceResult<Amount> {
        let held = self.held_reservations_total(&account.account_id).await?;
        Ok(account.balance.saturating_sub(held))
    }

    /// Return `(account, created)`. If the account does not already exist it
    /// is created with `balance = initial_balance`; a second caller racing
    /// the first simply observes the first caller's freshly created account
    /// with `created = false`.
    pub async fn ensure_account(
        &self,
        account_id: &AccountId,
        initial_balance: Amount,
        now_ms: Timestamp,
    ) -> BalanceResult<(Account, bool)> {
        if let Some(account) = self.store.get_account(account_id).await? {
            return Ok((account, false));
        }
        let account = Account::new(account_id.clone(), initial_balance, now_ms);
        match self.store.create_account(account.clone()).await {
            Ok(()) => {
                info!(account_id = %account_id, initial_balance, "created account");
                Ok((account, true))
            }
            Err(BalanceError::AccountAlreadyExists(_)) => {
                let account = self
                    .store
                    .get_account(account_id)
                    .await?
                    .ok_or_else(|| BalanceError::UnknownAccount(account_id.to_string()))?;
                Ok((account, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Return `(account, availableBalance)`.
    pub async fn get_balance(&self, account_id: &AccountId) -> BalanceResult<(Account, Amount)> {
        let account = self
            .store
            .get_account(account_id)
            .await?
            .ok_or_else(|| BalanceError::UnknownAccount(account_id.to_string()))?;
        let available = self.available_balance(&account).await?;
        Ok((account, available))
    }

    /// Record one completed balance movement: mutate `account.balance`,
    /// write the immutable [`Transaction`], and append the next ledger
    /// chain link. `mutate` receives the freshly read account and the
    /// amount, and returns the account with its new balance applied (or an
    /// error, e.g. `InsufficientBalance`, without mutating anything).
    async fn record_movement<F, Fut>(
        &self,
        account_id: &AccountId,
        amount: Amount,
        tx_type: TxType,
        metadata: Metadata,
        idempotency_key: Option<IdempotencyKey>,
        now_ms: Timestamp,
        signed_amount: SignedAmount,
        mutate: F,
    ) -> BalanceResult<Transaction>
    where
        F: Fn(Account) -> Fut + Send + Sync,
        Fut: std::future::Future<Output = BalanceResult<Account>> + Send,
    {
        if amount == 0 {
            return Err(BalanceError::ZeroAmount);
        }

        let account_id_owned = account_id.clone();
        let (balance_before, account) = self
            .mutex
            .with_lock(account_id_owned.as_str(), || async move {
                let mut attempt = 0u32;
                loop {
                    let account = self
                        .store
                        .get_account(&account_id_owned)
                        .await?
                        .ok_or_else(|| BalanceError::UnknownAccount(account_id_owned.to_string()))?;
                    let expected_version = account.version;
                    let balance_before = account.balance;
                    let mut mutated = mutate(account).await?;
                    mutated.version = expected_version + 1;
                    mutated.updated_at = now_ms;

                    match self.store.cas_account(expected_version, mutated.clone()).await {
                        Ok(()) => return Ok((balance_before, mutated)),
                        Err(BalanceError::ConcurrencyConflict(_)) if attempt < MAX_CAS_RETRIES => {
                            attempt += 1;
                            warn!(account_id = %account_id_owned, attempt, "cas_account retry");
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
            })
            .await?;

        let transaction_id = TransactionId::new(format!("tx-{account_id}-{}", account.version));
        let transaction = Transaction {
            transaction_id: transaction_id.clone(),
            idempotency_key,
            tx_type,
            account_id: account_id.clone(),
            amount,
            balance_before,
            balance_after: account.balance,
            metadata: metadata.clone(),
            status: TxStatus::Completed,
            created_at: now_ms,
            completed_at: Some(now_ms),
        };
        self.store.put_transaction(transaction.clone()).await?;

        let previous_checksum = self.store.latest_checksum(account_id).await?;
        let entry_id = format!("ledger-{account_id}-{}", account.version);
        let checksum = ledger_checksum(&LedgerChecksumInput {
            entry_id: &entry_id,
            transaction_id: transaction_id.as_str(),
            account_id: account_id.as_str(),
            tx_type: tx_type.as_str(),
            amount: signed_amount,
            balance_before,
            balance_after: account.balance,
            metadata: &metadata,
            timestamp: now_ms,
            previous_checksum: &previous_checksum,
        })
        .map_err(|e| BalanceError::Serialization(e.to_string()))?;

        self.store
            .append_ledger_entry(LedgerEntry {
                entry_id: entry_id.into(),
                account_id: account_id.clone(),
                transaction_id,
                tx_type,
                amount: signed_amount,
                balance_before,
                balance_after: account.balance,
                metadata,
                timestamp: now_ms,
                sequence: account.version,
                previous_checksum,
                checksum,
            })
            .await?;

        info!(
            account_id = %account_id,
            tx_type = tx_type.as_str(),
            amount,
            "recorded transaction"
        );
        Ok(transaction)
    }

    /// Credit `amount` into the account's balance.
    pub async fn credit_balance(
        &self,
        account_id: &AccountId,
        amount: Amount,
        tx_type: TxType,
        metadata: Metadata,
        idempotency_key: Option<IdempotencyKey>,
        now_ms: Timestamp,
    ) -> BalanceResult<Transaction> {
        self.record_movement(
            account_id,
            amount,
            tx_type,
            metadata,
            idempotency_key,
            now_ms,
            amount as SignedAmount,
            move |mut acc| async move {
                acc.balance = acc.balance.saturating_add(amount);
                Ok(acc)
            },
        )
        .await
    }

    /// Debit `amount` from the account's balance.
    ///
    /// `use_available_balance` selects which figure the debit is validated
    /// against: `true` (the default for player-initiated debits) checks
    /// `balance - heldReservations`; `false` checks raw `balance` and is
    /// used when committing a reservation, since the reservation's hold was
    /// never materialized as an actual deduction from `balance`.
    pub async fn debit_balance(
        &self,
        account_id: &AccountId,
        amount: Amount,
        tx_type: TxType,
        metadata: Metadata,
        idempotency_key: Option<IdempotencyKey>,
        now_ms: Timestamp,
        use_available_balance: bool,
    ) -> BalanceResult<Transaction> {
        let held = if use_available_balance {
            self.held_reservations_total(account_id).await?
        } else {
            0
        };
        self.record_movement(
            account_id,
            amount,
            tx_type,
            metadata,
            idempotency_key,
            now_ms,
            -(amount as SignedAmount),
            move |mut acc| async move {
                let available = acc.balance.saturating_sub(held);
                if available < amount {
                    return Err(BalanceError::InsufficientBalance { need: amount, have: available });
                }
                acc.balance -= amount;
                Ok(acc)
            },
        )
        .await
    }

    pub async fn process_deposit(
        &self,
        account_id: &AccountId,
        amount: Amount,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<Transaction> {
        let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
        let fingerprint = format!("DEPOSIT:{account_id}:{amount}");
        cache
            .execute(&idempotency_key, &fingerprint, now_ms, || async {
                self.ensure_account(account_id, 0, now_ms).await?;
                self.credit_balance(
                    account_id,
                    amount,
                    TxType::Deposit,
                    Metadata::with_source("deposit"),
                    Some(idempotency_key.clone()),
                    now_ms,
                )
                .await
            })
            .await
    }

    pub async fn process_withdrawal(
        &self,
        account_id: &AccountId,
        amount: Amount,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<Transaction> {
        let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
        let fingerprint = format!("WITHDRAW:{account_id}:{amount}");
        cache
            .execute(&idempotency_key, &fingerprint, now_ms, || async {
                self.debit_balance(
                    account_id,
                    amount,
                    TxType::Withdraw,
                    Metadata::with_source("withdrawal"),
                    Some(idempotency_key.clone()),
                    now_ms,
                    true,
                )
                .await
            })
            .await
    }

    /// Pay `amount` of cash-out proceeds back into an account's balance,
    /// e.g. after a table confirms a seat has left with chips.
    pub async fn process_cash_out(
        &self,
        account_id: &AccountId,
        amount: Amount,
        table_id: &str,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<Transaction> {
        let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
        let fingerprint = format!("CASH_OUT:{account_id}:{amount}:{table_id}");
        cache
            .execute(&idempotency_key, &fingerprint, now_ms, || async {
                self.credit_balance(
                    account_id,
                    amount,
                    TxType::CashOut,
                    Metadata::with_source(table_id),
                    Some(idempotency_key.clone()),
                    now_ms,
                )
                .await
            })
            .await
    }
}
