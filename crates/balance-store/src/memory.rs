use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{
    Account, AccountId, IdempotencyKey, IdempotencyRecord, LedgerEntry, PotId, Reservation,
    ReservationId, ReservationStatus, TablePot, Timestamp, Transaction, TransactionId, Version,
};
use balance_crypto::GENESIS_CHECKSUM;

use crate::store::Store;

/// Sharded in-process implementation of [`Store`]. This is the default
/// backend: no external dependency, process-lifetime durability only.
pub struct MemoryStore {
    accounts: DashMap<AccountId, Account>,
    transactions: DashMap<TransactionId, Transaction>,
    transactions_by_account: DashMap<AccountId, Vec<TransactionId>>,
    reservations: DashMap<ReservationId, Reservation>,
    reservations_by_account: DashMap<AccountId, Vec<ReservationId>>,
    ledger: DashMap<AccountId, Vec<LedgerEntry>>,
    pots: DashMap<PotId, TablePot>,
    active_pots: DashMap<PotId, ()>,
    idempotency: DashMap<IdempotencyKey, IdempotencyRecord>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            transactions_by_account: DashMap::new(),
            reservations: DashMap::new(),
            reservations_by_account: DashMap::new(),
            ledger: DashMap::new(),
            pots: DashMap::new(),
            active_pots: DashMap::new(),
            idempotency: DashMap::new(),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_account(&self, id: &AccountId) -> BalanceResult<Option<Account>> {
        Ok(self.accounts.get(id).map(|e| e.value().clone()))
    }

    async fn create_account(&self, account: Account) -> BalanceResult<()> {
        match self.accounts.entry(account.account_id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(BalanceError::AccountAlreadyExists(
                account.account_id.to_string(),
            )),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                v.insert(account);
                Ok(())
            }
        }
    }

    async fn cas_account(&self, expected_version: Version, account: Account) -> BalanceResult<()> {
        let mut slot = self
            .accounts
            .get_mut(&account.account_id)
            .ok_or_else(|| BalanceError::UnknownAccount(account.account_id.to_string()))?;
        if slot.version != expected_version {
            debug!(
                account_id = %account.account_id,
                expected_version,
                actual_version = slot.version,
                "cas_account version mismatch"
            );
            return Err(BalanceError::ConcurrencyConflict(account.account_id.to_string()));
        }
        *slot = account;
        Ok(())
    }

    async fn list_account_ids(&self) -> BalanceResult<Vec<AccountId>> {
        Ok(self.accounts.iter().map(|e| e.key().clone()).collect())
    }

    async fn put_transaction(&self, tx: Transaction) -> BalanceResult<()> {
        let account_id = tx.account_id.clone();
        let tx_id = tx.transaction_id.clone();
        self.transactions.insert(tx_id.clone(), tx);
        self.transactions_by_account
            .entry(account_id)
            .or_default()
            .push(tx_id);
        Ok(())
    }

    async fn get_transaction(&self, id: &TransactionId) -> BalanceResult<Option<Transaction>> {
        Ok(self.transactions.get(id).map(|e| e.value().clone()))
    }

    async fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> BalanceResult<Vec<Transaction>> {
        let ids = self
            .transactions_by_account
            .get(account_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        let mut out: Vec<Transaction> = ids
            .iter()
            .rev()
            .filter_map(|id| self.transactions.get(id).map(|e| e.value().clone()))
            .collect();
        out.truncate(limit.max(1));
        Ok(out)
    }

    async fn put_reservation(&self, reservation: Reservation) -> BalanceResult<()> {
        let account_id = reservation.account_id.clone();
        let id = reservation.reservation_id.clone();
        let is_new = !self.reservations.contains_key(&id);
        self.reservations.insert(id.clone(), reservation);
        if is_new {
            self.reservations_by_account
                .entry(account_id)
                .or_default()
                .push(id);
        }
        Ok(())
    }

    async fn get_reservation(&self, id: &ReservationId) -> BalanceResult<Option<Reservation>> {
        Ok(self.reservations.get(id).map(|e| e.value().clone()))
    }

    async fn list_reservations_by_account(
        &self,
        account_id: &AccountId,
    ) -> BalanceResult<Vec<Reservation>> {
        let ids = self
            .reservations_by_account
            .get(account_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.reservations.get(id).map(|e| e.value().clone()))
            .collect())
    }

    async fn list_expired_held_reservations(
        &self,
        now_ms: Timestamp,
    ) -> BalanceResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .iter()
            .filter(|e| e.value().status == ReservationStatus::Held && e.value().expires_at <= now_ms)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn append_ledger_entry(&self, entry: LedgerEntry) -> BalanceResult<()> {
        let mut chain = self.ledger.entry(entry.account_id.clone()).or_default();
        let expected_previous = chain.last().map(|e| e.checksum.clone()).unwrap_or_else(|| GENESIS_CHECKSUM.to_string());
        if entry.previous_checksum != expected_previous {
            return Err(BalanceError::LedgerChainBroken {
                account: entry.account_id.to_string(),
                expected: expected_previous,
                found: entry.previous_checksum,
            });
        }
        chain.push(entry);
        Ok(())
    }

    async fn latest_checksum(&self, account_id: &AccountId) -> BalanceResult<String> {
        Ok(self
            .ledger
            .get(account_id)
            .and_then(|chain| chain.last().map(|e| e.checksum.clone()))
            .unwrap_or_else(|| GENESIS_CHECKSUM.to_string()))
    }

    async fn list_ledger_entries(&self, account_id: &AccountId) -> BalanceResult<Vec<LedgerEntry>> {
        Ok(self
            .ledger
            .get(account_id)
            .map(|chain| chain.clone())
            .unwrap_or_default())
    }

    async fn put_pot(&self, pot: TablePot) -> BalanceResult<()> {
        use balance_core::PotStatus;
        match pot.status {
            PotStatus::Open => {
                self.active_pots.insert(pot.pot_id.clone(), ());
            }
            PotStatus::Settled | PotStatus::Cancelled => {
                self.active_pots.remove(&pot.pot_id);
            }
        }
        self.pots.insert(pot.pot_id.clone(), pot);
        Ok(())
    }

    async fn get_pot(&self, id: &PotId) -> BalanceResult<Option<TablePot>> {
        Ok(self.pots.get(id).map(|e| e.value().clone()))
    }

    async fn list_active_pot_ids(&self) -> BalanceResult<Vec<PotId>> {
        Ok(self.active_pots.iter().map(|e| e.key().clone()).collect())
    }

    async fn get_idempotency(&self, key: &IdempotencyKey) -> BalanceResult<Option<IdempotencyRecord>> {
        Ok(self.idempotency.get(key).map(|e| e.value().clone()))
    }

    async fn put_idempotency(&self, record: IdempotencyRecord) -> BalanceResult<()> {
        self.idempotency.insert(record.key.clone(), record);
        Ok(())
    }

    async fn remove_expired_idempotency(&self, now_ms: Timestamp) -> BalanceResult<u64> {
        let expired: Vec<IdempotencyKey> = self
            .idempotency
            .iter()
            .filter(|e| e.value().is_expired_at(now_ms))
            .map(|e| e.key().clone())
            .collect();
        let count = expired.len() as u64;
        for key in expired {
            self.idempotency.remove(&key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_cas_account() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new("acc-1"), 1_000, 1_000);
        store.create_account(account.clone()).await.unwrap();

        assert!(matches!(
            store.create_account(account.clone()).await,
            Err(BalanceError::AccountAlreadyExists(_))
        ));

        let mut updated = account.clone();
        updated.version = 1;
        updated.balance = 500;
        store.cas_account(0, updated).await.unwrap();

        let fetched = store.get_account(&account.account_id).await.unwrap().unwrap();
        assert_eq!(fetched.balance, 500);
        assert_eq!(fetched.version, 1);
    }

    #[tokio::test]
    async fn cas_account_rejects_stale_version() {
        let store = MemoryStore::new();
        let account = Account::new(AccountId::new("acc-2"), 1_000, 1_000);
        store.create_account(account.clone()).await.unwrap();

        let mut stale = account.clone();
        stale.version = 5;
        let err = store.cas_account(5, stale).await.unwrap_err();
        assert!(matches!(err, BalanceError::ConcurrencyConflict(_)));
    }

    #[tokio::test]
    async fn ledger_chain_enforces_previous_checksum() {
        use balance_core::{Metadata, TxType};

        let store = MemoryStore::new();
        let account_id = AccountId::new("acc-3");
        let entry = LedgerEntry {
            entry_id: "le-1".into(),
            account_id: account_id.clone(),
            transaction_id: "tx-1".into(),
            tx_type: TxType::Deposit,
            amount: 100,
            balance_before: 0,
            balance_after: 100,
            metadata: Metadata::default(),
            timestamp: 1_000,
            sequence: 0,
            previous_checksum: GENESIS_CHECKSUM.to_string(),
            checksum: "abc".to_string(),
        };
        store.append_ledger_entry(entry).await.unwrap();
        assert_eq!(store.latest_checksum(&account_id).await.unwrap(), "abc");

        let bad_entry = LedgerEntry {
            entry_id: "le-2".into(),
            account_id: account_id.clone(),
            transaction_id: "tx-2".into(),
            tx_type: TxType::Deposit,
            amount: 50,
            balance_before: 100,
            balance_after: 150,
            metadata: Metadata::default(),
            timestamp: 1_001,
            sequence: 1,
            previous_checksum: GENESIS_CHECKSUM.to_string(),
            checksum: "def".to_string(),
        };
        assert!(store.append_ledger_entry(bad_entry).await.is_err());
    }
}
