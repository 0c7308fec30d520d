//! Redis-backed [`Store`] implementation, enabled by the `redis-backend`
//! feature. Keyspace layout follows the hash/list/sorted-set/set design:
//!
//! - `balance:accounts:<id>`                 — hash of account fields
//! - `balance:accounts:ids`                  — set of all account ids
//! - `balance:transactions:<id>`             — hash, JSON-encoded transaction
//! - `balance:transactions:by-account:<id>`  — list of transaction ids, newest last
//! - `balance:reservations:<id>`             — hash, JSON-encoded reservation
//! - `balance:reservations:by-account:<id>`  — list of reservation ids
//! - `balance:reservations:expiry`           — sorted set, score = expires_at ms
//! - `balance:ledger:<accountId>`            — list of JSON-encoded ledger entries
//! - `balance:ledger:latest-checksum:<id>`   — string, latest checksum
//! - `balance:pots:<tableId:handId>`         — hash, JSON-encoded pot
//! - `balance:pots:active`                   — set of active pot ids
//! - `balance:transactions:idempotency:<key>`— string, JSON-encoded record, with TTL

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{
    Account, AccountId, IdempotencyKey, IdempotencyRecord, LedgerEntry, PotId, Reservation,
    ReservationId, ReservationStatus, TablePot, Timestamp, Transaction, TransactionId, Version,
};
use balance_crypto::GENESIS_CHECKSUM;

use crate::store::Store;

const ACCOUNTS_IDS_KEY: &str = "balance:accounts:ids";
const ACTIVE_POTS_KEY: &str = "balance:pots:active";
const RESERVATIONS_EXPIRY_KEY: &str = "balance:reservations:expiry";

fn account_key(id: &AccountId) -> String {
    format!("balance:accounts:{id}")
}

fn tx_key(id: &TransactionId) -> String {
    format!("balance:transactions:{id}")
}

fn tx_by_account_key(id: &AccountId) -> String {
    format!("balance:transactions:by-account:{id}")
}

fn reservation_key(id: &ReservationId) -> String {
    format!("balance:reservations:{id}")
}

fn reservation_by_account_key(id: &AccountId) -> String {
    format!("balance:reservations:by-account:{id}")
}

fn ledger_key(id: &AccountId) -> String {
    format!("balance:ledger:{id}")
}

fn ledger_checksum_key(id: &AccountId) -> String {
    format!("balance:ledger:latest-checksum:{id}")
}

fn pot_key(id: &PotId) -> String {
    format!("balance:pots:{id}")
}

fn idempotency_key(key: &IdempotencyKey) -> String {
    format!("balance:transactions:idempotency:{key}")
}

fn to_json<T: serde::Serialize>(value: &T) -> BalanceResult<String> {
    serde_json::to_string(value).map_err(|e| BalanceError::Serialization(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> BalanceResult<T> {
    serde_json::from_str(raw).map_err(|e| BalanceError::Serialization(e.to_string()))
}

fn redis_err(e: redis::RedisError) -> BalanceError {
    BalanceError::Storage(e.to_string())
}

pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> BalanceResult<Self> {
        let client = redis::Client::open(url).map_err(redis_err)?;
        let conn = ConnectionManager::new(client).await.map_err(redis_err)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get_account(&self, id: &AccountId) -> BalanceResult<Option<Account>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(account_key(id)).await.map_err(redis_err)?;
        raw.map(|r| from_json(&r)).transpose()
    }

    async fn create_account(&self, account: Account) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let key = account_key(&account.account_id);
        let json = to_json(&account)?;
        let created: bool = redis::cmd("SET")
            .arg(&key)
            .arg(&json)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;
        if !created {
            return Err(BalanceError::AccountAlreadyExists(account.account_id.to_string()));
        }
        let _: () = conn
            .sadd(ACCOUNTS_IDS_KEY, account.account_id.to_string())
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn cas_account(&self, expected_version: Version, account: Account) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let key = account_key(&account.account_id);
        let current: Option<String> = conn.get(&key).await.map_err(redis_err)?;
        let current_account: Account = match current {
            Some(raw) => from_json(&raw)?,
            None => return Err(BalanceError::UnknownAccount(account.account_id.to_string())),
        };
        if current_account.version != expected_version {
            debug!(
                account_id = %account.account_id,
                expected_version,
                actual_version = current_account.version,
                "cas_account version mismatch"
            );
            return Err(BalanceError::ConcurrencyConflict(account.account_id.to_string()));
        }
        let json = to_json(&account)?;
        let _: () = conn.set(&key, json).await.map_err(redis_err)?;
        Ok(())
    }

    async fn list_account_ids(&self) -> BalanceResult<Vec<AccountId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(ACCOUNTS_IDS_KEY).await.map_err(redis_err)?;
        Ok(ids.into_iter().map(AccountId::from).collect())
    }

    async fn put_transaction(&self, tx: Transaction) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let json = to_json(&tx)?;
        let _: () = conn.set(tx_key(&tx.transaction_id), &json).await.map_err(redis_err)?;
        let _: () = conn
            .rpush(tx_by_account_key(&tx.account_id), tx.transaction_id.to_string())
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn get_transaction(&self, id: &TransactionId) -> BalanceResult<Option<Transaction>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(tx_key(id)).await.map_err(redis_err)?;
        raw.map(|r| from_json(&r)).transpose()
    }

    async fn list_transactions_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
    ) -> BalanceResult<Vec<Transaction>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(tx_by_account_key(account_id), 0, -1)
            .await
            .map_err(redis_err)?;
        let mut out = Vec::new();
        for id in ids.into_iter().rev().take(limit.max(1)) {
            let raw: Option<String> = conn.get(format!("balance:transactions:{id}")).await.map_err(redis_err)?;
            if let Some(raw) = raw {
                out.push(from_json(&raw)?);
            }
        }
        Ok(out)
    }

    async fn put_reservation(&self, reservation: Reservation) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let is_new: bool = !conn
            .exists(reservation_key(&reservation.reservation_id))
            .await
            .map_err(redis_err)?;
        let json = to_json(&reservation)?;
        let _: () = conn
            .set(reservation_key(&reservation.reservation_id), &json)
            .await
            .map_err(redis_err)?;
        if is_new {
            let _: () = conn
                .rpush(
                    reservation_by_account_key(&reservation.account_id),
                    reservation.reservation_id.to_string(),
                )
                .await
                .map_err(redis_err)?;
        }
        match reservation.status {
            ReservationStatus::Held => {
                let _: () = conn
                    .zadd(
                        RESERVATIONS_EXPIRY_KEY,
                        reservation.reservation_id.to_string(),
                        reservation.expires_at,
                    )
                    .await
                    .map_err(redis_err)?;
            }
            _ => {
                let _: () = conn
                    .zrem(RESERVATIONS_EXPIRY_KEY, reservation.reservation_id.to_string())
                    .await
                    .map_err(redis_err)?;
            }
        }
        Ok(())
    }

    async fn get_reservation(&self, id: &ReservationId) -> BalanceResult<Option<Reservation>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(reservation_key(id)).await.map_err(redis_err)?;
        raw.map(|r| from_json(&r)).transpose()
    }

    async fn list_reservations_by_account(
        &self,
        account_id: &AccountId,
    ) -> BalanceResult<Vec<Reservation>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(reservation_by_account_key(account_id), 0, -1)
            .await
            .map_err(redis_err)?;
        let mut out = Vec::new();
        for id in ids {
            let raw: Option<String> = conn.get(format!("balance:reservations:{id}")).await.map_err(redis_err)?;
            if let Some(raw) = raw {
                out.push(from_json(&raw)?);
            }
        }
        Ok(out)
    }

    async fn list_expired_held_reservations(
        &self,
        now_ms: Timestamp,
    ) -> BalanceResult<Vec<Reservation>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .zrangebyscore(RESERVATIONS_EXPIRY_KEY, "-inf", now_ms)
            .await
            .map_err(redis_err)?;
        let mut out = Vec::new();
        for id in ids {
            let raw: Option<String> = conn.get(format!("balance:reservations:{id}")).await.map_err(redis_err)?;
            if let Some(raw) = raw {
                let reservation: Reservation = from_json(&raw)?;
                if reservation.status == ReservationStatus::Held {
                    out.push(reservation);
                }
            }
        }
        Ok(out)
    }

    async fn append_ledger_entry(&self, entry: LedgerEntry) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let checksum_key = ledger_checksum_key(&entry.account_id);
        let expected_previous: String = conn
            .get(&checksum_key)
            .await
            .map_err(redis_err)?
            .unwrap_or_else(|| GENESIS_CHECKSUM.to_string());
        if entry.previous_checksum != expected_previous {
            return Err(BalanceError::LedgerChainBroken {
                account: entry.account_id.to_string(),
                expected: expected_previous,
                found: entry.previous_checksum,
            });
        }
        let json = to_json(&entry)?;
        let _: () = conn.rpush(ledger_key(&entry.account_id), &json).await.map_err(redis_err)?;
        let _: () = conn.set(&checksum_key, &entry.checksum).await.map_err(redis_err)?;
        Ok(())
    }

    async fn latest_checksum(&self, account_id: &AccountId) -> BalanceResult<String> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(ledger_checksum_key(account_id)).await.map_err(redis_err)?;
        Ok(raw.unwrap_or_else(|| GENESIS_CHECKSUM.to_string()))
    }

    async fn list_ledger_entries(&self, account_id: &AccountId) -> BalanceResult<Vec<LedgerEntry>> {
        let mut conn = self.conn.clone();
        let raws: Vec<String> = conn.lrange(ledger_key(account_id), 0, -1).await.map_err(redis_err)?;
        raws.iter().map(|r| from_json(r)).collect()
    }

    async fn put_pot(&self, pot: TablePot) -> BalanceResult<()> {
        use balance_core::PotStatus;
        let mut conn = self.conn.clone();
        let json = to_json(&pot)?;
        let _: () = conn.set(pot_key(&pot.pot_id), &json).await.map_err(redis_err)?;
        match pot.status {
            PotStatus::Open => {
                let _: () = conn.sadd(ACTIVE_POTS_KEY, pot.pot_id.to_string()).await.map_err(redis_err)?;
            }
            PotStatus::Settled | PotStatus::Cancelled => {
                let _: () = conn.srem(ACTIVE_POTS_KEY, pot.pot_id.to_string()).await.map_err(redis_err)?;
            }
        }
        Ok(())
    }

    async fn get_pot(&self, id: &PotId) -> BalanceResult<Option<TablePot>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(pot_key(id)).await.map_err(redis_err)?;
        raw.map(|r| from_json(&r)).transpose()
    }

    async fn list_active_pot_ids(&self) -> BalanceResult<Vec<PotId>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn.smembers(ACTIVE_POTS_KEY).await.map_err(redis_err)?;
        Ok(ids.into_iter().map(PotId).collect())
    }

    async fn get_idempotency(&self, key: &IdempotencyKey) -> BalanceResult<Option<IdempotencyRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(idempotency_key(key)).await.map_err(redis_err)?;
        raw.map(|r| from_json(&r)).transpose()
    }

    async fn put_idempotency(&self, record: IdempotencyRecord) -> BalanceResult<()> {
        let mut conn = self.conn.clone();
        let json = to_json(&record)?;
        let ttl_secs = ((record.expires_at - record.created_at).max(1_000) / 1_000) as u64;
        let _: () = conn
            .set_ex(idempotency_key(&record.key), json, ttl_secs)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn remove_expired_idempotency(&self, _now_ms: Timestamp) -> BalanceResult<u64> {
        // Redis TTL already reclaims expired keys; nothing to sweep.
        Ok(0)
    }
}
