use std::sync::Arc;

use tracing::{info, warn};

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{
    AccountId, Amount, IdempotencyKey, Metadata, Reservation, ReservationId, ReservationStatus,
    Timestamp, Transaction, TransactionId, TxType,
};
use balance_store::{IdempotencyCache, KeyedMutex, Store};

use crate::accounting::AccountingEngine;

/// What a reservation transition should do, decided without touching the
/// store. Kept separate from [`ReservationEngine`]'s driver methods so the
/// transition rules themselves (§4.4's HELD → COMMITTED/RELEASED/EXPIRED
/// table) can be unit tested without a store or clock.
#[derive(Debug)]
pub enum ReservationPlan {
    /// Target was COMMITTED and the reservation already is: return success
    /// without debiting again.
    AlreadyCommitted,
    /// Target was RELEASED and the reservation is already RELEASED or
    /// EXPIRED: return success without releasing again.
    AlreadyReleased,
    /// The transition is invalid; surface `error` to the caller.
    Reject(BalanceError),
    /// A HELD reservation is past `expires_at`: flip it to EXPIRED and
    /// reject the commit attempt with `error`.
    ExpireThenReject(BalanceError),
    /// A HELD, unexpired reservation being committed: debit the account
    /// then mark it COMMITTED.
    DebitThenCommit,
    /// A HELD reservation being released: mark it RELEASED.
    Release,
    /// The expiry job found nothing to do for this reservation.
    Noop,
    /// A HELD, expired reservation found by the expiry scan: mark it
    /// EXPIRED.
    Expire,
}

/// Pure decision table for a reservation transition: §4.4's HELD (not
/// expired) / HELD (expired) / COMMITTED / RELEASED / EXPIRED rows crossed
/// with the Commit / Release / Expire target columns.
pub fn plan_transition(reservation: &Reservation, target: ReservationStatus, now_ms: Timestamp) -> ReservationPlan {
    let held_and_expired = reservation.status == ReservationStatus::Held && reservation.is_expired_at(now_ms);

    match target {
        ReservationStatus::Committed => match reservation.status {
            ReservationStatus::Held if !held_and_expired => ReservationPlan::DebitThenCommit,
            ReservationStatus::Held => {
                ReservationPlan::ExpireThenReject(BalanceError::ReservationExpired(reservation.reservation_id.to_string()))
            }
            ReservationStatus::Committed => ReservationPlan::AlreadyCommitted,
            ReservationStatus::Released => ReservationPlan::Reject(BalanceError::ReservationNotHeld {
                id: reservation.reservation_id.to_string(),
                current: reservation.status.as_str().to_string(),
            }),
            ReservationStatus::Expired => {
                ReservationPlan::Reject(BalanceError::ReservationExpired(reservation.reservation_id.to_string()))
            }
        },
        ReservationStatus::Released => match reservation.status {
            ReservationStatus::Held => ReservationPlan::Release,
            ReservationStatus::Committed => ReservationPlan::Reject(BalanceError::InvalidReservationTransition {
                from: reservation.status.as_str().to_string(),
                to: target.as_str().to_string(),
            }),
            ReservationStatus::Released | ReservationStatus::Expired => ReservationPlan::AlreadyReleased,
        },
        ReservationStatus::Expired => {
            if held_and_expired {
                ReservationPlan::Expire
            } else {
                ReservationPlan::Noop
            }
        }
        ReservationStatus::Held => ReservationPlan::Reject(BalanceError::InvalidReservationTransition {
            from: reservation.status.as_str().to_string(),
            to: target.as_str().to_string(),
        }),
    }
}

/// Two-phase holds against an account's balance. Placing a reservation
/// never moves chips out of `Account::balance` — it only creates the
/// [`Reservation`] row, and `availableBalance` excludes HELD reservations
/// at read time. The only operation that actually debits the account is
/// `commitReservation`; releasing or expiring a hold is a pure status
/// change.
pub struct ReservationEngine {
    store: Arc<dyn Store>,
    mutex: Arc<KeyedMutex>,
    accounting: Arc<AccountingEngine>,
    default_timeout_ms: i64,
    idempotency_ttl_ms: i64,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn Store>,
        mutex: Arc<KeyedMutex>,
        accounting: Arc<AccountingEngine>,
        default_timeout_ms: i64,
        idempotency_ttl_ms: i64,
    ) -> Self {
        Self {
            store,
            mutex,
            accounting,
            default_timeout_ms,
            idempotency_ttl_ms,
        }
    }

    pub async fn reserve_for_buy_in(
        &self,
        account_id: &AccountId,
        amount: Amount,
        table_id: &str,
        idempotency_key: IdempotencyKey,
        timeout_ms: Option<i64>,
        now_ms: Timestamp,
    ) -> BalanceResult<Reservation> {
        if amount == 0 {
            return Err(BalanceError::ZeroAmount);
        }

        let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
        let fingerprint = format!("RESERVE_FOR_BUY_IN:{account_id}:{table_id}:{amount}");
        let account_id = account_id.clone();
        let table_id = table_id.to_string();
        let expires_at = now_ms + timeout_ms.unwrap_or(self.default_timeout_ms);

        let reservation = cache
            .execute(&idempotency_key, &fingerprint, now_ms, || async {
                self.mutex
                    .with_lock(account_id.as_str(), || async {
                        let account = self
                            .store
                            .get_account(&account_id)
                            .await?
                            .ok_or_else(|| BalanceError::UnknownAccount(account_id.to_string()))?;
                        let available = self.accounting.available_balance(&account).await?;
                        if available < amount {
                            return Err(BalanceError::InsufficientBalance { need: amount, have: available });
                        }

                        let reservation_id = ReservationId::new(format!("res-{account_id}-{now_ms}"));
                        let reservation = Reservation {
                            reservation_id,
                            account_id: account_id.clone(),
                            amount,
                            status: ReservationStatus::Held,
                            table_id: table_id.clone(),
                            idempotency_key: idempotency_key.clone(),
                            transaction_id: None,
                            created_at: now_ms,
                            expires_at,
                            committed_at: None,
                            released_at: None,
                        };
                        self.store.put_reservation(reservation.clone()).await?;
                        Ok(reservation)
                    })
                    .await
            })
            .await?;

        info!(reservation_id = %reservation.reservation_id, account_id = %reservation.account_id, amount, "reservation held");
        Ok(reservation)
    }

    async fn load_reservation(&self, reservation_id: &ReservationId) -> BalanceResult<Reservation> {
        self.store
            .get_reservation(reservation_id)
            .await?
            .ok_or_else(|| BalanceError::ReservationNotFound(reservation_id.to_string()))
    }

    pub async fn commit_reservation(&self, reservation_id: &ReservationId, now_ms: Timestamp) -> BalanceResult<Reservation> {
        let reservation = self.load_reservation(reservation_id).await?;

        match plan_transition(&reservation, ReservationStatus::Committed, now_ms) {
            ReservationPlan::AlreadyCommitted => {
                let transaction_id = if let Some(tx_id) = reservation.transaction_id.clone() {
                    tx_id
                } else {
                    let commit_key = IdempotencyKey::new(format!("commit-{reservation_id}"));
                    match self.store.get_idempotency(&commit_key).await? {
                        Some(record) => serde_json::from_str::<Transaction>(&record.response_json)
                            .map(|tx| tx.transaction_id)
                            .unwrap_or_else(|_| TransactionId::new(format!("committed-{reservation_id}"))),
                        None => TransactionId::new(format!("committed-{reservation_id}")),
                    }
                };
                let mut updated = reservation;
                updated.transaction_id = Some(transaction_id);
                Ok(updated)
            }
            ReservationPlan::Reject(err) => Err(err),
            ReservationPlan::ExpireThenReject(err) => {
                let mut updated = reservation;
                updated.status = ReservationStatus::Expired;
                self.store.put_reservation(updated).await?;
                Err(err)
            }
            ReservationPlan::DebitThenCommit => {
                let commit_key = IdempotencyKey::new(format!("commit-{reservation_id}"));
                let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
                let fingerprint = format!("COMMIT_RESERVATION:{reservation_id}");
                let metadata = Metadata::with_reservation(reservation.reservation_id.to_string(), reservation.table_id.clone());
                let account_id = reservation.account_id.clone();
                let amount = reservation.amount;
                let transaction = cache
                    .execute(&commit_key, &fingerprint, now_ms, || async {
                        self.accounting
                            .debit_balance(&account_id, amount, TxType::BuyIn, metadata, Some(commit_key.clone()), now_ms, false)
                            .await
                    })
                    .await?;

                let mut updated = reservation;
                updated.status = ReservationStatus::Committed;
                updated.committed_at = Some(now_ms);
                updated.transaction_id = Some(transaction.transaction_id);
                self.store.put_reservation(updated.clone()).await?;
                info!(reservation_id = %updated.reservation_id, "reservation committed");
                Ok(updated)
            }
            ReservationPlan::AlreadyReleased | ReservationPlan::Release | ReservationPlan::Noop | ReservationPlan::Expire => {
                unreachable!("plan_transition(target = Committed) only yields commit-path variants")
            }
        }
    }

    pub async fn release_reservation(&self, reservation_id: &ReservationId, now_ms: Timestamp) -> BalanceResult<Reservation> {
        let reservation = self.load_reservation(reservation_id).await?;

        match plan_transition(&reservation, ReservationStatus::Released, now_ms) {
            ReservationPlan::AlreadyReleased => Ok(reservation),
            ReservationPlan::Reject(err) => Err(err),
            ReservationPlan::Release => {
                let mut updated = reservation;
                updated.status = ReservationStatus::Released;
                updated.released_at = Some(now_ms);
                self.store.put_reservation(updated.clone()).await?;
                info!(reservation_id = %updated.reservation_id, "reservation released");
                Ok(updated)
            }
            ReservationPlan::AlreadyCommitted
            | ReservationPlan::ExpireThenReject(_)
            | ReservationPlan::DebitThenCommit
            | ReservationPlan::Noop
            | ReservationPlan::Expire => {
                unreachable!("plan_transition(target = Released) only yields release-path variants")
            }
        }
    }

    /// Scan for HELD reservations past their TTL and mark them EXPIRED.
    /// Called on an interval by the reservation-expiry background job.
    pub async fn process_expired_reservations(&self, now_ms: Timestamp) -> BalanceResult<u64> {
        let expired = self.store.list_expired_held_reservations(now_ms).await?;
        let mut count = 0u64;
        for reservation in expired {
            let reservation_id = reservation.reservation_id.clone();
            match plan_transition(&reservation, ReservationStatus::Expired, now_ms) {
                ReservationPlan::Expire => {
                    let mut updated = reservation;
                    updated.status = ReservationStatus::Expired;
                    if let Err(e) = self.store.put_reservation(updated).await {
                        warn!(reservation_id = %reservation_id, error = %e, "failed to expire reservation");
                        continue;
                    }
                    count += 1;
                }
                _ => continue,
            }
        }
        if count > 0 {
            info!(count, "expired stale reservations");
        }
        Ok(count)
    }
}
