use std::sync::Arc;

use tracing::{error, info};

use balance_core::error::{BalanceError, BalanceResult};
use balance_core::{
    AccountId, Amount, Contribution, IdempotencyKey, Metadata, PotId, PotStatus, TablePot,
    Timestamp, TxType, WinnerClaim, MAX_RAKE_BASIS_POINTS,
};
use balance_store::{IdempotencyCache, KeyedMutex, Store};

use crate::accounting::AccountingEngine;

/// Split a hand's total contributions into side pots. Contributions are
/// sorted ascending by amount; each distinct contribution level opens a
/// new layer sized `(level - previous_level) * eligible_count`, where
/// `eligible_count` is the number of seats that contributed at least that
/// much. A seat that went all-in for less than another is eligible for
/// every layer up to its own contribution, never beyond.
pub fn calculate_side_pots(contributions: &[Contribution]) -> Vec<balance_core::SidePot> {
    let mut sorted: Vec<&Contribution> = contributions.iter().filter(|c| c.amount > 0).collect();
    sorted.sort_by_key(|c| c.amount);

    let mut pots = Vec::new();
    let mut previous_level: Amount = 0;
    for i in 0..sorted.len() {
        let level = sorted[i].amount;
        if level == previous_level {
            continue;
        }
        let eligible: Vec<String> = sorted[i..].iter().map(|c| c.seat_id.clone()).collect();
        let increment = level - previous_level;
        let layer_amount = increment.saturating_mul(eligible.len() as Amount);
        if layer_amount > 0 {
            pots.push(balance_core::SidePot {
                amount: layer_amount,
                eligible_seats: eligible,
            });
        }
        previous_level = level;
    }
    pots
}

/// Rake taken from a settleable pot: `basis_points` of the total, capped at
/// `cap`, and waived entirely for pots at or below `min_pot` or when either
/// `basis_points` or `cap` is zero.
pub fn calculate_rake(pot_amount: Amount, basis_points: u32, cap: Amount, min_pot: Amount) -> Amount {
    if basis_points == 0 || cap == 0 || pot_amount <= min_pot {
        return 0;
    }
    let raw = (pot_amount as u128 * basis_points as u128) / MAX_RAKE_BASIS_POINTS as u128;
    (raw as Amount).min(cap)
}

/// Scale each winner's raw claimed `amount` proportionally so the shares sum
/// to `target_total`: `base[i] = floor(winners[i].amount / totalRequested *
/// targetTotal)`, with the integer-division remainder handed out one chip
/// at a time to winners in ascending seat-id order. Claims need not sum to
/// `target_total` — they're a relative weighting, not an exact split.
///
/// If the total requested or the target is non-positive, every winner gets
/// zero: there is nothing meaningful to proportion.
pub fn normalize_winners(winners: &[WinnerClaim], target_total: Amount) -> Vec<(WinnerClaim, Amount)> {
    let total_requested: Amount = winners.iter().map(|w| w.amount).sum();
    if total_requested == 0 || target_total == 0 {
        return winners.iter().cloned().map(|w| (w, 0)).collect();
    }

    let mut shares: Vec<(WinnerClaim, Amount)> = winners
        .iter()
        .map(|w| {
            let base = (w.amount as u128 * target_total as u128) / total_requested as u128;
            (w.clone(), base as Amount)
        })
        .collect();

    let distributed: Amount = shares.iter().map(|(_, s)| *s).sum();
    let mut remainder = target_total.saturating_sub(distributed);
    if remainder == 0 || shares.is_empty() {
        return shares;
    }

    let mut order: Vec<usize> = (0..shares.len()).collect();
    order.sort_by(|&a, &b| shares[a].0.seat_id.cmp(&shares[b].0.seat_id));

    let mut idx = 0;
    while remainder > 0 {
        let i = order[idx % order.len()];
        shares[i].1 += 1;
        remainder -= 1;
        idx += 1;
    }

    order.into_iter().map(|i| shares[i].clone()).collect()
}

/// Per-hand contribution tracking and final settlement (including rake and
/// deterministic winner distribution) for one table's pot.
pub struct PotEngine {
    store: Arc<dyn Store>,
    mutex: Arc<KeyedMutex>,
    accounting: Arc<AccountingEngine>,
    house_account_id: AccountId,
    idempotency_ttl_ms: i64,
}

impl PotEngine {
    pub fn new(
        store: Arc<dyn Store>,
        mutex: Arc<KeyedMutex>,
        accounting: Arc<AccountingEngine>,
        house_account_id: AccountId,
        idempotency_ttl_ms: i64,
    ) -> Self {
        Self {
            store,
            mutex,
            accounting,
            house_account_id,
            idempotency_ttl_ms,
        }
    }

    pub async fn record_contribution(
        &self,
        pot_id: &PotId,
        seat_id: &str,
        account_id: &AccountId,
        amount: Amount,
        rake_basis_points: u32,
        rake_cap: Amount,
        rake_min_pot: Amount,
        now_ms: Timestamp,
    ) -> BalanceResult<TablePot> {
        if amount == 0 {
            return Err(BalanceError::ZeroAmount);
        }
        let mut pot = match self.store.get_pot(pot_id).await? {
            Some(pot) => pot,
            None => TablePot::new(
                pot_id.clone(),
                pot_id.table_id(),
                pot_id.hand_id(),
                rake_basis_points,
                rake_cap,
                rake_min_pot,
                now_ms,
            ),
        };
        if pot.status != PotStatus::Open {
            return Err(BalanceError::PotNotOpen {
                id: pot_id.to_string(),
                current: format!("{:?}", pot.status),
            });
        }

        pot.contributions
            .entry(seat_id.to_string())
            .and_modify(|c| c.amount = c.amount.saturating_add(amount))
            .or_insert_with(|| Contribution {
                seat_id: seat_id.to_string(),
                account_id: account_id.clone(),
                amount,
            });
        self.store.put_pot(pot.clone()).await?;
        Ok(pot)
    }

    pub async fn settle_pot(
        &self,
        pot_id: &PotId,
        winners: Vec<WinnerClaim>,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<TablePot> {
        let cache = IdempotencyCache::new(self.store.as_ref(), self.idempotency_ttl_ms);
        let fingerprint = format!("SETTLE_POT:{pot_id}");
        cache
            .execute(&idempotency_key, &fingerprint, now_ms, || async {
                self.settle_pot_inner(pot_id, winners, idempotency_key.clone(), now_ms).await
            })
            .await
    }

    async fn settle_pot_inner(
        &self,
        pot_id: &PotId,
        winners: Vec<WinnerClaim>,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<TablePot> {
        let pot = self
            .store
            .get_pot(pot_id)
            .await?
            .ok_or_else(|| BalanceError::PotNotFound(pot_id.to_string()))?;

        // Already settled: idempotent success, nothing more to do.
        if pot.status == PotStatus::Settled {
            return Ok(pot);
        }
        if pot.status != PotStatus::Open {
            return Err(BalanceError::PotNotOpen {
                id: pot_id.to_string(),
                current: format!("{:?}", pot.status),
            });
        }

        let total = pot.total();
        let rake = calculate_rake(total, pot.rake_basis_points, pot.rake_cap, pot.rake_min_pot);
        let settleable = total.saturating_sub(rake);
        let shares: Vec<(WinnerClaim, Amount)> = normalize_winners(&winners, settleable)
            .into_iter()
            .filter(|(_, amount)| *amount > 0)
            .collect();

        // Nothing payable (no winners, or settleable rounds to zero for
        // everyone): settle idempotently with no credits.
        if shares.is_empty() {
            let mut settled = pot;
            settled.status = PotStatus::Settled;
            settled.settled_at = Some(now_ms);
            self.store.put_pot(settled.clone()).await?;
            info!(pot_id = %pot_id, total, rake, "pot settled with no payable winners");
            return Ok(settled);
        }

        let mut account_ids: Vec<String> = shares.iter().map(|(w, _)| w.account_id.to_string()).collect();
        account_ids.sort();
        account_ids.dedup();

        for account_id in &account_ids {
            self.accounting.ensure_account(&AccountId::new(account_id.clone()), 0, now_ms).await?;
        }

        let metadata = Metadata::with_reservation(pot_id.to_string(), pot.table_id.clone());

        self.mutex
            .with_lock_ordered(&account_ids, || async {
                self.credit_winners(&shares, metadata.clone(), idempotency_key.clone(), now_ms).await
            })
            .await?;

        if rake > 0 {
            self.accounting
                .credit_balance(
                    &self.house_account_id,
                    rake,
                    TxType::Rake,
                    Metadata::with_reservation(pot_id.to_string(), pot.table_id.clone()),
                    None,
                    now_ms,
                )
                .await?;
        }

        let mut settled = pot;
        settled.status = PotStatus::Settled;
        settled.settled_at = Some(now_ms);
        self.store.put_pot(settled.clone()).await?;
        info!(pot_id = %pot_id, total, rake, "pot settled");
        Ok(settled)
    }

    /// Credit every winner's share. On a mid-way failure, reverses every
    /// already-applied credit in reverse order before returning the error,
    /// so a partial failure never leaves winners credited inconsistently.
    async fn credit_winners(
        &self,
        shares: &[(WinnerClaim, Amount)],
        metadata: Metadata,
        idempotency_key: IdempotencyKey,
        now_ms: Timestamp,
    ) -> BalanceResult<()> {
        let mut credited: Vec<(AccountId, Amount)> = Vec::new();
        for (winner, amount) in shares {
            if *amount == 0 {
                continue;
            }
            let credit_key = IdempotencyKey::new(format!("{idempotency_key}:{}", winner.seat_id));
            match self
                .accounting
                .credit_balance(&winner.account_id, *amount, TxType::PotWin, metadata.clone(), Some(credit_key), now_ms)
                .await
            {
                Ok(_) => credited.push((winner.account_id.clone(), *amount)),
                Err(e) => {
                    for (account_id, amt) in credited.iter().rev() {
                        let rollback_key = IdempotencyKey::new(format!("{idempotency_key}:rollback:{account_id}"));
                        if let Err(rollback_err) = self
                            .accounting
                            .debit_balance(account_id, *amt, TxType::Refund, metadata.clone(), Some(rollback_key), now_ms, false)
                            .await
                        {
                            error!(account_id = %account_id, error = %rollback_err, "pot settlement rollback failed");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    pub async fn cancel_pot(&self, pot_id: &PotId, now_ms: Timestamp) -> BalanceResult<TablePot> {
        let pot = self
            .store
            .get_pot(pot_id)
            .await?
            .ok_or_else(|| BalanceError::PotNotFound(pot_id.to_string()))?;

        if pot.status == PotStatus::Cancelled {
            return Ok(pot);
        }
        if pot.status != PotStatus::Open {
            return Err(BalanceError::PotNotOpen {
                id: pot_id.to_string(),
                current: format!("{:?}", pot.status),
            });
        }

        for contribution in pot.contributions.values() {
            if contribution.amount == 0 {
                continue;
            }
            let refund_key = IdempotencyKey::new(format!("cancel:{pot_id}:{}", contribution.seat_id));
            self.accounting
                .credit_balance(
                    &contribution.account_id,
                    contribution.amount,
                    TxType::Refund,
                    Metadata::with_reservation(pot_id.to_string(), pot.table_id.clone()),
                    Some(refund_key),
                    now_ms,
                )
                .await?;
        }

        let mut cancelled = pot;
        cancelled.status = PotStatus::Cancelled;
        cancelled.settled_at = Some(now_ms);
        self.store.put_pot(cancelled.clone()).await?;
        info!(pot_id = %pot_id, "pot cancelled and refunded");
        Ok(cancelled)
    }
}
