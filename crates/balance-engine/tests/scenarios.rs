use std::sync::Arc;

use balance_core::error::BalanceError;
use balance_core::{AccountId, IdempotencyKey, PotId, WinnerClaim};
use balance_engine::{AccountingEngine, PotEngine, ReservationEngine};
use balance_store::{KeyedMutex, MemoryStore, Store};

fn engines() -> (Arc<dyn Store>, Arc<AccountingEngine>, Arc<ReservationEngine>, Arc<PotEngine>) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let mutex = Arc::new(KeyedMutex::new());
    let accounting = Arc::new(AccountingEngine::new(store.clone(), mutex.clone(), 86_400_000));
    let reservation = Arc::new(ReservationEngine::new(store.clone(), mutex.clone(), accounting.clone(), 30_000, 86_400_000));
    let pot = Arc::new(PotEngine::new(
        store.clone(),
        mutex.clone(),
        accounting.clone(),
        AccountId::new("house"),
        86_400_000,
    ));
    (store, accounting, reservation, pot)
}

#[tokio::test]
async fn deposit_then_withdraw_round_trips_balance() {
    let (_store, accounting, _res, _pot) = engines();
    let account_id = AccountId::new("player-1");
    accounting.ensure_account(&account_id, 0, 1_000).await.unwrap();

    accounting
        .process_deposit(&account_id, 500, IdempotencyKey::new("dep-1"), 1_000)
        .await
        .unwrap();
    let (_, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(available, 500);

    accounting
        .process_withdrawal(&account_id, 200, IdempotencyKey::new("wd-1"), 1_100)
        .await
        .unwrap();
    let (_, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(available, 300);
}

#[tokio::test]
async fn withdrawal_beyond_available_balance_fails() {
    let (_store, accounting, _res, _pot) = engines();
    let account_id = AccountId::new("player-2");
    accounting.ensure_account(&account_id, 0, 1_000).await.unwrap();
    accounting
        .process_deposit(&account_id, 100, IdempotencyKey::new("dep-2"), 1_000)
        .await
        .unwrap();

    let err = accounting
        .process_withdrawal(&account_id, 500, IdempotencyKey::new("wd-2"), 1_100)
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::InsufficientBalance { .. }));
}

#[tokio::test]
async fn deposit_is_idempotent_on_retry() {
    let (_store, accounting, _res, _pot) = engines();
    let account_id = AccountId::new("player-3");
    accounting.ensure_account(&account_id, 0, 1_000).await.unwrap();
    let key = IdempotencyKey::new("dep-3");

    accounting.process_deposit(&account_id, 100, key.clone(), 1_000).await.unwrap();
    accounting.process_deposit(&account_id, 100, key, 1_050).await.unwrap();

    let (_, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(available, 100);
}

#[tokio::test]
async fn ensure_account_seeds_initial_balance_once() {
    let (_store, accounting, _res, _pot) = engines();
    let account_id = AccountId::new("player-seed");

    let (account, created) = accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();
    assert!(created);
    assert_eq!(account.balance, 1_000);

    let (account, created) = accounting.ensure_account(&account_id, 9_999, 1_050).await.unwrap();
    assert!(!created);
    assert_eq!(account.balance, 1_000);
}

#[tokio::test]
async fn reserve_commit_debits_on_commit_not_on_reserve() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-4");
    accounting.ensure_account(&account_id, 0, 1_000).await.unwrap();
    accounting
        .process_deposit(&account_id, 1_000, IdempotencyKey::new("dep-4"), 1_000)
        .await
        .unwrap();

    let held = reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-4"), None, 1_100)
        .await
        .unwrap();
    let (account, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 1_000);
    assert_eq!(available, 700);

    reservation.commit_reservation(&held.reservation_id, 1_200).await.unwrap();
    let (account, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 700);
    assert_eq!(available, 700);
}

#[tokio::test]
async fn committing_an_already_committed_reservation_is_idempotent() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-4b");
    accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();

    let held = reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-4b"), None, 1_100)
        .await
        .unwrap();
    let first = reservation.commit_reservation(&held.reservation_id, 1_200).await.unwrap();
    let second = reservation.commit_reservation(&held.reservation_id, 1_300).await.unwrap();

    assert_eq!(first.transaction_id, second.transaction_id);
    let (account, _) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 700);
}

#[tokio::test]
async fn committing_an_expired_reservation_expires_and_rejects() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-4c");
    accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();

    let held = reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-4c"), Some(10), 1_100)
        .await
        .unwrap();

    let err = reservation
        .commit_reservation(&held.reservation_id, 1_100 + 10 + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BalanceError::ReservationExpired(_)));

    // Balance never moved, and the reservation is now EXPIRED, not HELD.
    let (account, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 1_000);
    assert_eq!(available, 1_000);
}

#[tokio::test]
async fn release_reservation_frees_available_balance() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-5");
    accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();

    let held = reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-5"), None, 1_100)
        .await
        .unwrap();
    reservation.release_reservation(&held.reservation_id, 1_200).await.unwrap();

    let (account, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 1_000);
    assert_eq!(available, 1_000);
}

#[tokio::test]
async fn releasing_an_already_released_reservation_is_idempotent() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-5b");
    accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();

    let held = reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-5b"), None, 1_100)
        .await
        .unwrap();
    reservation.release_reservation(&held.reservation_id, 1_200).await.unwrap();
    reservation.release_reservation(&held.reservation_id, 1_300).await.unwrap();
}

#[tokio::test]
async fn expiry_job_expires_stale_reservations_without_touching_balance() {
    let (_store, accounting, reservation, _pot) = engines();
    let account_id = AccountId::new("player-6");
    accounting.ensure_account(&account_id, 1_000, 1_000).await.unwrap();

    reservation
        .reserve_for_buy_in(&account_id, 300, "table-1", IdempotencyKey::new("res-6"), None, 1_000)
        .await
        .unwrap();

    let expired_count = reservation.process_expired_reservations(1_000 + 30_000 + 1).await.unwrap();
    assert_eq!(expired_count, 1);

    let (account, available) = accounting.get_balance(&account_id).await.unwrap();
    assert_eq!(account.balance, 1_000);
    assert_eq!(available, 1_000);
}

#[tokio::test]
async fn settle_pot_splits_winnings_and_takes_rake() {
    let (_store, accounting, _res, pot) = engines();
    let winner = AccountId::new("winner-1");
    let loser = AccountId::new("loser-1");
    accounting.ensure_account(&winner, 0, 1_000).await.unwrap();
    accounting.ensure_account(&loser, 0, 1_000).await.unwrap();
    accounting.ensure_account(&AccountId::new("house"), 0, 1_000).await.unwrap();

    let pot_id = PotId::new("table-1", "hand-1");
    pot.record_contribution(&pot_id, "seat-1", &winner, 100, 500, 5, 20, 1_000)
        .await
        .unwrap();
    pot.record_contribution(&pot_id, "seat-2", &loser, 100, 500, 5, 20, 1_000)
        .await
        .unwrap();

    let settled = pot
        .settle_pot(
            &pot_id,
            vec![WinnerClaim {
                seat_id: "seat-1".into(),
                account_id: winner.clone(),
                amount: 200,
            }],
            IdempotencyKey::new("settle-1"),
            1_100,
        )
        .await
        .unwrap();

    assert_eq!(settled.status, balance_core::PotStatus::Settled);
    // 200 total, 5 bps cap 5 chips, pot above the 20-chip min so rake applies.
    let (_, available) = accounting.get_balance(&winner).await.unwrap();
    assert_eq!(available, 195);
    let (_, house_available) = accounting.get_balance(&AccountId::new("house")).await.unwrap();
    assert_eq!(house_available, 5);
}

#[tokio::test]
async fn settling_an_already_settled_pot_is_idempotent() {
    let (_store, accounting, _res, pot) = engines();
    let winner = AccountId::new("winner-2");
    accounting.ensure_account(&winner, 0, 1_000).await.unwrap();
    accounting.ensure_account(&AccountId::new("house"), 0, 1_000).await.unwrap();

    let pot_id = PotId::new("table-2", "hand-2");
    pot.record_contribution(&pot_id, "seat-1", &winner, 100, 0, 0, 0, 1_000)
        .await
        .unwrap();

    let winners = vec![WinnerClaim {
        seat_id: "seat-1".into(),
        account_id: winner.clone(),
        amount: 100,
    }];
    pot.settle_pot(&pot_id, winners.clone(), IdempotencyKey::new("settle-2"), 1_100)
        .await
        .unwrap();
    let settled_again = pot
        .settle_pot(&pot_id, winners, IdempotencyKey::new("settle-2-retry"), 1_200)
        .await
        .unwrap();

    assert_eq!(settled_again.status, balance_core::PotStatus::Settled);
    let (_, available) = accounting.get_balance(&winner).await.unwrap();
    assert_eq!(available, 100);
}

#[tokio::test]
async fn settling_a_pot_with_no_winners_marks_it_settled() {
    let (_store, accounting, _res, pot) = engines();
    let contributor = AccountId::new("seat-only");
    accounting.ensure_account(&contributor, 0, 1_000).await.unwrap();

    let pot_id = PotId::new("table-3", "hand-3");
    pot.record_contribution(&pot_id, "seat-1", &contributor, 50, 0, 0, 0, 1_000)
        .await
        .unwrap();

    let settled = pot.settle_pot(&pot_id, vec![], IdempotencyKey::new("settle-empty"), 1_100).await.unwrap();
    assert_eq!(settled.status, balance_core::PotStatus::Settled);
}

#[tokio::test]
async fn cancel_pot_refunds_every_contributor() {
    let (_store, accounting, _res, pot) = engines();
    let seat_a = AccountId::new("seat-a");
    let seat_b = AccountId::new("seat-b");
    accounting.ensure_account(&seat_a, 0, 1_000).await.unwrap();
    accounting.ensure_account(&seat_b, 0, 1_000).await.unwrap();

    let pot_id = PotId::new("table-4", "hand-1");
    pot.record_contribution(&pot_id, "seat-a", &seat_a, 50, 500, 5, 20, 1_000)
        .await
        .unwrap();
    pot.record_contribution(&pot_id, "seat-b", &seat_b, 75, 500, 5, 20, 1_000)
        .await
        .unwrap();

    let cancelled = pot.cancel_pot(&pot_id, 1_100).await.unwrap();
    assert_eq!(cancelled.status, balance_core::PotStatus::Cancelled);

    assert_eq!(accounting.get_balance(&seat_a).await.unwrap().1, 50);
    assert_eq!(accounting.get_balance(&seat_b).await.unwrap().1, 75);

    // Cancelling again must not refund a second time.
    let cancelled_again = pot.cancel_pot(&pot_id, 1_200).await.unwrap();
    assert_eq!(cancelled_again.status, balance_core::PotStatus::Cancelled);
    assert_eq!(accounting.get_balance(&seat_a).await.unwrap().1, 50);
}

#[test]
fn side_pots_split_all_in_layers_by_contribution_level() {
    use balance_core::Contribution;
    use balance_engine::calculate_side_pots;

    let contributions = vec![
        Contribution {
            seat_id: "short-stack".into(),
            account_id: AccountId::new("a"),
            amount: 50,
        },
        Contribution {
            seat_id: "mid-stack".into(),
            account_id: AccountId::new("b"),
            amount: 100,
        },
        Contribution {
            seat_id: "big-stack".into(),
            account_id: AccountId::new("c"),
            amount: 100,
        },
    ];

    let pots = calculate_side_pots(&contributions);
    assert_eq!(pots.len(), 2);
    assert_eq!(pots[0].amount, 150); // 50 * 3 eligible seats
    assert_eq!(pots[0].eligible_seats.len(), 3);
    assert_eq!(pots[1].amount, 100); // (100-50) * 2 remaining seats
    assert_eq!(pots[1].eligible_seats.len(), 2);
}

#[test]
fn remainder_distribution_is_deterministic_by_seat_id() {
    use balance_engine::normalize_winners;

    let winners = vec![
        WinnerClaim {
            seat_id: "seat-2".into(),
            account_id: AccountId::new("b"),
            amount: 3_334,
        },
        WinnerClaim {
            seat_id: "seat-1".into(),
            account_id: AccountId::new("a"),
            amount: 3_333,
        },
        WinnerClaim {
            seat_id: "seat-3".into(),
            account_id: AccountId::new("c"),
            amount: 3_333,
        },
    ];

    let shares = normalize_winners(&winners, 10);
    let total: u64 = shares.iter().map(|(_, amt)| *amt).sum();
    assert_eq!(total, 10);

    let seat1_share = shares.iter().find(|(w, _)| w.seat_id == "seat-1").unwrap().1;
    assert_eq!(seat1_share, 4);
}

#[test]
fn normalize_winners_zeroes_everyone_when_target_is_zero() {
    use balance_engine::normalize_winners;

    let winners = vec![WinnerClaim {
        seat_id: "seat-1".into(),
        account_id: AccountId::new("a"),
        amount: 100,
    }];
    let shares = normalize_winners(&winners, 0);
    assert_eq!(shares[0].1, 0);
}
