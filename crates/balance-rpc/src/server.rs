use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use balance_core::error::BalanceError;
use balance_core::{Account, AccountId, Amount, IdempotencyKey, PotId, Reservation, TablePot, Transaction, WinnerClaim};
use balance_engine::{AccountingEngine, PotEngine, ReservationEngine};

use crate::api::BalanceApiServer;
use crate::types::{RpcAccount, RpcContribution, RpcPot, RpcReservation, RpcTransaction, RpcWinnerClaim};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

/// Map a domain error to the taxonomy §7 describes. Validation failures
/// (malformed caller input) use the JSON-RPC standard `-32602` invalid
/// params code; every other domain condition gets a stable positive code
/// plus the named error string callers can match on. Anything left over is
/// a genuine internal failure.
fn map_error(err: BalanceError) -> ErrorObject<'static> {
    match &err {
        BalanceError::ZeroAmount => rpc_err(-32602, format!("INVALID_AMOUNT: {err}")),
        BalanceError::IdempotencyKeyConflict { .. } => rpc_err(-32602, format!("IDEMPOTENCY_KEY_CONFLICT: {err}")),
        BalanceError::UnknownAccount(_) => rpc_err(1, format!("ACCOUNT_NOT_FOUND: {err}")),
        BalanceError::InsufficientBalance { .. } => rpc_err(2, format!("INSUFFICIENT_BALANCE: {err}")),
        BalanceError::ReservationNotFound(_) => rpc_err(3, format!("RESERVATION_NOT_FOUND: {err}")),
        BalanceError::ReservationExpired(_) => rpc_err(4, format!("RESERVATION_EXPIRED: {err}")),
        BalanceError::ReservationNotHeld { .. } => rpc_err(6, format!("RESERVATION_NOT_HELD: {err}")),
        BalanceError::InvalidReservationTransition { .. } => rpc_err(6, format!("RESERVATION_NOT_HELD: {err}")),
        BalanceError::PotNotFound(_) => rpc_err(7, format!("POT_NOT_FOUND: {err}")),
        BalanceError::PotNotOpen { .. } => rpc_err(8, format!("POT_NOT_ACTIVE: {err}")),
        _ => rpc_err(-32603, err.to_string()),
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn account_to_rpc(account: Account, available_balance: Amount, created: bool) -> RpcAccount {
    RpcAccount {
        account_id: account.account_id.to_string(),
        balance: account.balance,
        available_balance,
        currency: account.currency,
        version: account.version,
        created,
    }
}

fn transaction_to_rpc(tx: Transaction) -> RpcTransaction {
    RpcTransaction {
        transaction_id: tx.transaction_id.to_string(),
        tx_type: tx.tx_type.as_str().to_string(),
        account_id: tx.account_id.to_string(),
        amount: tx.amount,
        balance_before: tx.balance_before,
        balance_after: tx.balance_after,
        status: format!("{:?}", tx.status),
        created_at: tx.created_at,
        completed_at: tx.completed_at,
    }
}

fn reservation_to_rpc(res: Reservation) -> RpcReservation {
    RpcReservation {
        reservation_id: res.reservation_id.to_string(),
        account_id: res.account_id.to_string(),
        amount: res.amount,
        status: res.status.as_str().to_string(),
        table_id: res.table_id,
        transaction_id: res.transaction_id.map(|id| id.to_string()),
        created_at: res.created_at,
        expires_at: res.expires_at,
        committed_at: res.committed_at,
        released_at: res.released_at,
    }
}

fn pot_to_rpc(pot: TablePot) -> RpcPot {
    let total = pot.total();
    RpcPot {
        pot_id: pot.pot_id.to_string(),
        table_id: pot.table_id,
        hand_id: pot.hand_id,
        status: format!("{:?}", pot.status),
        total,
        contributions: pot
            .contributions
            .into_values()
            .map(|c| RpcContribution {
                seat_id: c.seat_id,
                account_id: c.account_id.to_string(),
                amount: c.amount,
            })
            .collect(),
    }
}

fn claims_to_winners(claims: Vec<RpcWinnerClaim>) -> Vec<WinnerClaim> {
    claims
        .into_iter()
        .map(|c| WinnerClaim {
            seat_id: c.seat_id,
            account_id: AccountId::new(c.account_id),
            amount: c.amount,
        })
        .collect()
}

/// Shared state passed to the RPC server: the three engines that do all the
/// real work, wired up by `balance-node`'s composition root.
pub struct RpcServerState {
    pub accounting: Arc<AccountingEngine>,
    pub reservations: Arc<ReservationEngine>,
    pub pots: Arc<PotEngine>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr` with permissive CORS headers.
    /// Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let cors = CorsLayer::new().allow_methods(Any).allow_origin(Any).allow_headers(Any);

        let server = Server::builder()
            .set_http_middleware(tower::ServiceBuilder::new().layer(cors))
            .build(addr)
            .await?;

        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }
}

#[async_trait]
impl BalanceApiServer for RpcServer {
    async fn get_balance(&self, account_id: String) -> RpcResult<RpcAccount> {
        let (account, available) = self
            .state
            .accounting
            .get_balance(&AccountId::new(account_id))
            .await
            .map_err(map_error)?;
        Ok(account_to_rpc(account, available, false))
    }

    async fn ensure_account(&self, account_id: String, initial_balance: Option<u64>) -> RpcResult<RpcAccount> {
        let (account, created) = self
            .state
            .accounting
            .ensure_account(&AccountId::new(account_id), initial_balance.unwrap_or(0), now_ms())
            .await
            .map_err(map_error)?;
        let available = self.state.accounting.available_balance(&account).await.map_err(map_error)?;
        Ok(account_to_rpc(account, available, created))
    }

    async fn reserve_for_buy_in(
        &self,
        account_id: String,
        table_id: String,
        amount: u64,
        idempotency_key: String,
        timeout_seconds: Option<u64>,
    ) -> RpcResult<RpcReservation> {
        if amount == 0 {
            return Err(map_error(BalanceError::ZeroAmount));
        }
        if idempotency_key.trim().is_empty() {
            return Err(rpc_err(-32602, "MISSING_IDEMPOTENCY_KEY"));
        }
        let timeout_ms = timeout_seconds.map(|secs| secs as i64 * 1_000);

        let reservation = self
            .state
            .reservations
            .reserve_for_buy_in(
                &AccountId::new(account_id),
                amount,
                &table_id,
                IdempotencyKey::new(idempotency_key),
                timeout_ms,
                now_ms(),
            )
            .await
            .map_err(map_error)?;
        Ok(reservation_to_rpc(reservation))
    }

    async fn commit_reservation(&self, reservation_id: String) -> RpcResult<RpcReservation> {
        let reservation = self
            .state
            .reservations
            .commit_reservation(&reservation_id.into(), now_ms())
            .await
            .map_err(map_error)?;
        Ok(reservation_to_rpc(reservation))
    }

    async fn release_reservation(&self, reservation_id: String, reason: Option<String>) -> RpcResult<RpcReservation> {
        let _ = reason;
        let reservation = self
            .state
            .reservations
            .release_reservation(&reservation_id.into(), now_ms())
            .await
            .map_err(map_error)?;
        Ok(reservation_to_rpc(reservation))
    }

    async fn process_cash_out(
        &self,
        account_id: String,
        table_id: String,
        seat_id: String,
        amount: u64,
        idempotency_key: String,
        hand_id: Option<String>,
    ) -> RpcResult<RpcTransaction> {
        if amount == 0 {
            return Err(map_error(BalanceError::ZeroAmount));
        }
        let _ = seat_id;
        let _ = hand_id;
        let transaction = self
            .state
            .accounting
            .process_cash_out(&AccountId::new(account_id), amount, &table_id, IdempotencyKey::new(idempotency_key), now_ms())
            .await
            .map_err(map_error)?;
        Ok(transaction_to_rpc(transaction))
    }

    async fn record_contribution(
        &self,
        table_id: String,
        hand_id: String,
        seat_id: String,
        account_id: String,
        amount: u64,
        contribution_type: String,
        idempotency_key: String,
    ) -> RpcResult<RpcPot> {
        let _ = contribution_type;
        let _ = idempotency_key;
        let pot_id = PotId::new(&table_id, &hand_id);
        let pot = self
            .state
            .pots
            .record_contribution(
                &pot_id,
                &seat_id,
                &AccountId::new(account_id),
                amount,
                balance_core::DEFAULT_RAKE_BASIS_POINTS,
                balance_core::DEFAULT_RAKE_CAP,
                balance_core::DEFAULT_RAKE_MIN_POT,
                now_ms(),
            )
            .await
            .map_err(map_error)?;
        Ok(pot_to_rpc(pot))
    }

    async fn settle_pot(
        &self,
        table_id: String,
        hand_id: String,
        winners: Vec<RpcWinnerClaim>,
        idempotency_key: String,
    ) -> RpcResult<RpcPot> {
        let winner_claims = claims_to_winners(winners);
        let pot_id = PotId::new(&table_id, &hand_id);
        let pot = self
            .state
            .pots
            .settle_pot(&pot_id, winner_claims, IdempotencyKey::new(idempotency_key), now_ms())
            .await
            .map_err(map_error)?;
        Ok(pot_to_rpc(pot))
    }

    async fn cancel_pot(&self, table_id: String, hand_id: String, reason: String) -> RpcResult<RpcPot> {
        let _ = reason;
        let pot_id = PotId::new(&table_id, &hand_id);
        let pot = self.state.pots.cancel_pot(&pot_id, now_ms()).await.map_err(map_error)?;
        Ok(pot_to_rpc(pot))
    }
}
