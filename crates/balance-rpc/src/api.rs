use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcAccount, RpcPot, RpcReservation, RpcTransaction, RpcWinnerClaim};

/// Balance service JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "balance_" via `namespace = "balance"`.
/// Every method's error is either INVALID_ARGUMENT (malformed input) or one
/// of the domain error codes in the taxonomy (see `server::map_error`); the
/// engines never surface a bare internal error for an expected domain
/// condition like an unknown account or an already-committed reservation.
#[rpc(server, namespace = "balance")]
pub trait BalanceApi {
    /// Return the current balance for an account.
    #[method(name = "getBalance")]
    async fn get_balance(&self, account_id: String) -> RpcResult<RpcAccount>;

    /// Create the account if it does not already exist, seeded with
    /// `initial_balance` (default zero); otherwise return its current state
    /// unchanged.
    #[method(name = "ensureAccount")]
    async fn ensure_account(&self, account_id: String, initial_balance: Option<u64>) -> RpcResult<RpcAccount>;

    /// Place a two-phase hold against `account_id`'s available balance for a
    /// table buy-in. `timeout_seconds` overrides the default reservation TTL
    /// when provided.
    #[method(name = "reserveForBuyIn")]
    async fn reserve_for_buy_in(
        &self,
        account_id: String,
        table_id: String,
        amount: u64,
        idempotency_key: String,
        timeout_seconds: Option<u64>,
    ) -> RpcResult<RpcReservation>;

    /// Turn a HELD reservation into a completed BUY_IN transaction.
    #[method(name = "commitReservation")]
    async fn commit_reservation(&self, reservation_id: String) -> RpcResult<RpcReservation>;

    /// Release a HELD reservation's funds back to the account's available
    /// balance without completing a buy-in.
    #[method(name = "releaseReservation")]
    async fn release_reservation(
        &self,
        reservation_id: String,
        reason: Option<String>,
    ) -> RpcResult<RpcReservation>;

    /// Credit `amount` of cash-out proceeds back into an account after a
    /// seat leaves a table.
    #[method(name = "processCashOut")]
    async fn process_cash_out(
        &self,
        account_id: String,
        table_id: String,
        seat_id: String,
        amount: u64,
        idempotency_key: String,
        hand_id: Option<String>,
    ) -> RpcResult<RpcTransaction>;

    /// Record one seat's contribution toward a hand's pot.
    #[method(name = "recordContribution")]
    async fn record_contribution(
        &self,
        table_id: String,
        hand_id: String,
        seat_id: String,
        account_id: String,
        amount: u64,
        contribution_type: String,
        idempotency_key: String,
    ) -> RpcResult<RpcPot>;

    /// Settle a hand's pot: take rake, split the remainder among `winners`
    /// by their claimed chip amounts, and credit each winner's account.
    #[method(name = "settlePot")]
    async fn settle_pot(
        &self,
        table_id: String,
        hand_id: String,
        winners: Vec<RpcWinnerClaim>,
        idempotency_key: String,
    ) -> RpcResult<RpcPot>;

    /// Cancel an open pot and refund every contributor.
    #[method(name = "cancelPot")]
    async fn cancel_pot(&self, table_id: String, hand_id: String, reason: String) -> RpcResult<RpcPot>;
}
