//! balance-rpc
//!
//! JSON-RPC 2.0 server for the balance service, plus the serde DTOs for its
//! HTTP JSON surface.
//!
//! Namespace: "balance". Every mutating method takes an idempotency key and
//! is safe to retry; see `balance_store::IdempotencyCache`.

pub mod api;
pub mod http;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerState};
pub use types::{RpcAccount, RpcContribution, RpcPot, RpcReservation, RpcTransaction, RpcWinnerClaim};
