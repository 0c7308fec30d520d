//! Request/response DTOs for the HTTP JSON surface.
//!
//! These types are the wire shapes an external HTTP gateway would serialize
//! and deserialize against the routes below; this crate defines the shapes
//! only; it does not embed an HTTP router or handler dispatch.
//!
//! | Method | Path | Success |
//! |---|---|---|
//! | GET  | `/api/accounts/:id/balance`       | 200 [`BalanceResponse`] |
//! | POST | `/api/accounts/:id`               | 201/200 [`AccountResponse`] |
//! | POST | `/api/accounts/:id/deposit`        | 200 [`TransactionResponse`] |
//! | POST | `/api/accounts/:id/withdraw`       | 200 [`TransactionResponse`] |
//! | GET  | `/api/accounts/:id/transactions`   | 200 [`TransactionListResponse`] |
//! | GET  | `/api/accounts/:id/ledger`         | 200 [`LedgerResponse`] |
//! | GET  | `/api/health`                      | 200 [`HealthResponse`] |
//! | GET  | `/api/ready`                       | 200 [`ReadyResponse`] |

use serde::{Deserialize, Serialize};

/// `GET /api/accounts/:id/balance` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account_id: String,
    pub balance: u64,
    pub available_balance: u64,
    pub currency: String,
    pub version: u64,
}

/// `POST /api/accounts/:id` request body. An absent `initial_balance`
/// defaults to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_balance: Option<u64>,
}

/// `POST /api/accounts/:id` response, also used as the created/existing
/// account shape elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account_id: String,
    pub balance: u64,
    pub available_balance: u64,
    pub currency: String,
    pub version: u64,
    pub created: bool,
}

/// Deposit source, required on every `POST /api/accounts/:id/deposit`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositSource {
    Freeroll,
    Purchase,
    Admin,
    Bonus,
    Referral,
}

/// `POST /api/accounts/:id/deposit` request body. Requires the
/// `Idempotency-Key` header, carried separately from this body by the
/// gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: u64,
    pub source: DepositSource,
}

/// `POST /api/accounts/:id/withdraw` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared transaction response shape returned by deposit and withdraw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: u64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub status: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

/// `GET /api/accounts/:id/transactions` query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    #[serde(rename = "type")]
    pub tx_type: Option<String>,
}

/// `GET /api/accounts/:id/transactions` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionListResponse {
    pub transactions: Vec<TransactionResponse>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// `GET /api/accounts/:id/ledger` query parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<u32>,
    pub from: Option<i64>,
    pub to: Option<i64>,
}

/// A single ledger chain entry as exposed over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntryResponse {
    pub entry_id: String,
    pub transaction_id: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub amount: i64,
    pub balance_before: u64,
    pub balance_after: u64,
    pub timestamp: i64,
    pub sequence: u64,
    pub previous_checksum: String,
    pub checksum: String,
}

/// `GET /api/accounts/:id/ledger` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerResponse {
    pub entries: Vec<LedgerEntryResponse>,
    pub total: u64,
    pub latest_checksum: String,
}

/// `GET /api/health` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub redis: String,
}

/// `GET /api/ready` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub ready: bool,
}

/// Error envelope shared by every 400/404 JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}
