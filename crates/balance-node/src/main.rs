//! balance-node — the balance service binary.
//!
//! Startup sequence:
//!   1. Open the store (in-memory, or Redis when `--redis-url` is set and
//!      this binary is built with the `redis-backend` feature)
//!   2. Construct the keyed mutex and the three engines sharing it
//!   3. Spawn the reservation-expiry and ledger-verification background jobs
//!   4. Start the JSON-RPC server
//!   5. Block until a shutdown signal arrives

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use balance_core::AccountId;
use balance_engine::{AccountingEngine, PotEngine, ReservationEngine};
use balance_jobs::{LedgerVerificationJob, ReservationExpiryJob};
use balance_rpc::{RpcServer, RpcServerState};
use balance_store::{KeyedMutex, MemoryStore, Store};

#[derive(Parser, Debug)]
#[command(
    name = "balance-node",
    version,
    about = "Balance service — transactional accounting, reservations, and pot settlement for the poker platform"
)]
struct Args {
    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:3002")]
    rpc_addr: SocketAddr,

    /// Redis connection URL. Requires this binary be built with the
    /// `redis-backend` feature; falls back to the in-memory store when
    /// absent.
    #[arg(long)]
    redis_url: Option<String>,

    /// Default reservation hold TTL, milliseconds.
    #[arg(long, default_value_t = balance_core::DEFAULT_RESERVATION_TIMEOUT_MS)]
    reservation_timeout_ms: i64,

    /// Idempotency record TTL, milliseconds.
    #[arg(long, default_value_t = balance_core::DEFAULT_IDEMPOTENCY_TTL_MS)]
    idempotency_ttl_ms: i64,

    /// Poll interval for the reservation-expiry job, milliseconds.
    #[arg(long, default_value_t = balance_core::DEFAULT_RESERVATION_EXPIRY_INTERVAL_MS)]
    reservation_expiry_interval_ms: u64,

    /// Poll interval for the ledger-verification job, milliseconds.
    #[arg(long, default_value_t = balance_core::DEFAULT_LEDGER_VERIFICATION_INTERVAL_MS)]
    ledger_verification_interval_ms: u64,

    /// House account credited with rake.
    #[arg(long, default_value = "house")]
    house_account_id: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,balance=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("balance-node starting");

    // ── Store ─────────────────────────────────────────────────────────────────
    let store: Arc<dyn Store> = open_store(args.redis_url.as_deref()).await?;

    // ── Engines ───────────────────────────────────────────────────────────────
    let mutex = Arc::new(KeyedMutex::new());
    let accounting = Arc::new(AccountingEngine::new(
        store.clone(),
        mutex.clone(),
        args.idempotency_ttl_ms,
    ));
    let reservations = Arc::new(ReservationEngine::new(
        store.clone(),
        mutex.clone(),
        accounting.clone(),
        args.reservation_timeout_ms,
        args.idempotency_ttl_ms,
    ));
    let pots = Arc::new(PotEngine::new(
        store.clone(),
        mutex.clone(),
        accounting.clone(),
        AccountId::new(args.house_account_id),
        args.idempotency_ttl_ms,
    ));

    // ── Background jobs ──────────────────────────────────────────────────────
    let expiry_job = Arc::new(ReservationExpiryJob::new(reservations.clone()));
    let _expiry_handle = expiry_job.spawn(Duration::from_millis(args.reservation_expiry_interval_ms));

    let verification_job = Arc::new(LedgerVerificationJob::new(store.clone()));
    let _verification_handle =
        verification_job.spawn(Duration::from_millis(args.ledger_verification_interval_ms));

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        accounting,
        reservations,
        pots,
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    info!(addr = %args.rpc_addr, "balance-node ready");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received");
    rpc_handle.stop().ok();
    rpc_handle.stopped().await;

    Ok(())
}

#[cfg(feature = "redis-backend")]
async fn open_store(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn Store>> {
    match redis_url {
        Some(url) => {
            info!("connecting to Redis store");
            let store = balance_store::RedisStore::connect(url)
                .await
                .context("connecting to Redis")?;
            Ok(Arc::new(store))
        }
        None => {
            info!("no --redis-url given — using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(not(feature = "redis-backend"))]
async fn open_store(redis_url: Option<&str>) -> anyhow::Result<Arc<dyn Store>> {
    if redis_url.is_some() {
        anyhow::bail!("--redis-url given but this binary was not built with the redis-backend feature");
    }
    info!("using in-memory store");
    Ok(Arc::new(MemoryStore::new()))
}
