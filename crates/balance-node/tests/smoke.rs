//! End-to-end smoke test for balance-node.
//!
//! Starts a real node process against the in-memory store, drives it
//! through the JSON-RPC surface, and asserts the pot/accounting state
//! changes are correctly reflected.
//!
//! Run with:
//!   cargo test -p balance-node --test smoke

use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

struct NodeGuard {
    child: Child,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

async fn rpc_call(client: &reqwest::Client, url: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": format!("balance_{method}"),
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "balance_ensureAccount",
        "params": {"account_id": "readiness-probe"},
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn smoke_record_contribution_settle_pot_pays_winner_and_house() {
    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{rpc_port}");

    let node_bin = env!("CARGO_BIN_EXE_balance-node");
    let child = Command::new(node_bin)
        .args(["--rpc-addr", &format!("127.0.0.1:{rpc_port}"), "--house-account-id", "house"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn balance-node");
    let _guard = NodeGuard { child };

    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(10)).await,
        "balance-node did not become ready within 10 seconds"
    );

    rpc_call(&http, &rpc_url, "ensureAccount", serde_json::json!({"account_id": "winner-1"})).await;
    rpc_call(&http, &rpc_url, "ensureAccount", serde_json::json!({"account_id": "loser-1"})).await;
    rpc_call(&http, &rpc_url, "ensureAccount", serde_json::json!({"account_id": "house"})).await;

    rpc_call(
        &http,
        &rpc_url,
        "recordContribution",
        serde_json::json!({
            "table_id": "table-1",
            "hand_id": "hand-1",
            "seat_id": "seat-1",
            "account_id": "winner-1",
            "amount": 100,
            "contribution_type": "BET",
            "idempotency_key": "contrib-1",
        }),
    )
    .await;
    rpc_call(
        &http,
        &rpc_url,
        "recordContribution",
        serde_json::json!({
            "table_id": "table-1",
            "hand_id": "hand-1",
            "seat_id": "seat-2",
            "account_id": "loser-1",
            "amount": 100,
            "contribution_type": "BET",
            "idempotency_key": "contrib-2",
        }),
    )
    .await;

    let settled = rpc_call(
        &http,
        &rpc_url,
        "settlePot",
        serde_json::json!({
            "table_id": "table-1",
            "hand_id": "hand-1",
            "winners": [{"seat_id": "seat-1", "account_id": "winner-1", "amount": 1}],
            "idempotency_key": "settle-1",
        }),
    )
    .await;
    assert_eq!(settled["status"], "Settled");

    let winner_balance = rpc_call(&http, &rpc_url, "getBalance", serde_json::json!({"account_id": "winner-1"})).await;
    assert_eq!(winner_balance["available_balance"], 195);

    let house_balance = rpc_call(&http, &rpc_url, "getBalance", serde_json::json!({"account_id": "house"})).await;
    assert_eq!(house_balance["available_balance"], 5);
}
