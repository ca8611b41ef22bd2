//! Live-vs-stored consistency check with stub exchange providers.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rusqlite::Connection;

use mlaudit::checks::consistency::check_live_consistency;
use mlaudit::checks::Status;
use mlaudit::config::AuditConfig;
use mlaudit::context::RunContext;
use mlaudit::exchange::{Snapshot, SnapshotProvider};
use mlaudit::store::AuditStore;

const NOW: i64 = 1_700_000_000;

struct StubExchange {
    snap: Snapshot,
}

#[async_trait]
impl SnapshotProvider for StubExchange {
    async fn fetch_snapshot(&self, _symbol: &str) -> Result<Snapshot> {
        Ok(self.snap)
    }
}

struct BrokenExchange;

#[async_trait]
impl SnapshotProvider for BrokenExchange {
    async fn fetch_snapshot(&self, _symbol: &str) -> Result<Snapshot> {
        bail!("connection refused")
    }
}

fn stub(name: &str, mid: f64) -> (String, Box<dyn SnapshotProvider + Send + Sync>) {
    let snap = Snapshot { last: mid, bid: mid, ask: mid, base_volume: 100.0, ts: NOW };
    (name.to_string(), Box::new(StubExchange { snap }))
}

fn quiet_ctx() -> RunContext {
    RunContext::with_sink(Box::new(std::io::sink()))
}

fn store_with_price(exchange: &str, mid: f64) -> AuditStore {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE price_data (
            ts INTEGER, exchange TEXT, symbol TEXT,
            mid_price REAL, spread_pct REAL, volume_24h REAL
        );
        INSERT INTO price_data VALUES ({}, '{}', 'DOGE/USDT', {}, 0.1, 1000.0);",
        NOW - 60,
        exchange,
        mid
    ))
    .unwrap();
    AuditStore::from_connection(conn)
}

#[tokio::test]
async fn divergence_past_tolerance_is_not_synchronized() {
    let cfg = AuditConfig::from_env();
    let store = store_with_price("stub", 0.1300);
    let providers = vec![stub("stub", 0.1234)];

    let r = check_live_consistency(&cfg, &quiet_ctx(), &store, &providers, NOW).await;

    // |0.1234 - 0.1300| / 0.1300 * 100 = 5.0769..%, over the 5% tolerance
    let diff = r.num("stub_price_diff_pct").unwrap();
    assert!((diff - 5.0769).abs() < 0.001, "diff {}", diff);
    assert_eq!(r.flag("stub_synchronized"), Some(false));
    assert_eq!(r.num("synchronized_exchanges"), Some(0.0));
    assert_eq!(r.status, Status::Degraded);
}

#[tokio::test]
async fn one_broken_exchange_does_not_spoil_the_rest() {
    let cfg = AuditConfig::from_env();
    let store = store_with_price("good", 0.1230);
    let providers: Vec<(String, Box<dyn SnapshotProvider + Send + Sync>)> = vec![
        stub("good", 0.1234),
        ("bad".to_string(), Box::new(BrokenExchange)),
    ];

    let r = check_live_consistency(&cfg, &quiet_ctx(), &store, &providers, NOW).await;

    assert_eq!(r.status, Status::Healthy);
    assert_eq!(r.flag("good_synchronized"), Some(true));
    assert_eq!(r.num("synchronized_exchanges"), Some(1.0));
    assert_eq!(r.num("live_exchanges"), Some(1.0));
    assert!(r.text("live_bad_error").unwrap().contains("connection refused"));
}

#[tokio::test]
async fn no_stored_data_reports_missing() {
    let cfg = AuditConfig::from_env();
    let store = AuditStore::from_connection(Connection::open_in_memory().unwrap());
    let providers = vec![stub("stub", 0.1234)];

    let r = check_live_consistency(&cfg, &quiet_ctx(), &store, &providers, NOW).await;

    assert_eq!(r.status, Status::Missing);
    // the live side still reported before the stored side came up empty
    assert!(r.num("live_stub_mid").is_some());
}

#[tokio::test]
async fn paired_trade_legs_serve_as_stored_mids_when_snapshots_are_absent() {
    let cfg = AuditConfig::from_env();
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!(
        "CREATE TABLE paper_trades (
            ts INTEGER, symbol TEXT, exchange TEXT, profit REAL,
            confidence_score REAL, buy_price REAL, sell_price REAL
        );
        INSERT INTO paper_trades VALUES ({}, 'DOGE/USDT', 'stub', 1.0, 0.8, 0.1232, 0.1236);",
        NOW - 60
    ))
    .unwrap();
    let store = AuditStore::from_connection(conn);
    let providers = vec![stub("stub", 0.1234)];

    let r = check_live_consistency(&cfg, &quiet_ctx(), &store, &providers, NOW).await;

    assert_eq!(r.status, Status::Healthy);
    assert_eq!(r.text("stored_source"), Some("paper_trades"));
    assert_eq!(r.flag("stub_synchronized"), Some(true));
}

#[tokio::test]
async fn no_providers_is_a_skip_not_a_failure() {
    let cfg = AuditConfig::from_env();
    let store = store_with_price("stub", 0.1234);
    let providers: Vec<(String, Box<dyn SnapshotProvider + Send + Sync>)> = Vec::new();

    let r = check_live_consistency(&cfg, &quiet_ctx(), &store, &providers, NOW).await;

    assert_eq!(r.status, Status::Missing);
    assert_eq!(r.num("live_exchanges"), Some(0.0));
}
