//! Live-vs-stored consistency check: do live exchange quotes agree with what
//! the bot recently persisted?
//!
//! All exchange fetches are launched before any is awaited; a slow or failed
//! connector only loses its own contribution.

use std::collections::BTreeMap;

use futures_util::future::join_all;
use tokio::time::{timeout, Duration};

use crate::checks::{CheckResult, StageId, Status};
use crate::config::AuditConfig;
use crate::context::{v_num, v_str, RunContext};
use crate::exchange::{Snapshot, SnapshotProvider};
use crate::store::{AuditStore, StoreError};

pub type Providers = [(String, Box<dyn SnapshotProvider + Send + Sync>)];

pub async fn check_live_consistency(
    cfg: &AuditConfig,
    ctx: &RunContext,
    store: &AuditStore,
    providers: &Providers,
    now: i64,
) -> CheckResult {
    if providers.is_empty() {
        let mut r = CheckResult::new(StageId::LiveConsistency, Status::Missing)
            .with_detail("skipped: no exchange providers configured");
        r.put_num("live_exchanges", 0.0);
        return r;
    }

    let live = fetch_all(cfg, providers).await;

    let mut r = CheckResult::new(StageId::LiveConsistency, Status::Healthy);
    r.put_num("live_exchanges", live.iter().filter(|(_, s)| s.is_ok()).count() as f64);
    for (name, snap) in &live {
        match snap {
            Ok(s) => {
                r.put_num(&format!("live_{}_mid", name), s.mid());
                r.put_num(&format!("live_{}_spread_pct", name), s.spread_pct());
                ctx.log(
                    "consistency",
                    &[("exchange", v_str(name)), ("live_mid", v_num(s.mid()))],
                );
            }
            Err(e) => {
                r.put_text(&format!("live_{}_error", name), e.clone());
                ctx.log(
                    "consistency",
                    &[("exchange", v_str(name)), ("error", v_str(e))],
                );
            }
        }
    }

    let stored = match stored_mids(cfg, store, now) {
        Ok((mids, source, rows)) => {
            r.put_num("stored_rows", rows as f64);
            r.put_text("stored_source", source);
            mids
        }
        Err(detail) => {
            r.status = Status::Failed;
            return r.with_detail(detail);
        }
    };

    if stored.is_empty() {
        r.status = Status::Missing;
        return r.with_detail("no stored snapshots for symbol in window");
    }

    let mut synchronized = 0u32;
    for (name, snap) in &live {
        let live_mid = match snap {
            Ok(s) if s.mid() > 0.0 => s.mid(),
            _ => continue,
        };
        let stored_mid = match stored.get(name.as_str()) {
            Some(&m) if m > 0.0 => m,
            _ => continue,
        };
        let diff_pct = (live_mid - stored_mid).abs() / stored_mid * 100.0;
        let in_sync = diff_pct < cfg.sync_tolerance_pct;
        r.put_num(&format!("{}_price_diff_pct", name), diff_pct);
        r.put_flag(&format!("{}_synchronized", name), in_sync);
        if in_sync {
            synchronized += 1;
        }
    }
    r.put_num("synchronized_exchanges", synchronized as f64);

    if synchronized == 0 {
        r.status = Status::Degraded;
        r = r.with_detail("stored data present but no exchange within tolerance");
    }
    r
}

/// One non-blocking fetch per exchange, all awaited together. A connector
/// past the timeout is recorded as its own failure, never cancelling peers.
async fn fetch_all(cfg: &AuditConfig, providers: &Providers) -> Vec<(String, Result<Snapshot, String>)> {
    let deadline = Duration::from_secs(cfg.fetch_timeout_secs);
    let fetches = providers.iter().map(|(name, provider)| async move {
        let outcome = match timeout(deadline, provider.fetch_snapshot(&cfg.symbol)).await {
            Ok(Ok(snap)) => Ok(snap),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timeout after {}s", cfg.fetch_timeout_secs)),
        };
        (name.clone(), outcome)
    });
    join_all(fetches).await
}

/// Latest stored mid-price per exchange for the symbol, newest row wins.
/// Falls back to reconstructing mids from paired buy/sell trade legs when
/// the snapshot table is unavailable.
fn stored_mids(
    cfg: &AuditConfig,
    store: &AuditStore,
    now: i64,
) -> Result<(BTreeMap<String, f64>, &'static str, usize), String> {
    let since = now - cfg.consistency_window_secs;

    let primary_err = match store.prices_for_symbol_since(&cfg.symbol, since) {
        Ok(rows) if !rows.is_empty() => {
            let mut mids = BTreeMap::new();
            for row in &rows {
                if let Some(mid) = row.mid_price {
                    mids.entry(row.exchange.clone()).or_insert(mid);
                }
            }
            return Ok((mids, "price_data", rows.len()));
        }
        Ok(_) => None,
        Err(StoreError::SourceMissing(_)) => None,
        Err(StoreError::Query(m)) => Some(m),
    };

    match store.trades_for_symbol_since(&cfg.symbol, since) {
        Ok(rows) => {
            let mut mids = BTreeMap::new();
            let mut used = 0usize;
            for row in &rows {
                if let (Some(exchange), Some(mid)) = (row.exchange.clone(), row.paired_mid()) {
                    mids.entry(exchange).or_insert(mid);
                    used += 1;
                }
            }
            Ok((mids, "paper_trades", used))
        }
        Err(StoreError::SourceMissing(_)) => Ok((BTreeMap::new(), "none", 0)),
        Err(StoreError::Query(fallback)) => match primary_err {
            Some(primary) => Err(format!("price_data: {}; paper_trades: {}", primary, fallback)),
            None => Ok((BTreeMap::new(), "none", 0)),
        },
    }
}
