//! Confidence threshold check: does the model confidence attached to trades
//! actually predict outcomes, and is the threshold system filtering?

use crate::checks::{result_from_store_error, CheckResult, StageId, Status};
use crate::config::AuditConfig;
use crate::store::{AuditStore, TradeRecord};

/// Left-inclusive, right-exclusive partition of [0, 1). A confidence of
/// exactly 1.0 lands in the top bucket.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceBucket {
    pub lower: f64,
    pub upper: f64,
    pub label: &'static str,
}

pub const BUCKETS: [ConfidenceBucket; 4] = [
    ConfidenceBucket { lower: 0.0, upper: 0.5, label: "low" },
    ConfidenceBucket { lower: 0.5, upper: 0.7, label: "medium" },
    ConfidenceBucket { lower: 0.7, upper: 0.85, label: "high" },
    ConfidenceBucket { lower: 0.85, upper: 1.0, label: "very_high" },
];

/// Total over all finite scores: values below the partition clamp to the
/// first bucket, values at or above 1.0 to the last.
pub fn bucket_index(score: f64) -> usize {
    for (i, b) in BUCKETS.iter().enumerate() {
        if score >= b.lower && score < b.upper {
            return i;
        }
    }
    if score < BUCKETS[0].lower {
        0
    } else {
        BUCKETS.len() - 1
    }
}

#[derive(Debug, Default, Clone)]
struct BucketStats {
    trades: u64,
    wins: u64,
    profit_sum: f64,
    profit_n: u64,
    confidence_sum: f64,
}

impl BucketStats {
    fn win_rate(&self) -> Option<f64> {
        if self.trades == 0 {
            None
        } else {
            Some(self.wins as f64 / self.trades as f64)
        }
    }
}

pub fn check_confidence_system(cfg: &AuditConfig, store: &AuditStore, now: i64) -> CheckResult {
    let since = now - cfg.confidence_window_secs;
    let trades = match store.trades_with_confidence_since(since) {
        Ok(rows) => rows,
        Err(e) => return result_from_store_error(StageId::TradeFiltering, &e),
    };

    if trades.is_empty() {
        let mut r = CheckResult::new(StageId::TradeFiltering, Status::Missing)
            .with_detail("no confidence-tagged trades in window");
        r.put_num("trades_with_confidence", 0.0);
        r.put_flag("threshold_system_active", false);
        r.put_flag("filtering_active", false);
        return r;
    }

    let mut r = CheckResult::new(StageId::TradeFiltering, Status::Healthy);
    r.put_num("trades_with_confidence", trades.len() as f64);
    r.put_flag("threshold_system_active", true);

    let low_confidence =
        trades.iter().filter(|t| t.confidence.map(|c| c < 0.3).unwrap_or(false)).count();
    let low_share = low_confidence as f64 / trades.len() as f64;
    r.put_num("low_confidence_share", low_share);
    r.put_flag("trades_filtered_by_confidence", low_share < 0.1);

    let stats = bucket_stats(&trades);
    for (bucket, s) in BUCKETS.iter().zip(stats.iter()) {
        if s.trades == 0 {
            continue;
        }
        r.put_num(&format!("bucket_{}_trades", bucket.label), s.trades as f64);
        if let Some(rate) = s.win_rate() {
            r.put_num(&format!("bucket_{}_win_rate", bucket.label), rate);
        }
        if s.profit_n > 0 {
            r.put_num(
                &format!("bucket_{}_avg_profit", bucket.label),
                s.profit_sum / s.profit_n as f64,
            );
        }
        r.put_num(
            &format!("bucket_{}_avg_confidence", bucket.label),
            s.confidence_sum / s.trades as f64,
        );
    }

    let working = monotonic_improvement(&stats);
    r.put_flag("confidence_system_working", working);

    r.put_flag("dynamic_threshold_adjustment", dynamic_adjustment(cfg, store, now));

    // Trade-filtering pipeline stage: trades passing the 0.5 floor recently.
    let recent_since = now - cfg.pipeline_window_secs;
    let recent: Vec<&TradeRecord> = trades
        .iter()
        .filter(|t| t.ts > recent_since && t.confidence.map(|c| c >= 0.5).unwrap_or(false))
        .collect();
    r.put_flag("filtering_active", !recent.is_empty());
    r.put_num("filtered_trades_recent", recent.len() as f64);
    if !recent.is_empty() {
        let mean_conf = recent.iter().filter_map(|t| t.confidence).sum::<f64>() / recent.len() as f64;
        r.put_num("mean_confidence_recent", mean_conf);
    }

    if !working {
        r.status = Status::Degraded;
        r = r.with_detail("confidence does not predict outcomes across buckets");
    }
    r
}

fn bucket_stats(trades: &[TradeRecord]) -> [BucketStats; 4] {
    let mut stats: [BucketStats; 4] = Default::default();
    for trade in trades {
        let conf = match trade.confidence {
            Some(c) if c.is_finite() => c,
            _ => continue,
        };
        let s = &mut stats[bucket_index(conf)];
        s.trades += 1;
        s.confidence_sum += conf;
        if let Some(p) = trade.profit {
            s.profit_n += 1;
            s.profit_sum += p;
            if p > 0.0 {
                s.wins += 1;
            }
        }
    }
    stats
}

/// The system "works" iff the highest occupied bucket's win rate strictly
/// exceeds the lowest occupied bucket's, with at least one trade in each.
fn monotonic_improvement(stats: &[BucketStats; 4]) -> bool {
    let lowest = stats.iter().find(|s| s.trades > 0).and_then(|s| s.win_rate());
    let highest = stats.iter().rev().find(|s| s.trades > 0).and_then(|s| s.win_rate());
    match (lowest, highest) {
        (Some(lo), Some(hi)) => hi > lo,
        _ => false,
    }
}

/// True iff any model carries more than one distinct threshold setting in
/// the history window.
fn dynamic_adjustment(cfg: &AuditConfig, store: &AuditStore, now: i64) -> bool {
    let since = now - cfg.threshold_history_window_secs;
    let history = match store.threshold_history_since(since) {
        Ok(rows) => rows,
        Err(_) => return false,
    };
    let mut by_model: std::collections::BTreeMap<&str, Vec<f64>> = Default::default();
    for change in &history {
        by_model.entry(change.model.as_str()).or_default().push(change.confidence_threshold);
    }
    by_model.values_mut().any(|values| {
        values.sort_by(|a, b| a.total_cmp(b));
        values.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        values.len() > 1
    })
}
