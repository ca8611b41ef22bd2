//! Runs every check in a fixed order and owns the resulting report.
//!
//! A check never aborts the run: failures are encoded as `Failed` results
//! and the remaining checks still execute. The report is built once, then
//! only read.

use serde::Serialize;

use crate::checks::config_files::check_config_files;
use crate::checks::confidence::check_confidence_system;
use crate::checks::consistency::{check_live_consistency, Providers};
use crate::checks::pipeline::check_pipeline;
use crate::checks::registry::check_model_registry;
use crate::checks::{CheckResult, StageId};
use crate::config::{now_ts, AuditConfig};
use crate::context::{v_num, v_str, RunContext};
use crate::scoring::{score, ScoreCard};
use crate::store::AuditStore;

#[derive(Debug, Serialize)]
pub struct VerificationReport {
    pub run_id: String,
    pub ran_at: i64,
    results: Vec<CheckResult>,
}

impl VerificationReport {
    /// Assemble a report from prebuilt results (stage order expected).
    pub fn from_results(run_id: String, ran_at: i64, results: Vec<CheckResult>) -> Self {
        Self { run_id, ran_at, results }
    }

    pub fn get(&self, stage: StageId) -> Option<&CheckResult> {
        self.results.iter().find(|r| r.stage == stage)
    }

    /// Results in stage order.
    pub fn results(&self) -> &[CheckResult] {
        &self.results
    }

    /// Pipeline stages with no recent activity, in pipeline order.
    pub fn inactive_stages(&self) -> Vec<&'static str> {
        let probes: [(StageId, &str); 5] = [
            (StageId::Ingestion, "active"),
            (StageId::FeatureEngineering, "active"),
            (StageId::Training, "training_active"),
            (StageId::Prediction, "active"),
            (StageId::TradeFiltering, "filtering_active"),
        ];
        probes
            .iter()
            .filter(|(stage, flag)| {
                !self.get(*stage).and_then(|r| r.flag(flag)).unwrap_or(false)
            })
            .map(|(stage, _)| stage.as_str())
            .collect()
    }

    pub fn active_stage_count(&self) -> usize {
        5 - self.inactive_stages().len()
    }
}

/// Run the full check sequence against the store (and live exchanges, when
/// providers are configured). Always completes with a report and scorecard.
pub async fn run_audit(
    cfg: &AuditConfig,
    ctx: &RunContext,
    store: &AuditStore,
    providers: &Providers,
) -> (VerificationReport, ScoreCard) {
    run_audit_at(cfg, ctx, store, providers, now_ts()).await
}

/// As `run_audit`, with an explicit reference time for the freshness windows.
pub async fn run_audit_at(
    cfg: &AuditConfig,
    ctx: &RunContext,
    store: &AuditStore,
    providers: &Providers,
    now: i64,
) -> (VerificationReport, ScoreCard) {
    ctx.log(
        "audit",
        &[
            ("event", v_str("run_start")),
            ("db", v_str(&cfg.db_path)),
            ("symbol", v_str(&cfg.symbol)),
            ("exchanges", v_num(providers.len() as f64)),
        ],
    );

    let config = check_config_files(cfg);
    let pipeline = check_pipeline(cfg, store, now);
    let training = check_model_registry(cfg, store, now);
    let filtering = check_confidence_system(cfg, store, now);
    let live = check_live_consistency(cfg, ctx, store, providers, now).await;

    let results = vec![
        config,
        pipeline.ingestion,
        pipeline.features,
        training,
        pipeline.prediction,
        filtering,
        live,
    ];
    for result in &results {
        ctx.log(
            "check",
            &[
                ("stage", v_str(result.stage.as_str())),
                ("status", v_str(result.status.as_str())),
                ("metrics", v_num(result.metrics.len() as f64)),
            ],
        );
    }

    let report = VerificationReport { run_id: ctx.run_id.clone(), ran_at: now, results };
    ctx.log(
        "pipeline",
        &[
            ("active_stages", v_num(report.active_stage_count() as f64)),
            ("inactive", v_str(&report.inactive_stages().join(","))),
        ],
    );

    let card = score(&report);
    ctx.log(
        "verdict",
        &[
            ("total", v_num(card.total as f64)),
            ("band", v_str(card.verdict.as_str())),
            ("recommendations", v_num(card.recommendations.len() as f64)),
        ],
    );
    (report, card)
}
