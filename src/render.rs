//! Plain-text report rendering. Purely presentational.

use std::fmt::Write;

use crate::checks::{CheckResult, MetricValue};
use crate::orchestrator::VerificationReport;
use crate::scoring::ScoreCard;

const RULE: &str = "============================================================";
const SUBRULE: &str = "------------------------------";

pub fn render(report: &VerificationReport, card: &ScoreCard) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ML MODELS & REAL DATA VERIFICATION REPORT");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "run: {}  at: {}", report.run_id, report.ran_at);

    for (i, result) in report.results().iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}. {} [{}]",
            i + 1,
            title(result),
            result.status.as_str().to_uppercase()
        );
        let _ = writeln!(out, "{}", SUBRULE);
        if let Some(detail) = &result.detail {
            let _ = writeln!(out, "   {}", detail);
        }
        for (name, value) in &result.metrics {
            let _ = writeln!(out, "   {}: {}", name, fmt_metric(value));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "FINAL VERDICT");
    let _ = writeln!(out, "{}", RULE);
    for (component, points) in &card.component_scores {
        let _ = writeln!(out, "   {}: {}/25", component.as_str(), points);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "AUTHENTICITY SCORE: {}/100", card.total);
    let _ = writeln!(out, "{}", card.verdict.headline());
    let _ = writeln!(out, "Recommendation: {}", card.verdict.advice());

    if !card.recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "SUGGESTED FIXES");
        for (i, rec) in card.recommendations.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, rec);
        }
    }
    out
}

fn title(result: &CheckResult) -> String {
    result.stage.as_str().replace('_', " ").to_uppercase()
}

fn fmt_metric(value: &MetricValue) -> String {
    match value {
        MetricValue::Num(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        MetricValue::Num(n) => format!("{:.4}", n),
        MetricValue::Flag(b) => b.to_string(),
        MetricValue::Text(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::{CheckResult, StageId, Status};
    use crate::orchestrator::VerificationReport;
    use crate::scoring::score;

    #[test]
    fn render_includes_every_stage_and_the_verdict() {
        let results: Vec<CheckResult> =
            StageId::ALL.iter().map(|s| CheckResult::new(*s, Status::Missing)).collect();
        let report = VerificationReport::from_results("r1".into(), 42, results);
        let card = score(&report);
        let text = render(&report, &card);
        for stage in StageId::ALL {
            assert!(text.contains(&stage.as_str().replace('_', " ").to_uppercase()));
        }
        assert!(text.contains("AUTHENTICITY SCORE: 0/100"));
        assert!(text.contains("CRITICAL"));
    }
}
