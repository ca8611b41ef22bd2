//! Scoring and verdict engine.
//!
//! Four components, each capped at 25 points, summed to a 0-100 authenticity
//! score. A check that failed contributes zero, never a gap — the total is
//! always defined. Recommendations come from a fixed rule table evaluated in
//! declaration order.

use serde::Serialize;

use crate::checks::StageId;
use crate::orchestrator::VerificationReport;

pub const COMPONENT_MAX: u8 = 25;

/// Thresholds under each rule gap condition.
const MIN_ACTIVE_MODELS: f64 = 3.0;
const MIN_THRESHOLD_DIVERSITY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    ModelActivity,
    RealDataUsage,
    PredictionPipeline,
    ConfidenceSystem,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Component::ModelActivity,
        Component::RealDataUsage,
        Component::PredictionPipeline,
        Component::ConfidenceSystem,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::ModelActivity => "model_activity",
            Component::RealDataUsage => "real_data_usage",
            Component::PredictionPipeline => "prediction_pipeline",
            Component::ConfidenceSystem => "confidence_system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Excellent,
    Good,
    Partial,
    Critical,
}

impl Verdict {
    pub fn from_total(total: u8) -> Self {
        match total {
            80..=u8::MAX => Verdict::Excellent,
            60..=79 => Verdict::Good,
            40..=59 => Verdict::Partial,
            _ => Verdict::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Excellent => "excellent",
            Verdict::Good => "good",
            Verdict::Partial => "partial",
            Verdict::Critical => "critical",
        }
    }

    pub fn headline(&self) -> &'static str {
        match self {
            Verdict::Excellent => "EXCELLENT: ML system is using real exchange data",
            Verdict::Good => "GOOD: ML system mostly functional with real data",
            Verdict::Partial => "PARTIAL: Some ML functionality but verification issues",
            Verdict::Critical => "CRITICAL: ML system not properly connected to real data",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Verdict::Excellent => "Ready for production deployment with confidence.",
            Verdict::Good => "Minor improvements needed before full production.",
            Verdict::Partial => "Significant fixes needed before production deployment.",
            Verdict::Critical => "Major fixes required - system may be using simulated data.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreCard {
    pub component_scores: Vec<(Component, u8)>,
    pub total: u8,
    pub verdict: Verdict,
    pub recommendations: Vec<String>,
}

impl ScoreCard {
    pub fn component(&self, which: Component) -> u8 {
        self.component_scores
            .iter()
            .find(|(c, _)| *c == which)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }
}

pub fn score(report: &VerificationReport) -> ScoreCard {
    let component_scores: Vec<(Component, u8)> = Component::ALL
        .iter()
        .map(|c| (*c, component_score(*c, report)))
        .collect();
    let total = component_scores.iter().map(|(_, v)| *v).sum();
    ScoreCard {
        component_scores,
        total,
        verdict: Verdict::from_total(total),
        recommendations: recommendations(report),
    }
}

fn component_score(component: Component, report: &VerificationReport) -> u8 {
    match component {
        Component::ModelActivity => {
            let training = report.get(StageId::Training);
            let active = training.and_then(|r| r.num("active_models")).unwrap_or(0.0);
            let configured = training.and_then(|r| r.num("models_configured")).unwrap_or(0.0);
            if active >= MIN_ACTIVE_MODELS {
                25
            } else if configured > 0.0 {
                15
            } else {
                0
            }
        }
        Component::RealDataUsage => {
            let ingestion = report.get(StageId::Ingestion);
            let fresh = ingestion.and_then(|r| r.flag("data_fresh")).unwrap_or(false);
            let realistic =
                ingestion.and_then(|r| r.flag("realistic_variation")).unwrap_or(false);
            let rows = ingestion.and_then(|r| r.num("rows_recent")).unwrap_or(0.0);
            if fresh && realistic {
                25
            } else if rows > 0.0 {
                15
            } else {
                0
            }
        }
        Component::PredictionPipeline => {
            let found = report
                .get(StageId::Prediction)
                .and_then(|r| r.flag("predictions_found"))
                .unwrap_or(false);
            if found {
                25
            } else {
                0
            }
        }
        Component::ConfidenceSystem => {
            let filtering = report.get(StageId::TradeFiltering);
            let working =
                filtering.and_then(|r| r.flag("confidence_system_working")).unwrap_or(false);
            let active =
                filtering.and_then(|r| r.flag("threshold_system_active")).unwrap_or(false);
            if working {
                25
            } else if active {
                15
            } else {
                0
            }
        }
    }
}

/// Rule table. Order here is report order.
const RULES: [fn(&VerificationReport) -> Option<String>; 8] = [
    rule_active_models,
    rule_training_coverage,
    rule_threshold_diversity,
    rule_threshold_range,
    rule_inactive_stages,
    rule_dynamic_thresholds,
    rule_confidence_filtering,
    rule_missing_configs,
];

pub fn recommendations(report: &VerificationReport) -> Vec<String> {
    RULES.iter().filter_map(|rule| rule(report)).collect()
}

fn rule_active_models(report: &VerificationReport) -> Option<String> {
    let active =
        report.get(StageId::Training).and_then(|r| r.num("active_models")).unwrap_or(0.0);
    (active < MIN_ACTIVE_MODELS)
        .then(|| "Activate more ML models (target: 5-8 models for ensemble)".to_string())
}

fn rule_training_coverage(report: &VerificationReport) -> Option<String> {
    let training = report.get(StageId::Training)?;
    let trained = training.num("trained_models").unwrap_or(0.0);
    let configured = training.num("models_configured").unwrap_or(0.0);
    (trained < configured).then(|| "Train all configured models with recent data".to_string())
}

fn rule_threshold_diversity(report: &VerificationReport) -> Option<String> {
    let diversity =
        report.get(StageId::Training).and_then(|r| r.num("threshold_std")).unwrap_or(0.0);
    (diversity < MIN_THRESHOLD_DIVERSITY)
        .then(|| "Increase confidence threshold diversity between models".to_string())
}

fn rule_threshold_range(report: &VerificationReport) -> Option<String> {
    let proper =
        report.get(StageId::Training).and_then(|r| r.flag("proper_range")).unwrap_or(true);
    (!proper).then(|| "Adjust confidence thresholds to the optimal range (0.50-0.95)".to_string())
}

fn rule_inactive_stages(report: &VerificationReport) -> Option<String> {
    let inactive = report.inactive_stages();
    (!inactive.is_empty())
        .then(|| format!("Fix inactive pipeline stages: {}", inactive.join(", ")))
}

fn rule_dynamic_thresholds(report: &VerificationReport) -> Option<String> {
    let dynamic = report
        .get(StageId::TradeFiltering)
        .and_then(|r| r.flag("dynamic_threshold_adjustment"))
        .unwrap_or(false);
    (!dynamic)
        .then(|| "Implement dynamic threshold adjustment based on performance".to_string())
}

fn rule_confidence_filtering(report: &VerificationReport) -> Option<String> {
    let filtered = report
        .get(StageId::TradeFiltering)
        .and_then(|r| r.flag("trades_filtered_by_confidence"))
        .unwrap_or(false);
    (!filtered)
        .then(|| "Strengthen confidence filtering to reject low-quality trades".to_string())
}

fn rule_missing_configs(report: &VerificationReport) -> Option<String> {
    let missing = report.get(StageId::Config).and_then(|r| r.text("missing_sources"))?;
    Some(format!("Create missing configuration files: {}", missing))
}
