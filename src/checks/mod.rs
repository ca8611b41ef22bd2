//! Typed results shared by every check.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::store::StoreError;

pub mod config_files;
pub mod confidence;
pub mod consistency;
pub mod pipeline;
pub mod registry;

/// One segment of the ML data pipeline. Fixed, closed set; report order is
/// the declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Config,
    Ingestion,
    FeatureEngineering,
    Training,
    Prediction,
    TradeFiltering,
    LiveConsistency,
}

impl StageId {
    pub const ALL: [StageId; 7] = [
        StageId::Config,
        StageId::Ingestion,
        StageId::FeatureEngineering,
        StageId::Training,
        StageId::Prediction,
        StageId::TradeFiltering,
        StageId::LiveConsistency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Config => "config",
            StageId::Ingestion => "ingestion",
            StageId::FeatureEngineering => "feature_engineering",
            StageId::Training => "training",
            StageId::Prediction => "prediction",
            StageId::TradeFiltering => "trade_filtering",
            StageId::LiveConsistency => "live_consistency",
        }
    }
}

/// Health of one stage.
///
/// `Failed` iff the underlying query raised an unrecoverable error.
/// `Missing` iff the expected source returned zero rows. `Degraded` iff data
/// exists but fails a freshness/quality predicate. `Healthy` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Healthy,
    Degraded,
    Missing,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Healthy => "healthy",
            Status::Degraded => "degraded",
            Status::Missing => "missing",
            Status::Failed => "failed",
        }
    }
}

/// A single named measurement. A metric the check could not compute is
/// simply absent from the map — accessors return `None`, never a default.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Num(f64),
    Flag(bool),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetricValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub stage: StageId,
    pub status: Status,
    pub metrics: BTreeMap<String, MetricValue>,
    pub detail: Option<String>,
}

impl CheckResult {
    pub fn new(stage: StageId, status: Status) -> Self {
        Self { stage, status, metrics: BTreeMap::new(), detail: None }
    }

    pub fn failed(stage: StageId, detail: impl Into<String>) -> Self {
        Self {
            stage,
            status: Status::Failed,
            metrics: BTreeMap::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn put_num(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), MetricValue::Num(value));
    }

    pub fn put_flag(&mut self, name: &str, value: bool) {
        self.metrics.insert(name.to_string(), MetricValue::Flag(value));
    }

    pub fn put_text(&mut self, name: &str, value: impl Into<String>) {
        self.metrics.insert(name.to_string(), MetricValue::Text(value.into()));
    }

    pub fn num(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).and_then(MetricValue::as_f64)
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.metrics.get(name).and_then(MetricValue::as_flag)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.metrics.get(name).and_then(MetricValue::as_text)
    }
}

/// Shared mapping from a store error on a stage's only data source.
pub(crate) fn result_from_store_error(stage: StageId, err: &StoreError) -> CheckResult {
    match err {
        StoreError::SourceMissing(m) => {
            CheckResult::new(stage, Status::Missing).with_detail(m.clone())
        }
        StoreError::Query(m) => CheckResult::failed(stage, m.clone()),
    }
}

/// Mean and standard deviation (population) of a sample; `None` when empty.
pub(crate) fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}
