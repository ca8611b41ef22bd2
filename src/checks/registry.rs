//! Model registry check: are models configured, active, and trained?
//!
//! Also owns the training-recency stage of the pipeline, since both read the
//! same registry table.

use crate::checks::{mean_std, result_from_store_error, CheckResult, StageId, Status};
use crate::config::AuditConfig;
use crate::store::AuditStore;

pub fn check_model_registry(cfg: &AuditConfig, store: &AuditStore, now: i64) -> CheckResult {
    let models = match store.models() {
        Ok(rows) => rows,
        Err(e) => return result_from_store_error(StageId::Training, &e),
    };

    let mut result = CheckResult::new(StageId::Training, Status::Healthy);
    let configured = models.len() as f64;
    let active = models.iter().filter(|m| m.is_active).count() as f64;
    let trained = models.iter().filter(|m| m.last_trained.is_some()).count() as f64;
    result.put_num("models_configured", configured);
    result.put_num("active_models", active);
    result.put_num("trained_models", trained);

    if models.is_empty() {
        result.status = Status::Missing;
        return result.with_detail("model registry has no rows");
    }

    let accuracies: Vec<f64> = models.iter().filter_map(|m| m.accuracy).collect();
    if let Some((mean, _)) = mean_std(&accuracies) {
        result.put_num("accuracy_mean", mean);
    }

    let thresholds: Vec<f64> = models.iter().filter_map(|m| m.confidence_threshold).collect();
    if let Some((mean, std)) = mean_std(&thresholds) {
        let min = thresholds.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = thresholds.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        result.put_num("threshold_min", min);
        result.put_num("threshold_max", max);
        result.put_num("threshold_mean", mean);
        result.put_num("threshold_std", std);
        result.put_flag(
            "proper_range",
            thresholds
                .iter()
                .all(|t| (cfg.threshold_range_low..=cfg.threshold_range_high).contains(t)),
        );
    }

    // Training-recency stage: registry rows trained inside the window.
    let since = now - cfg.training_window_secs;
    let recent = models
        .iter()
        .filter(|m| m.last_trained.map(|ts| ts > since).unwrap_or(false))
        .count() as f64;
    result.put_num("recently_trained", recent);
    result.put_flag("training_active", recent > 0.0);
    if let Some(latest) = models.iter().filter_map(|m| m.last_trained).max() {
        result.put_num("latest_training", latest as f64);
        result.put_num("hours_since_training", (now - latest).max(0) as f64 / 3600.0);
    }

    if active < 3.0 || trained < configured {
        result.status = Status::Degraded;
        result = result.with_detail("registry present but under-active or under-trained");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    const DAY: i64 = 86_400;

    fn store_with_models(rows: &str) -> AuditStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE ml_models (
                name TEXT, model_type TEXT, accuracy REAL,
                confidence_threshold REAL, is_active INTEGER,
                last_trained INTEGER, training_samples INTEGER
            );
            {}",
            rows
        ))
        .unwrap();
        AuditStore::from_connection(conn)
    }

    #[test]
    fn empty_registry_is_missing() {
        let store = store_with_models("");
        let r = check_model_registry(&test_cfg(), &store, 100 * DAY);
        assert_eq!(r.status, Status::Missing);
        assert_eq!(r.num("models_configured"), Some(0.0));
    }

    #[test]
    fn under_active_registry_is_degraded() {
        let now = 100 * DAY;
        let store = store_with_models(&format!(
            "INSERT INTO ml_models VALUES ('a', 'gbt', 0.7, 0.6, 1, {}, 1000);
             INSERT INTO ml_models VALUES ('b', 'gbt', 0.6, 0.7, 0, NULL, NULL);",
            now - DAY
        ));
        let r = check_model_registry(&test_cfg(), &store, now);
        assert_eq!(r.status, Status::Degraded);
        assert_eq!(r.num("active_models"), Some(1.0));
        assert_eq!(r.flag("training_active"), Some(true));
    }

    #[test]
    fn healthy_registry_reports_threshold_stats() {
        let now = 100 * DAY;
        let rows: String = ["0.55", "0.65", "0.70", "0.80", "0.90"]
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "INSERT INTO ml_models VALUES ('m{}', 'gbt', 0.7, {}, 1, {}, 1000);",
                    i,
                    t,
                    now - DAY
                )
            })
            .collect();
        let store = store_with_models(&rows);
        let r = check_model_registry(&test_cfg(), &store, now);
        assert_eq!(r.status, Status::Healthy);
        assert_eq!(r.num("threshold_min"), Some(0.55));
        assert_eq!(r.num("threshold_max"), Some(0.90));
        assert!(r.num("threshold_std").unwrap() > 0.05);
        assert_eq!(r.flag("proper_range"), Some(true));
        assert_eq!(r.num("recently_trained"), Some(5.0));
    }

    #[test]
    fn threshold_outside_band_flags_improper_range() {
        let now = 100 * DAY;
        let store = store_with_models(&format!(
            "INSERT INTO ml_models VALUES ('a', 'gbt', 0.7, 0.99, 1, {}, 1);
             INSERT INTO ml_models VALUES ('b', 'gbt', 0.7, 0.60, 1, {}, 1);
             INSERT INTO ml_models VALUES ('c', 'gbt', 0.7, 0.70, 1, {}, 1);",
            now - DAY,
            now - DAY,
            now - DAY
        ));
        let r = check_model_registry(&test_cfg(), &store, now);
        assert_eq!(r.flag("proper_range"), Some(false));
    }

    fn test_cfg() -> AuditConfig {
        AuditConfig::from_env()
    }
}
