//! Config file check: do the bot's configuration documents exist and parse?

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use crate::checks::{CheckResult, StageId, Status};
use crate::config::AuditConfig;

/// JSON keys that matter for the ML subsystem.
const INTEREST_KEYS: [&str; 5] =
    ["ml_config", "models", "confidence_threshold", "training", "features"];

/// Substrings marking an env var as ML-related.
const ENV_TERMS: [&str; 4] = ["ml", "model", "confidence", "threshold"];

enum SourceState {
    Parsed { interest_keys: usize },
    Absent,
    Malformed(String),
}

pub fn check_config_files(cfg: &AuditConfig) -> CheckResult {
    let expected = cfg.expected_config_files();
    let mut states: BTreeMap<String, SourceState> = BTreeMap::new();

    for path in &expected {
        let name = basename(path);
        let state = match std::fs::read_to_string(path) {
            Err(_) => SourceState::Absent,
            Ok(text) if name == ".env" => SourceState::Parsed { interest_keys: env_interest_keys(&text) },
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(doc) => SourceState::Parsed { interest_keys: json_interest_keys(&doc) },
                Err(e) => SourceState::Malformed(e.to_string()),
            },
        };
        states.insert(name, state);
    }

    let parsed = states.values().filter(|s| matches!(s, SourceState::Parsed { .. })).count();
    let absent: Vec<&str> = states
        .iter()
        .filter(|(_, s)| matches!(s, SourceState::Absent))
        .map(|(n, _)| n.as_str())
        .collect();
    let failed: Vec<&str> = states
        .iter()
        .filter(|(_, s)| matches!(s, SourceState::Malformed(_)))
        .map(|(n, _)| n.as_str())
        .collect();

    // Healthy iff every expected source parses; Missing iff none exist on
    // disk; anything in between is Degraded. A malformed file never aborts
    // the inspection of the others.
    let status = if parsed == states.len() {
        Status::Healthy
    } else if absent.len() == states.len() {
        Status::Missing
    } else {
        Status::Degraded
    };

    let mut result = CheckResult::new(StageId::Config, status);
    result.put_num("sources_expected", states.len() as f64);
    result.put_num("sources_parsed", parsed as f64);
    result.put_num("sources_missing", absent.len() as f64);
    result.put_num("sources_failed", failed.len() as f64);
    if !absent.is_empty() {
        result.put_text("missing_sources", absent.join(", "));
    }
    if !failed.is_empty() {
        result.put_text("failed_sources", failed.join(", "));
    }

    let mut interest_total = 0usize;
    for (name, state) in &states {
        match state {
            SourceState::Parsed { interest_keys } => {
                interest_total += interest_keys;
                result.put_text(&format!("source:{}", name), "parsed");
            }
            SourceState::Absent => result.put_text(&format!("source:{}", name), "not_found"),
            SourceState::Malformed(e) => {
                result.put_text(&format!("source:{}", name), format!("parse_error: {}", e))
            }
        }
    }
    result.put_num("interest_keys", interest_total as f64);
    result
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

fn json_interest_keys(doc: &Value) -> usize {
    match doc.as_object() {
        Some(map) => INTEREST_KEYS.iter().filter(|k| map.contains_key(**k)).count(),
        None => 0,
    }
}

/// Count ML-related vars in a flat key=value file; comments and blank lines
/// are skipped.
fn env_interest_keys(text: &str) -> usize {
    text.lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            trimmed.split_once('=').map(|(k, _)| k.trim().to_lowercase())
        })
        .filter(|key| ENV_TERMS.iter().any(|t| key.contains(t)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn cfg_for(dir: &TempDir) -> AuditConfig {
        let mut cfg = AuditConfig::from_env();
        cfg.config_dir = dir.path().display().to_string();
        cfg
    }

    #[test]
    fn all_sources_absent_is_missing() {
        let dir = TempDir::new().unwrap();
        let r = check_config_files(&cfg_for(&dir));
        assert_eq!(r.status, Status::Missing);
        assert_eq!(r.num("sources_missing"), Some(5.0));
    }

    #[test]
    fn malformed_source_degrades_without_aborting_others() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{\"models\": []}").unwrap();
        fs::write(dir.path().join("ml_config.json"), "{not json").unwrap();
        let r = check_config_files(&cfg_for(&dir));
        assert_eq!(r.status, Status::Degraded);
        assert_eq!(r.num("sources_parsed"), Some(1.0));
        assert_eq!(r.num("sources_failed"), Some(1.0));
        assert!(r.text("source:ml_config.json").unwrap().starts_with("parse_error"));
        assert_eq!(r.text("source:config.json"), Some("parsed"));
    }

    #[test]
    fn full_set_parses_healthy_and_counts_interest_keys() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("config.json"), "{\"models\": [], \"training\": {}}").unwrap();
        fs::write(dir.path().join("ml_config.json"), "{\"confidence_threshold\": 0.6}").unwrap();
        fs::write(dir.path().join("trading_config.json"), "{}").unwrap();
        fs::write(dir.path().join("settings.json"), "{\"features\": [\"spread\"]}").unwrap();
        fs::write(dir.path().join(".env"), "# comment\nML_THRESHOLD=0.5\nDB_PATH=x\n").unwrap();
        let r = check_config_files(&cfg_for(&dir));
        assert_eq!(r.status, Status::Healthy);
        assert_eq!(r.num("sources_parsed"), Some(5.0));
        assert_eq!(r.num("interest_keys"), Some(5.0));
    }
}
