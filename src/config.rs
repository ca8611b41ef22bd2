/// Audit configuration, env-driven with defaults matching the bot's layout.
///
/// Tolerance values (sync threshold, variation band, freshness window) are
/// policy constants tuned against observed exchange behavior; they are kept
/// configurable rather than hard-coded.
#[derive(Clone, Debug)]
pub struct AuditConfig {
    /// Path to the bot's SQLite database (opened read-only).
    pub db_path: String,
    /// Directory holding the bot's configuration files.
    pub config_dir: String,
    /// Symbol used for the live-vs-stored consistency check.
    pub symbol: String,
    /// Window for "recent" pipeline activity, seconds.
    pub pipeline_window_secs: i64,
    /// Window for "recent" model training, seconds.
    pub training_window_secs: i64,
    /// Window for confidence-tagged trade analysis, seconds.
    pub confidence_window_secs: i64,
    /// Window for threshold-history diversity, seconds.
    pub threshold_history_window_secs: i64,
    /// Window for stored snapshots in the consistency check, seconds.
    pub consistency_window_secs: i64,
    /// Ingestion data older than this is not considered fresh, minutes.
    pub freshness_max_minutes: f64,
    /// Acceptable band for the price variation coefficient (std / mean).
    pub variation_low: f64,
    pub variation_high: f64,
    /// Live vs stored mid-price divergence below this is "synchronized", percent.
    pub sync_tolerance_pct: f64,
    /// Confidence thresholds are expected to sit inside this range.
    pub threshold_range_low: f64,
    pub threshold_range_high: f64,
    /// Per-exchange snapshot fetch timeout, seconds.
    pub fetch_timeout_secs: u64,
    /// Optional path for the structured run log (stderr when unset).
    pub log_path: Option<String>,
    pub kraken_base: String,
    pub binanceus_base: String,
    pub cryptocom_base: String,
}

impl AuditConfig {
    pub fn from_env() -> Self {
        Self {
            db_path: std::env::var("AUDIT_DB").unwrap_or_else(|_| "./memebot.db".to_string()),
            config_dir: std::env::var("AUDIT_CONFIG_DIR").unwrap_or_else(|_| ".".to_string()),
            symbol: std::env::var("AUDIT_SYMBOL").unwrap_or_else(|_| "DOGE/USDT".to_string()),
            pipeline_window_secs: env_i64("AUDIT_PIPELINE_WINDOW_SECS", 86_400),
            training_window_secs: env_i64("AUDIT_TRAINING_WINDOW_SECS", 7 * 86_400),
            confidence_window_secs: env_i64("AUDIT_CONFIDENCE_WINDOW_SECS", 7 * 86_400),
            threshold_history_window_secs: env_i64("AUDIT_THRESHOLD_HISTORY_SECS", 30 * 86_400),
            consistency_window_secs: env_i64("AUDIT_CONSISTENCY_WINDOW_SECS", 600),
            freshness_max_minutes: env_f64("AUDIT_FRESHNESS_MAX_MIN", 30.0),
            variation_low: env_f64("AUDIT_VARIATION_LOW", 0.001),
            variation_high: env_f64("AUDIT_VARIATION_HIGH", 0.1),
            sync_tolerance_pct: env_f64("AUDIT_SYNC_TOLERANCE_PCT", 5.0),
            threshold_range_low: env_f64("AUDIT_THRESHOLD_LOW", 0.5),
            threshold_range_high: env_f64("AUDIT_THRESHOLD_HIGH", 0.95),
            fetch_timeout_secs: env_i64("AUDIT_FETCH_TIMEOUT_SECS", 10) as u64,
            log_path: std::env::var("AUDIT_LOG").ok(),
            kraken_base: std::env::var("KRAKEN_BASE")
                .unwrap_or_else(|_| "https://api.kraken.com".to_string()),
            binanceus_base: std::env::var("BINANCEUS_BASE")
                .unwrap_or_else(|_| "https://api.binance.us".to_string()),
            cryptocom_base: std::env::var("CRYPTOCOM_BASE")
                .unwrap_or_else(|_| "https://api.crypto.com".to_string()),
        }
    }

    /// Config files the bot is expected to carry, in report order.
    pub fn expected_config_files(&self) -> Vec<String> {
        let names = ["config.json", "ml_config.json", "trading_config.json", ".env", "settings.json"];
        names.iter().map(|n| format!("{}/{}", self.config_dir.trim_end_matches('/'), n)).collect()
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

pub fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}
