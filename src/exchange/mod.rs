//! Live exchange snapshot providers.
//!
//! Public ticker endpoints only; the audit never authenticates and never
//! places orders. Each connector is an independent failure domain.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::AuditConfig;

mod binanceus;
mod cryptocom;
mod kraken;

/// Most recent top-of-book view for one symbol on one exchange.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub last: f64,
    pub bid: f64,
    pub ask: f64,
    pub base_volume: f64,
    pub ts: i64,
}

impl Snapshot {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread_pct(&self) -> f64 {
        if self.last > 0.0 {
            (self.ask - self.bid) / self.last * 100.0
        } else {
            0.0
        }
    }
}

#[async_trait]
pub trait SnapshotProvider {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot>;
}

#[derive(Clone, Copy, Debug)]
pub enum ExchangeKind {
    Kraken,
    BinanceUs,
    CryptoCom,
}

impl ExchangeKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "kraken" => Some(ExchangeKind::Kraken),
            "binanceus" => Some(ExchangeKind::BinanceUs),
            "cryptocom" => Some(ExchangeKind::CryptoCom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Kraken => "kraken",
            ExchangeKind::BinanceUs => "binanceus",
            ExchangeKind::CryptoCom => "cryptocom",
        }
    }

    pub fn build(self, cfg: &AuditConfig) -> Box<dyn SnapshotProvider + Send + Sync> {
        match self {
            ExchangeKind::Kraken => Box::new(kraken::Kraken::new(cfg.kraken_base.clone())),
            ExchangeKind::BinanceUs => {
                Box::new(binanceus::BinanceUs::new(cfg.binanceus_base.clone()))
            }
            ExchangeKind::CryptoCom => {
                Box::new(cryptocom::CryptoCom::new(cfg.cryptocom_base.clone()))
            }
        }
    }
}

/// Providers from `AUDIT_EXCHANGES` (comma-separated), default full trio.
/// Unknown names are skipped.
pub fn providers_from_env(
    cfg: &AuditConfig,
) -> Vec<(String, Box<dyn SnapshotProvider + Send + Sync>)> {
    let list = std::env::var("AUDIT_EXCHANGES")
        .unwrap_or_else(|_| "kraken,binanceus,cryptocom".to_string());
    list.split(',')
        .filter_map(ExchangeKind::parse)
        .map(|kind| (kind.as_str().to_string(), kind.build(cfg)))
        .collect()
}

/// "DOGE/USDT" → "DOGEUSDT" for venues that use bare concatenated pairs.
pub(crate) fn flat_pair(symbol: &str) -> String {
    symbol.replace('/', "")
}
