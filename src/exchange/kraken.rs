use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::now_ts;
use crate::exchange::{flat_pair, Snapshot, SnapshotProvider};

pub struct Kraken {
    client: Client,
    base: String,
}

impl Kraken {
    pub fn new(base: String) -> Self {
        Self { client: Client::new(), base }
    }

    fn to_kraken_pair(symbol: &str) -> String {
        let flat = flat_pair(symbol);
        if flat.starts_with("BTC") {
            flat.replacen("BTC", "XBT", 1)
        } else {
            flat
        }
    }
}

#[derive(Deserialize, Debug)]
struct KrakenResp {
    #[serde(default)]
    error: Vec<String>,
    result: Option<HashMap<String, KrakenTicker>>,
}

/// Ticker arrays: a = ask [price, whole, lot], b = bid, c = last trade
/// [price, lot], v = volume [today, 24h].
#[derive(Deserialize, Debug)]
struct KrakenTicker {
    a: Vec<String>,
    b: Vec<String>,
    c: Vec<String>,
    v: Vec<String>,
}

fn first(field: &str, values: &[String]) -> Result<f64> {
    values
        .first()
        .ok_or_else(|| anyhow!("kraken: empty {}", field))?
        .parse::<f64>()
        .map_err(|e| anyhow!("kraken: bad {}: {}", field, e))
}

#[async_trait::async_trait]
impl SnapshotProvider for Kraken {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let pair = Self::to_kraken_pair(symbol);
        let url = format!("{}/0/public/Ticker?pair={}", self.base, pair);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let body: KrakenResp = resp.json().await?;
        if !body.error.is_empty() {
            return Err(anyhow!("kraken error: {:?}", body.error));
        }
        let ticker = body
            .result
            .and_then(|r| r.into_values().next())
            .ok_or_else(|| anyhow!("kraken: no ticker for {}", pair))?;
        let volume = ticker.v.get(1).or_else(|| ticker.v.first()).cloned().unwrap_or_default();
        Ok(Snapshot {
            last: first("c", &ticker.c)?,
            bid: first("b", &ticker.b)?,
            ask: first("a", &ticker.a)?,
            base_volume: volume.parse().unwrap_or(0.0),
            ts: now_ts(),
        })
    }
}
