use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::now_ts;
use crate::exchange::{flat_pair, Snapshot, SnapshotProvider};

pub struct BinanceUs {
    client: Client,
    base: String,
}

impl BinanceUs {
    pub fn new(base: String) -> Self {
        Self { client: Client::new(), base }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    last_price: String,
    bid_price: String,
    ask_price: String,
    volume: String,
    close_time: i64,
}

fn num(field: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>().map_err(|e| anyhow!("binanceus: bad {}: {}", field, e))
}

#[async_trait::async_trait]
impl SnapshotProvider for BinanceUs {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let url = format!("{}/api/v3/ticker/24hr?symbol={}", self.base, flat_pair(symbol));
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let t: Ticker24h = resp.json().await?;
        Ok(Snapshot {
            last: num("lastPrice", &t.last_price)?,
            bid: num("bidPrice", &t.bid_price)?,
            ask: num("askPrice", &t.ask_price)?,
            base_volume: num("volume", &t.volume)?,
            ts: if t.close_time > 0 { t.close_time / 1000 } else { now_ts() },
        })
    }
}
