use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;

use crate::config::now_ts;
use crate::exchange::{Snapshot, SnapshotProvider};

pub struct CryptoCom {
    client: Client,
    base: String,
}

impl CryptoCom {
    pub fn new(base: String) -> Self {
        Self { client: Client::new(), base }
    }

    /// "DOGE/USDT" → "DOGE_USDT".
    fn instrument(symbol: &str) -> String {
        symbol.replace('/', "_")
    }
}

#[derive(Deserialize, Debug)]
struct TickerResp {
    code: i64,
    result: Option<TickerResult>,
}

#[derive(Deserialize, Debug)]
struct TickerResult {
    data: TickerData,
}

/// v2 ticker fields: a = last trade, b = best bid, k = best ask,
/// v = 24h volume, t = timestamp ms.
#[derive(Deserialize, Debug)]
struct TickerData {
    a: Option<f64>,
    b: Option<f64>,
    k: Option<f64>,
    v: Option<f64>,
    t: Option<i64>,
}

#[async_trait::async_trait]
impl SnapshotProvider for CryptoCom {
    async fn fetch_snapshot(&self, symbol: &str) -> Result<Snapshot> {
        let name = Self::instrument(symbol);
        let url = format!("{}/v2/public/get-ticker?instrument_name={}", self.base, name);
        let resp = self.client.get(&url).send().await?.error_for_status()?;
        let body: TickerResp = resp.json().await?;
        if body.code != 0 {
            return Err(anyhow!("cryptocom error code {}", body.code));
        }
        let data = body.result.ok_or_else(|| anyhow!("cryptocom: no ticker for {}", name))?.data;
        let last = data.a.ok_or_else(|| anyhow!("cryptocom: missing last"))?;
        let bid = data.b.ok_or_else(|| anyhow!("cryptocom: missing bid"))?;
        let ask = data.k.ok_or_else(|| anyhow!("cryptocom: missing ask"))?;
        Ok(Snapshot {
            last,
            bid,
            ask,
            base_volume: data.v.unwrap_or(0.0),
            ts: data.t.map(|ms| ms / 1000).unwrap_or_else(now_ts),
        })
    }
}
