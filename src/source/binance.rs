use crate::source::{parse_price, FetchError, PriceSource};
use crate::types::{PriceSeries, ProviderKind, Symbol};
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Binance spot klines (1m candles).
pub struct BinanceSource {
    http: reqwest::Client,
    base_url: String,
    interval: String,
}

impl BinanceSource {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            interval: "1m".to_string(),
        }
    }

    fn klines_url(&self, symbol: &Symbol, limit: usize) -> Result<url::Url, FetchError> {
        let base = format!("{}/api/v3/klines", self.base_url.trim_end_matches('/'));
        let limit = limit.to_string();
        url::Url::parse_with_params(
            &base,
            &[
                ("symbol", symbol.0.as_str()),
                ("interval", self.interval.as_str()),
                ("limit", limit.as_str()),
            ],
        )
        .map_err(|e| FetchError::Malformed(format!("klines url: {e}")))
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CryptoExchange
    }

    async fn fetch(&self, symbol: &Symbol, limit: usize) -> Result<PriceSeries, FetchError> {
        let url = self.klines_url(symbol, limit)?;
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // Binance still sends {"code":..,"msg":..} on 4xx.
            let body: Option<Value> = resp.json().await.ok();
            if let Some(msg) = body.as_ref().and_then(|b| b.get("msg")).and_then(|m| m.as_str()) {
                return Err(FetchError::Upstream(msg.to_string()));
            }
            return Err(FetchError::Status(status.as_u16()));
        }
        let body: Value = resp.json().await?;
        parse_klines(&body)
    }
}

/// Extract close prices (element 4 of every kline row). Binance returns rows oldest first.
pub fn parse_klines(body: &Value) -> Result<PriceSeries, FetchError> {
    if let Some(msg) = body.get("msg").and_then(|m| m.as_str()) {
        return Err(FetchError::Upstream(msg.to_string()));
    }
    let rows = body
        .as_array()
        .ok_or_else(|| FetchError::Malformed("klines: expected array".into()))?;
    let closes = rows
        .iter()
        .map(|row| {
            let close = row
                .get(4)
                .ok_or_else(|| FetchError::Malformed("kline row missing close".into()))?;
            parse_price(close)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PriceSeries::from_oldest_first(closes))
}
