use crate::types::{Asset, PriceSeries, ProviderKind, Symbol};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub mod alpha_vantage;
pub mod binance;
pub mod sim;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("no price source for {0:?}")]
    Unsupported(ProviderKind),
}

/// One upstream provider of recent close prices.
#[async_trait]
pub trait PriceSource: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Up to `limit` most recent closes, oldest first.
    async fn fetch(&self, symbol: &Symbol, limit: usize) -> Result<PriceSeries, FetchError>;
}

/// Routes fetches to the source registered for an asset's provider kind and
/// bounds every call with a hard timeout.
pub struct PriceRouter {
    sources: HashMap<ProviderKind, Arc<dyn PriceSource>>,
    timeout: Duration,
}

impl PriceRouter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sources: HashMap::new(),
            timeout,
        }
    }

    /// Registers `source` under its own kind, replacing any previous one.
    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.sources.insert(source.kind(), source);
        self
    }

    /// Registers `source` under an explicit kind (e.g. one simulator for both).
    pub fn with_source_for(mut self, kind: ProviderKind, source: Arc<dyn PriceSource>) -> Self {
        self.sources.insert(kind, source);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn fetch(&self, asset: &Asset, limit: usize) -> Result<PriceSeries, FetchError> {
        let source = self
            .sources
            .get(&asset.provider)
            .ok_or(FetchError::Unsupported(asset.provider))?;
        match tokio::time::timeout(self.timeout, source.fetch(&asset.symbol, limit)).await {
            Ok(res) => res.map(|series| series.tail(limit)),
            Err(_) => Err(FetchError::Timeout(self.timeout)),
        }
    }
}

/// Parse a string- or number-encoded price, rejecting non-finite values.
pub(crate) fn parse_price(v: &serde_json::Value) -> Result<f64, FetchError> {
    let price = match v {
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| FetchError::Malformed(format!("price {s:?}: {e}")))?,
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FetchError::Malformed(format!("price {n}")))?,
        other => return Err(FetchError::Malformed(format!("price {other}"))),
    };
    if !price.is_finite() {
        return Err(FetchError::Malformed(format!("non-finite price {price}")));
    }
    Ok(price)
}
