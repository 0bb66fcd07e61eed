use crate::source::{FetchError, PriceSource};
use crate::types::{PriceSeries, ProviderKind, Symbol};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;

/// Random-walk prices for dry runs without network access.
///
/// Each symbol keeps its own walk so consecutive cycles look continuous.
pub struct SimulatedSource {
    kind: ProviderKind,
    walks: Mutex<HashMap<Symbol, Vec<f64>>>,
    /// Max relative move per sample (e.g. 0.002 = 0.2%).
    step: f64,
}

impl SimulatedSource {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            walks: Mutex::new(HashMap::new()),
            step: 0.002,
        }
    }

    fn seed_price(symbol: &Symbol) -> f64 {
        match symbol.0.as_str() {
            s if s.starts_with("BTC") => 60_000.0,
            s if s.starts_with("ETH") => 3_000.0,
            s if s.ends_with("JPY") => 150.0,
            _ => 1.10,
        }
    }
}

#[async_trait]
impl PriceSource for SimulatedSource {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn fetch(&self, symbol: &Symbol, limit: usize) -> Result<PriceSeries, FetchError> {
        let mut walks = self.walks.lock();
        let walk = walks.entry(symbol.clone()).or_default();
        let mut rng = rand::thread_rng();
        let mut last = walk.last().copied().unwrap_or_else(|| Self::seed_price(symbol));
        // Advance a few samples per fetch, backfilling the first time a symbol is seen.
        let n = if walk.is_empty() { limit } else { 5 };
        for _ in 0..n {
            last *= 1.0 + rng.gen_range(-self.step..=self.step);
            walk.push(last);
        }
        if walk.len() > limit {
            walk.drain(..walk.len() - limit);
        }
        Ok(PriceSeries::from_oldest_first(walk.clone()))
    }
}
