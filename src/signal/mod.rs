//! Signal layer: pure transforms from a close series to a directional call.
//!
//! Every strategy sits behind [`SignalEngine`], which owns the minimum-length
//! precondition so no indicator ever runs on a too-short series.

use crate::types::{PriceSeries, Signal};

pub mod ema_crossover;
pub mod rsi;

pub use ema_crossover::EmaCrossover;
pub use rsi::Rsi;

/// Series shorter than this always yield [`Signal::InsufficientData`].
pub const MIN_SAMPLES: usize = 20;

pub trait SignalStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Classify a series of at least [`MIN_SAMPLES`] closes, oldest first.
    fn classify(&self, closes: &[f64]) -> Signal;
}

pub struct SignalEngine {
    strategy: Box<dyn SignalStrategy>,
}

impl SignalEngine {
    pub fn new(strategy: Box<dyn SignalStrategy>) -> Self {
        Self { strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn derive(&self, series: &PriceSeries) -> Signal {
        if series.len() < MIN_SAMPLES {
            return Signal::InsufficientData;
        }
        self.strategy.classify(series.closes())
    }
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(Box::new(EmaCrossover::default()))
    }
}

/// Recursive EMA seeded with the first sample, `alpha = 2 / (span + 1)`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let Some((&first, rest)) = values.split_first() else {
        return vec![];
    };
    let k = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    out.push(first);
    let mut prev = first;
    for &p in rest {
        prev = p * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}
