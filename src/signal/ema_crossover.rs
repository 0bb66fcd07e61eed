//! Fast/slow EMA crossover.
//!
//! - Up:   EMA(fast) > EMA(slow) at the newest sample.
//! - Down: otherwise (ties included).

use crate::signal::{ema, SignalStrategy};
use crate::types::Signal;

#[derive(Clone, Debug, PartialEq)]
pub struct EmaCrossover {
    /// Fast EMA span (default 5).
    pub fast: usize,
    /// Slow EMA span (default 20).
    pub slow: usize,
}

impl Default for EmaCrossover {
    fn default() -> Self {
        Self { fast: 5, slow: 20 }
    }
}

impl SignalStrategy for EmaCrossover {
    fn name(&self) -> &'static str {
        "ema_crossover"
    }

    fn classify(&self, closes: &[f64]) -> Signal {
        let fast = ema(closes, self.fast);
        let slow = ema(closes, self.slow);
        match (fast.last(), slow.last()) {
            (Some(f), Some(s)) if f > s => Signal::up(),
            (Some(_), Some(_)) => Signal::down(),
            _ => Signal::InsufficientData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalEngine;
    use crate::types::{Direction, PriceSeries};

    fn linear_series(start: f64, step: f64, n: usize) -> PriceSeries {
        PriceSeries::from_oldest_first((0..n).map(|i| start + (i as f64) * step).collect())
    }

    #[test]
    fn rising_series_is_up() {
        let engine = SignalEngine::new(Box::new(EmaCrossover::default()));
        assert_eq!(engine.derive(&linear_series(100.0, 0.5, 50)), Signal::up());
    }

    #[test]
    fn falling_series_is_down() {
        let engine = SignalEngine::new(Box::new(EmaCrossover::default()));
        assert_eq!(engine.derive(&linear_series(100.0, -0.5, 50)), Signal::down());
    }

    #[test]
    fn flat_series_falls_through_to_down() {
        let engine = SignalEngine::new(Box::new(EmaCrossover::default()));
        let flat = PriceSeries::from_oldest_first(vec![1.2345; 30]);
        assert_eq!(engine.derive(&flat).direction(), Some(Direction::Down));
    }

    #[test]
    fn reversal_flips_the_signal() {
        // Long climb followed by a sharp drop: the fast EMA reacts first.
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        closes.extend((0..6).map(|i| 135.0 - (i as f64) * 6.0));
        let engine = SignalEngine::new(Box::new(EmaCrossover::default()));
        assert_eq!(
            engine.derive(&PriceSeries::from_oldest_first(closes)),
            Signal::down()
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let closes: Vec<f64> = (0..50)
            .map(|i| 100.0 + ((i * 7919) % 13) as f64 - 6.0)
            .collect();
        let series = PriceSeries::from_oldest_first(closes);
        let engine = SignalEngine::default();
        let first = engine.derive(&series);
        for _ in 0..10 {
            assert_eq!(engine.derive(&series), first);
        }
    }
}
