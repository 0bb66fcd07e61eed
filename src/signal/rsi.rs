//! Relative Strength Index with Wilder smoothing.
//!
//! Thresholds follow the broadcast convention: RSI above `upper` is a buy (Up),
//! below `lower` a sell (Down), anything in between carries no direction.

use crate::signal::SignalStrategy;
use crate::types::{Direction, Reading, Signal};

#[derive(Clone, Debug, PartialEq)]
pub struct Rsi {
    pub period: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Default for Rsi {
    fn default() -> Self {
        Self {
            period: 14,
            lower: 30.0,
            upper: 70.0,
        }
    }
}

impl Rsi {
    /// Latest RSI value, or `None` when there are not `period + 1` closes.
    pub fn value(&self, closes: &[f64]) -> Option<f64> {
        let period = self.period;
        if period == 0 || closes.len() <= period {
            return None;
        }

        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let (seed, rest) = deltas.split_at(period);

        let mut avg_gain = seed.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
        let mut avg_loss = seed.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
        let n = period as f64;
        for d in rest {
            avg_gain = (avg_gain * (n - 1.0) + d.max(0.0)) / n;
            avg_loss = (avg_loss * (n - 1.0) + (-d).max(0.0)) / n;
        }

        let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
            50.0
        } else if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
        rsi.is_finite().then_some(rsi)
    }
}

impl SignalStrategy for Rsi {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn classify(&self, closes: &[f64]) -> Signal {
        let Some(value) = self.value(closes) else {
            return Signal::InsufficientData;
        };
        let direction = if value < self.lower {
            Direction::Down
        } else if value > self.upper {
            Direction::Up
        } else {
            Direction::Neutral
        };
        Signal::Directional {
            direction,
            reading: Some(Reading { label: "RSI", value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_moves_saturate() {
        let rsi = Rsi::default();
        let up: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        let down: Vec<f64> = (0..30).map(|i| 40.0 - i as f64).collect();
        assert_eq!(rsi.value(&up), Some(100.0));
        assert_eq!(rsi.value(&down), Some(0.0));
        assert_eq!(rsi.classify(&up).direction(), Some(Direction::Up));
        assert_eq!(rsi.classify(&down).direction(), Some(Direction::Down));
    }

    #[test]
    fn alternating_series_is_neutral() {
        let rsi = Rsi::default();
        let closes: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect();
        let signal = rsi.classify(&closes);
        assert_eq!(signal.direction(), Some(Direction::Neutral));
        match signal {
            Signal::Directional { reading: Some(r), .. } => {
                assert_eq!(r.label, "RSI");
                assert!((r.value - 50.0).abs() < 5.0, "rsi={}", r.value);
            }
            other => panic!("unexpected signal {other:?}"),
        }
    }

    #[test]
    fn flat_series_reads_fifty() {
        assert_eq!(Rsi::default().value(&[5.0; 20]), Some(50.0));
    }

    #[test]
    fn needs_period_plus_one_closes() {
        let rsi = Rsi::default();
        assert_eq!(rsi.value(&[1.0; 14]), None);
        assert!(rsi.value(&[1.0; 15]).is_some());
    }
}
