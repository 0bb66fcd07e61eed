use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque recipient handle (a Telegram chat id in production).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which upstream data provider an asset's prices come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    CryptoExchange,
    Forex,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Display name shown to users and used as the selection key ("Bitcoin").
    pub name: String,
    pub symbol: Symbol,
    pub provider: ProviderKind,
}

impl Asset {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            name: name.into(),
            symbol: Symbol(symbol.into()),
            provider,
        }
    }
}

/// Closing prices ordered oldest -> newest.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    closes: Vec<f64>,
}

impl PriceSeries {
    pub fn from_oldest_first(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    /// Build a series from a newest-first feed, keeping only the newest `limit` samples.
    pub fn from_newest_first(mut closes: Vec<f64>, limit: usize) -> Self {
        closes.truncate(limit);
        closes.reverse();
        Self { closes }
    }

    /// Keep only the newest `limit` samples.
    pub fn tail(mut self, limit: usize) -> Self {
        if self.closes.len() > limit {
            self.closes.drain(..self.closes.len() - limit);
        }
        self
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    /// Indicator sits between its thresholds (RSI only).
    Neutral,
}

/// Indicator value attached to a directional signal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub label: &'static str,
    pub value: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Signal {
    InsufficientData,
    Directional {
        direction: Direction,
        reading: Option<Reading>,
    },
}

impl Signal {
    pub fn up() -> Self {
        Signal::Directional {
            direction: Direction::Up,
            reading: None,
        }
    }

    pub fn down() -> Self {
        Signal::Directional {
            direction: Direction::Down,
            reading: None,
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::InsufficientData => None,
            Signal::Directional { direction, .. } => Some(*direction),
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Signal::InsufficientData)
    }
}
