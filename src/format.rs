use crate::types::{Asset, Direction, Signal};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct FormatterConfig {
    pub title: String,
    /// How far ahead of "now" the suggested entry time lies.
    pub entry_offset: Duration,
    pub timeframes: Vec<String>,
    /// Zone the entry time is rendered in.
    pub timezone: Tz,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            title: "📊 Trading signal".to_string(),
            entry_offset: Duration::from_secs(120),
            timeframes: vec!["1m".into(), "2m".into(), "5m".into()],
            timezone: chrono_tz::Europe::Rome,
        }
    }
}

/// Renders signals into the fixed-shape broadcast text.
#[derive(Clone, Debug, Default)]
pub struct MessageFormatter {
    cfg: FormatterConfig,
}

impl MessageFormatter {
    pub fn new(cfg: FormatterConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.cfg
    }

    pub fn format(&self, asset: &Asset, signal: &Signal, now: DateTime<Utc>) -> String {
        format!(
            "{}\nAsset: {}\nDirection: {}\nEntry time: {}\nTimeframe: {}",
            self.cfg.title,
            asset.name,
            signal_label(signal),
            self.entry_time(now),
            self.cfg.timeframes.join(" | "),
        )
    }

    /// `now + entry_offset` as `HH:MM` in the configured zone.
    pub fn entry_time(&self, now: DateTime<Utc>) -> String {
        let offset = chrono::Duration::from_std(self.cfg.entry_offset)
            .unwrap_or_else(|_| chrono::Duration::zero());
        (now + offset)
            .with_timezone(&self.cfg.timezone)
            .format("%H:%M")
            .to_string()
    }
}

pub fn signal_label(signal: &Signal) -> String {
    match signal {
        Signal::InsufficientData => "⏳ Insufficient data".to_string(),
        Signal::Directional { direction, reading } => {
            let base = match direction {
                Direction::Up => "📈 UP",
                Direction::Down => "📉 DOWN",
                Direction::Neutral => "⏸ NO SIGNAL",
            };
            match reading {
                Some(r) => format!("{base} ({} {:.1})", r.label, r.value),
                None => base.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderKind, Reading};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn utc_cfg() -> FormatterConfig {
        FormatterConfig {
            timezone: chrono_tz::UTC,
            ..Default::default()
        }
    }

    #[test]
    fn renders_fixed_block() {
        let fmt = MessageFormatter::new(utc_cfg());
        let asset = Asset::new("Bitcoin", "BTCUSDT", ProviderKind::CryptoExchange);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 58, 30).unwrap();
        let text = fmt.format(&asset, &Signal::up(), now);
        assert_eq!(
            text,
            "📊 Trading signal\nAsset: Bitcoin\nDirection: 📈 UP\nEntry time: 13:00\nTimeframe: 1m | 2m | 5m"
        );
    }

    #[test]
    fn entry_time_uses_configured_zone() {
        let fmt = MessageFormatter::default();
        // 23:59 UTC in winter is 00:59 in Rome; +2 minutes -> 01:01.
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 0).unwrap();
        assert_eq!(fmt.entry_time(now), "01:01");
    }

    #[test]
    fn labels_cover_every_signal() {
        assert_eq!(signal_label(&Signal::InsufficientData), "⏳ Insufficient data");
        assert_eq!(signal_label(&Signal::down()), "📉 DOWN");
        let rsi = Signal::Directional {
            direction: Direction::Neutral,
            reading: Some(Reading { label: "RSI", value: 48.26 }),
        };
        assert_eq!(signal_label(&rsi), "⏸ NO SIGNAL (RSI 48.3)");
    }
}
