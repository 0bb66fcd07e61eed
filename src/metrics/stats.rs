use crate::cycle::{CycleReport, Outcome};
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastCounters {
    pub cycles: u64,
    pub coalesced_ticks: u64,
    pub delivered: u64,
    pub skipped: u64,
    pub fetch_failures: u64,
    pub delivery_failures: u64,
}

impl BroadcastCounters {
    pub fn attempted(&self) -> u64 {
        self.delivered + self.delivery_failures
    }

    pub fn delivery_rate(&self) -> f64 {
        let denom = self.attempted();
        if denom == 0 {
            return 0.0;
        }
        (self.delivered as f64) / (denom as f64)
    }
}

#[derive(Clone, Debug)]
pub struct Histo {
    /// Milliseconds.
    inner: Histogram<u64>,
}

impl Default for Histo {
    fn default() -> Self {
        Self {
            inner: Histogram::new(3).expect("histo"),
        }
    }
}

impl Histo {
    pub fn record(&mut self, d: Duration) {
        let _ = self.inner.record((d.as_millis() as u64).max(1));
    }

    pub fn p50(&self) -> u64 {
        self.inner.value_at_quantile(0.50)
    }

    pub fn p95(&self) -> u64 {
        self.inner.value_at_quantile(0.95)
    }

    pub fn max(&self) -> u64 {
        self.inner.max()
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }
}

#[derive(Debug, Default)]
struct Inner {
    counters: BroadcastCounters,
    cycle_ms: Histo,
    fetch_ms: Histo,
}

/// Process-lifetime broadcast statistics.
#[derive(Debug, Default)]
pub struct BroadcastStats {
    inner: Mutex<Inner>,
}

impl BroadcastStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_coalesced(&self) {
        self.inner.lock().counters.coalesced_ticks += 1;
    }

    pub fn record_fetch(&self, elapsed: Duration) {
        self.inner.lock().fetch_ms.record(elapsed);
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        let mut inner = self.inner.lock();
        inner.cycle_ms.record(report.elapsed);
        let c = &mut inner.counters;
        c.cycles += 1;
        for (_, outcome) in &report.outcomes {
            match outcome {
                Outcome::Delivered => c.delivered += 1,
                Outcome::Skipped(_) => c.skipped += 1,
                Outcome::FetchFailed(_) => c.fetch_failures += 1,
                Outcome::DeliveryFailed(_) => c.delivery_failures += 1,
            }
        }
    }

    pub fn counters(&self) -> BroadcastCounters {
        self.inner.lock().counters.clone()
    }

    /// Flat key/value summary for operators.
    pub fn snapshot_kv(&self) -> BTreeMap<String, String> {
        let inner = self.inner.lock();
        let c = &inner.counters;
        let mut kv = BTreeMap::new();
        kv.insert("cycles".into(), c.cycles.to_string());
        kv.insert("ticks.coalesced".into(), c.coalesced_ticks.to_string());
        kv.insert("deliveries.ok".into(), c.delivered.to_string());
        kv.insert("deliveries.failed".into(), c.delivery_failures.to_string());
        kv.insert("deliveries.rate".into(), format!("{:.4}", c.delivery_rate()));
        kv.insert("subscribers.skipped".into(), c.skipped.to_string());
        kv.insert("fetch.failed".into(), c.fetch_failures.to_string());
        for (name, h) in [("cycle_ms", &inner.cycle_ms), ("fetch_ms", &inner.fetch_ms)] {
            if h.count() == 0 {
                continue;
            }
            kv.insert(format!("{name}.p50"), h.p50().to_string());
            kv.insert(format!("{name}.p95"), h.p95().to_string());
            kv.insert(format!("{name}.max"), h.max().to_string());
        }
        kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycle::SkipReason;
    use crate::types::SubscriberId;

    #[test]
    fn counts_outcomes_per_cycle() {
        let stats = BroadcastStats::new();
        let report = CycleReport {
            cycle: 1,
            elapsed: Duration::from_millis(40),
            outcomes: vec![
                (SubscriberId(1), Outcome::Delivered),
                (SubscriberId(2), Outcome::Skipped(SkipReason::NoAsset)),
                (SubscriberId(3), Outcome::FetchFailed("timeout".into())),
                (SubscriberId(4), Outcome::DeliveryFailed("blocked".into())),
            ],
        };
        stats.record_cycle(&report);
        stats.record_coalesced();

        let c = stats.counters();
        assert_eq!(c.cycles, 1);
        assert_eq!(c.delivered, 1);
        assert_eq!(c.skipped, 1);
        assert_eq!(c.fetch_failures, 1);
        assert_eq!(c.delivery_failures, 1);
        assert_eq!(c.coalesced_ticks, 1);
        assert_eq!(c.delivery_rate(), 0.5);

        let kv = stats.snapshot_kv();
        assert_eq!(kv["cycle_ms.max"], "40");
        assert!(!kv.contains_key("fetch_ms.p50"));
    }
}
