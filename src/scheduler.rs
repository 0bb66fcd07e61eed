//! Periodic broadcast driver.
//!
//! One long-lived loop fires a tick on a fixed interval. Each tick snapshots the
//! registry and runs a cycle: fetch prices once per distinct asset, derive a
//! signal, format it, and deliver it to every subscriber of that asset. Fetch
//! and delivery failures are recorded per subscriber and never escape the cycle.
//!
//! At most one cycle runs at a time; ticks arriving while a cycle is in flight
//! are coalesced (dropped), not queued.

use crate::clock::{Clock, SystemClock};
use crate::cycle::{CycleReport, Outcome, SkipReason};
use crate::delivery::{DeliveryError, DeliverySink};
use crate::format::MessageFormatter;
use crate::metrics::BroadcastStats;
use crate::registry::SubscriberRegistry;
use crate::signal::SignalEngine;
use crate::source::{FetchError, PriceRouter};
use crate::types::{Asset, Signal, SubscriberId};
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::Instrument;

/// What to do with an Insufficient-Data signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsufficientDataPolicy {
    /// Broadcast it like any other signal.
    Send,
    /// Record the subscriber as skipped for this cycle.
    Skip,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub interval: Duration,
    /// Delay before the first tick.
    pub initial_delay: Duration,
    pub send_timeout: Duration,
    /// Closes requested per fetch.
    pub history_limit: usize,
    /// Concurrent fetches (and, separately, sends) within one cycle.
    pub max_concurrency: usize,
    /// How long an in-flight cycle may run after shutdown is signalled.
    pub shutdown_grace: Duration,
    pub insufficient_data: InsufficientDataPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            initial_delay: Duration::from_secs(20),
            send_timeout: Duration::from_secs(10),
            history_limit: 50,
            max_concurrency: 4,
            shutdown_grace: Duration::from_secs(10),
            insufficient_data: InsufficientDataPolicy::Send,
        }
    }
}

/// Floor applied to a zero `interval`.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RunningCycle,
}

pub struct BroadcastScheduler {
    cfg: SchedulerConfig,
    registry: Arc<SubscriberRegistry>,
    prices: Arc<PriceRouter>,
    engine: SignalEngine,
    formatter: MessageFormatter,
    sink: Arc<dyn DeliverySink>,
    clock: Arc<dyn Clock>,
    stats: Arc<BroadcastStats>,

    state: Mutex<SchedulerState>,
    cycles: AtomicU64,
    wake: Notify,
}

/// Returns the scheduler to `Idle` when a cycle ends, including when it is dropped mid-flight.
struct CycleGuard<'a> {
    state: &'a Mutex<SchedulerState>,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock() = SchedulerState::Idle;
    }
}

impl BroadcastScheduler {
    pub fn new(
        cfg: SchedulerConfig,
        registry: Arc<SubscriberRegistry>,
        prices: Arc<PriceRouter>,
        engine: SignalEngine,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            cfg,
            registry,
            prices,
            engine,
            formatter: MessageFormatter::default(),
            sink,
            clock: Arc::new(SystemClock),
            stats: Arc::new(BroadcastStats::new()),
            state: Mutex::new(SchedulerState::Idle),
            cycles: AtomicU64::new(0),
            wake: Notify::new(),
        }
    }

    pub fn with_formatter(mut self, formatter: MessageFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_stats(mut self, stats: Arc<BroadcastStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.cfg
    }

    pub fn stats(&self) -> &Arc<BroadcastStats> {
        &self.stats
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock()
    }

    /// Number of cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Ask the run loop to tick now (also cuts the initial delay short).
    /// Dropped if a cycle is already running.
    pub fn request_tick(&self) {
        if self.state() == SchedulerState::RunningCycle {
            tracing::debug!("tick requested during a running cycle; coalesced");
            self.stats.record_coalesced();
            return;
        }
        self.wake.notify_one();
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_s = self.cfg.interval.as_secs(),
            initial_delay_s = self.cfg.initial_delay.as_secs(),
            strategy = self.engine.strategy_name(),
            "broadcast scheduler started"
        );

        tokio::select! {
            _ = tokio::time::sleep(self.cfg.initial_delay) => {}
            _ = self.wake.notified() => {}
            _ = wait_shutdown(&mut shutdown) => {
                tracing::info!("broadcast scheduler stopped before first tick");
                return;
            }
        }

        let period = if self.cfg.interval.is_zero() {
            tracing::error!(fallback_s = MIN_INTERVAL.as_secs(), "zero broadcast interval; clamping");
            MIN_INTERVAL
        } else {
            self.cfg.interval
        };
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.wake.notified() => {}
                _ = wait_shutdown(&mut shutdown) => break,
            }

            let cycle = self.tick();
            tokio::pin!(cycle);
            let stopping = tokio::select! {
                _ = &mut cycle => false,
                _ = wait_shutdown(&mut shutdown) => true,
            };
            if stopping {
                match tokio::time::timeout(self.cfg.shutdown_grace, &mut cycle).await {
                    Ok(_) => tracing::info!("in-flight cycle finished during shutdown"),
                    Err(_) => tracing::warn!(
                        grace_ms = self.cfg.shutdown_grace.as_millis() as u64,
                        "in-flight cycle abandoned at shutdown"
                    ),
                }
                break;
            }
        }
        tracing::info!("broadcast scheduler stopped");
    }

    /// Run one cycle now, unless one is already running (then `None`).
    pub async fn tick(&self) -> Option<CycleReport> {
        let Some(_guard) = self.begin_cycle() else {
            tracing::info!("previous cycle still running; tick coalesced");
            self.stats.record_coalesced();
            return None;
        };
        Some(self.run_cycle().await)
    }

    fn begin_cycle(&self) -> Option<CycleGuard<'_>> {
        let mut state = self.state.lock();
        if *state == SchedulerState::RunningCycle {
            return None;
        }
        *state = SchedulerState::RunningCycle;
        Some(CycleGuard { state: &self.state })
    }

    async fn run_cycle(&self) -> CycleReport {
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::info_span!("cycle", cycle);
        async move {
            let started = Instant::now();
            let now = self.clock.now();
            let snapshot = self.registry.snapshot();
            let width = self.cfg.max_concurrency.max(1);

            let mut outcomes = Vec::with_capacity(snapshot.len());
            let mut by_asset: HashMap<Asset, Vec<SubscriberId>> = HashMap::new();
            for (id, asset) in snapshot.iter() {
                match asset {
                    Some(asset) => by_asset.entry(asset.clone()).or_default().push(id),
                    None => outcomes.push((id, Outcome::Skipped(SkipReason::NoAsset))),
                }
            }

            let evaluated: Vec<(Asset, Vec<SubscriberId>, Result<Signal, FetchError>)> =
                stream::iter(by_asset)
                    .map(|(asset, ids)| async move {
                        let res = self.evaluate(&asset).await;
                        (asset, ids, res)
                    })
                    .buffer_unordered(width)
                    .collect()
                    .await;

            let mut deliveries: Vec<(SubscriberId, Arc<str>)> = Vec::new();
            for (asset, ids, res) in evaluated {
                match res {
                    Err(e) => {
                        tracing::warn!(
                            asset = %asset.name,
                            symbol = %asset.symbol,
                            subscribers = ids.len(),
                            error = %e,
                            "price fetch failed; subscribers skipped this cycle"
                        );
                        let reason = e.to_string();
                        outcomes.extend(ids.into_iter().map(|id| (id, Outcome::FetchFailed(reason.clone()))));
                    }
                    Ok(signal)
                        if signal.is_insufficient()
                            && self.cfg.insufficient_data == InsufficientDataPolicy::Skip =>
                    {
                        tracing::debug!(asset = %asset.name, "insufficient data; not broadcasting");
                        outcomes.extend(
                            ids.into_iter()
                                .map(|id| (id, Outcome::Skipped(SkipReason::InsufficientData))),
                        );
                    }
                    Ok(signal) => {
                        tracing::debug!(asset = %asset.name, ?signal, "signal derived");
                        let text: Arc<str> = self.formatter.format(&asset, &signal, now).into();
                        deliveries.extend(ids.into_iter().map(|id| (id, text.clone())));
                    }
                }
            }

            let delivered: Vec<(SubscriberId, Outcome)> = stream::iter(deliveries)
                .map(|(id, text)| async move {
                    let outcome = self.deliver(id, &text).await;
                    (id, outcome)
                })
                .buffer_unordered(width)
                .collect()
                .await;
            outcomes.extend(delivered);
            outcomes.sort_by_key(|(id, _)| *id);

            let report = CycleReport {
                cycle,
                elapsed: started.elapsed(),
                outcomes,
            };
            self.stats.record_cycle(&report);
            tracing::info!(
                subscribers = snapshot.len(),
                delivered = report.delivered(),
                failed = report.failed(),
                skipped = report.skipped(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "cycle complete"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn evaluate(&self, asset: &Asset) -> Result<Signal, FetchError> {
        let started = Instant::now();
        let res = self.prices.fetch(asset, self.cfg.history_limit).await;
        self.stats.record_fetch(started.elapsed());
        let series = res?;
        Ok(self.engine.derive(&series))
    }

    async fn deliver(&self, id: SubscriberId, text: &str) -> Outcome {
        let err = match tokio::time::timeout(self.cfg.send_timeout, self.sink.send(id, text)).await {
            Ok(Ok(())) => return Outcome::Delivered,
            Ok(Err(e)) => e,
            Err(_) => DeliveryError::Timeout(self.cfg.send_timeout),
        };
        tracing::warn!(subscriber = %id, error = %err, "delivery failed");
        Outcome::DeliveryFailed(err.to_string())
    }
}

/// Resolves once shutdown is requested or the sender is gone.
pub(crate) async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::LogSink;

    fn scheduler() -> BroadcastScheduler {
        BroadcastScheduler::new(
            SchedulerConfig::default(),
            Arc::new(SubscriberRegistry::new()),
            Arc::new(PriceRouter::new(Duration::from_secs(5))),
            SignalEngine::default(),
            Arc::new(LogSink),
        )
    }

    #[test]
    fn guard_returns_to_idle() {
        let s = scheduler();
        {
            let guard = s.begin_cycle();
            assert!(guard.is_some());
            assert_eq!(s.state(), SchedulerState::RunningCycle);
            assert!(s.begin_cycle().is_none());
        }
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn empty_registry_runs_an_empty_cycle() {
        let s = scheduler();
        let report = s.tick().await.unwrap();
        assert_eq!(report.cycle, 1);
        assert!(report.outcomes.is_empty());
        assert_eq!(s.cycles_started(), 1);
        assert_eq!(s.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_clamped_instead_of_panicking() {
        let s = Arc::new(BroadcastScheduler::new(
            SchedulerConfig {
                interval: Duration::ZERO,
                initial_delay: Duration::ZERO,
                ..Default::default()
            },
            Arc::new(SubscriberRegistry::new()),
            Arc::new(PriceRouter::new(Duration::from_secs(5))),
            SignalEngine::default(),
            Arc::new(LogSink),
        ));
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn({
            let s = s.clone();
            async move { s.run(rx).await }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(s.cycles_started(), 3);

        tx.send(true).unwrap();
        task.await.expect("run loop must not panic");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_before_first_tick_returns() {
        let s = scheduler();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        s.run(rx).await;
        assert_eq!(s.cycles_started(), 0);
    }
}
