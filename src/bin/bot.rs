use anyhow::Context;
use clap::{Parser, ValueEnum};
use signal_broadcast_bot::catalog::AssetCatalog;
use signal_broadcast_bot::delivery::{DeliverySink, LogSink};
use signal_broadcast_bot::format::{FormatterConfig, MessageFormatter};
use signal_broadcast_bot::metrics::BroadcastStats;
use signal_broadcast_bot::scheduler::{BroadcastScheduler, InsufficientDataPolicy, SchedulerConfig};
use signal_broadcast_bot::signal::{EmaCrossover, Rsi, SignalEngine, MIN_SAMPLES};
use signal_broadcast_bot::source::alpha_vantage::{self, AlphaVantageSource};
use signal_broadcast_bot::source::binance::{self, BinanceSource};
use signal_broadcast_bot::source::sim::SimulatedSource;
use signal_broadcast_bot::source::PriceRouter;
use signal_broadcast_bot::telegram::front_end::FrontEnd;
use signal_broadcast_bot::telegram::{self, TelegramClient};
use signal_broadcast_bot::types::ProviderKind;
use signal_broadcast_bot::SubscriberRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    Ema,
    Rsi,
}

#[derive(Parser, Debug)]
#[command(name = "bot", about = "Broadcast trading signals to Telegram subscribers")]
struct Args {
    #[arg(long, env = "TELEGRAM_TOKEN", hide_env_values = true)]
    telegram_token: Option<String>,

    #[arg(long, env = "ALPHA_KEY", hide_env_values = true)]
    alpha_key: Option<String>,

    /// Use simulated prices and log messages instead of sending them.
    #[arg(long)]
    sim: bool,

    #[arg(long, default_value_t = 300, value_parser = clap::value_parser!(u64).range(1..))]
    interval_secs: u64,

    #[arg(long, default_value_t = 20)]
    initial_delay_secs: u64,

    #[arg(long, default_value_t = 5)]
    fetch_timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    send_timeout_secs: u64,

    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,

    /// Closes fetched per asset; shorter series never produce a direction.
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(MIN_SAMPLES as u64..))]
    history: u64,

    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u64).range(1..))]
    concurrency: u64,

    #[arg(long, value_enum, default_value = "ema")]
    strategy: StrategyArg,

    /// Do not broadcast "insufficient data" messages.
    #[arg(long)]
    skip_insufficient: bool,

    /// IANA zone used for entry times.
    #[arg(long, default_value = "Europe/Rome")]
    timezone: String,

    /// JSON asset catalog; defaults to the built-in list.
    #[arg(long, env = "ASSET_CATALOG")]
    catalog: Option<PathBuf>,

    #[arg(long, default_value = binance::DEFAULT_BASE_URL)]
    binance_base: String,

    #[arg(long, default_value = alpha_vantage::DEFAULT_BASE_URL)]
    alpha_base: String,

    #[arg(long, default_value = telegram::DEFAULT_API_BASE)]
    telegram_base: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let catalog = Arc::new(match &args.catalog {
        Some(path) => AssetCatalog::from_json_file(path)?,
        None => AssetCatalog::default(),
    });
    let timezone: chrono_tz::Tz = args
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid --timezone {}: {e}", args.timezone))?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()
        .context("build http client")?;

    let fetch_timeout = Duration::from_secs(args.fetch_timeout_secs);
    let router = if args.sim {
        PriceRouter::new(fetch_timeout)
            .with_source(Arc::new(SimulatedSource::new(ProviderKind::CryptoExchange)))
            .with_source(Arc::new(SimulatedSource::new(ProviderKind::Forex)))
    } else {
        let mut router = PriceRouter::new(fetch_timeout)
            .with_source(Arc::new(BinanceSource::new(http.clone(), args.binance_base.clone())));
        match &args.alpha_key {
            Some(key) => {
                router = router.with_source(Arc::new(AlphaVantageSource::new(
                    http.clone(),
                    args.alpha_base.clone(),
                    key.clone(),
                )));
            }
            None => tracing::warn!("ALPHA_KEY not set; forex assets will fail to fetch"),
        }
        router
    };

    let engine = match args.strategy {
        StrategyArg::Ema => SignalEngine::new(Box::new(EmaCrossover::default())),
        StrategyArg::Rsi => SignalEngine::new(Box::new(Rsi::default())),
    };

    let telegram = match (&args.telegram_token, args.sim) {
        (Some(token), _) => Some(Arc::new(TelegramClient::new(http.clone(), &args.telegram_base, token))),
        (None, true) => None,
        (None, false) => anyhow::bail!("TELEGRAM_TOKEN is required unless --sim is set"),
    };
    let sink: Arc<dyn DeliverySink> = match (&telegram, args.sim) {
        (Some(client), false) => client.clone(),
        _ => Arc::new(LogSink),
    };

    let cfg = SchedulerConfig {
        interval: Duration::from_secs(args.interval_secs),
        initial_delay: Duration::from_secs(args.initial_delay_secs),
        send_timeout: Duration::from_secs(args.send_timeout_secs),
        history_limit: args.history as usize,
        max_concurrency: args.concurrency as usize,
        shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
        insufficient_data: if args.skip_insufficient {
            InsufficientDataPolicy::Skip
        } else {
            InsufficientDataPolicy::Send
        },
    };
    let formatter = MessageFormatter::new(FormatterConfig {
        timezone,
        ..Default::default()
    });

    let registry = Arc::new(SubscriberRegistry::new());
    let stats = Arc::new(BroadcastStats::new());
    let scheduler = Arc::new(
        BroadcastScheduler::new(cfg, registry.clone(), Arc::new(router), engine, sink)
            .with_formatter(formatter)
            .with_stats(stats.clone()),
    );

    if args.sim && telegram.is_none() {
        // Nobody can subscribe without a front end; seed one subscriber per asset.
        for (i, asset) in catalog.iter().enumerate() {
            let id = signal_broadcast_bot::types::SubscriberId(-(i as i64) - 1);
            registry.subscribe(id);
            registry.select_asset(id, asset.clone());
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut tasks = Vec::new();
    {
        let scheduler = scheduler.clone();
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { scheduler.run(rx).await }));
    }
    if let Some(client) = telegram {
        let front_end = FrontEnd::new(client, registry.clone(), catalog.clone(), scheduler.clone());
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { front_end.run(rx).await }));
    }

    tokio::signal::ctrl_c().await.context("listen for ctrl-c")?;
    tracing::info!("shutdown requested");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "task panicked");
        }
    }

    println!("{}", serde_json::to_string_pretty(&stats.snapshot_kv())?);
    Ok(())
}
