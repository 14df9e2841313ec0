//! Tickerbot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use std::sync::Arc;
use tickerbot::handler::watch::WatchNotifier;
use tickerbot::providers::yahoo::YahooProvider;
use tickerbot::reconcile::Reconciler;
use tickerbot::watch::WatchListService;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tickerbot")]
#[command(about = "A Discord bot for stock quotes, lookups, and price watches")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting tickerbot...");

    let config = tickerbot::config::Config::load()
        .with_context(|| "failed to load configuration from environment")?;

    tracing::info!(
        prefix = %config.prefix,
        target_channels = config.target_channels.len(),
        "Configuration loaded"
    );

    let provider: Arc<dyn tickerbot::providers::MarketDataProvider> =
        Arc::new(YahooProvider::new().with_context(|| "failed to build market data provider")?);

    let reconciler = Arc::new(Reconciler::new());
    let notifier = Arc::new(WatchNotifier::new(provider.clone(), reconciler.clone()));
    let watches = Arc::new(WatchListService::new(
        Duration::from_secs(config.watch.poll_interval_secs),
        notifier.clone(),
    ));

    let health_task = config
        .health_check
        .clone()
        .map(|health| tickerbot::health::spawn(health, provider.clone()));
    if health_task.is_some() {
        tracing::info!("Health check reporting enabled");
    }

    let bot = tickerbot::bot::Bot::new(
        config.clone(),
        provider,
        reconciler,
        watches.clone(),
        notifier,
    );

    let mut client = serenity::Client::builder(&config.token, tickerbot::bot::intents())
        .event_handler(bot)
        .await
        .with_context(|| "failed to build Discord client")?;

    tokio::select! {
        result = client.start() => {
            result.with_context(|| "gateway connection ended")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    tracing::info!("Shutting down...");
    watches.clear().await;
    if let Some(task) = health_task {
        task.abort();
    }

    tracing::info!("Tickerbot stopped");
    Ok(())
}
