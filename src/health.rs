//! Periodic external health check.
//!
//! Resolves a canary quote and reports up/down to the configured endpoint.
//! Reporting failures are swallowed; the network may simply be offline and
//! the next interval will try again.

use crate::config::HealthCheckConfig;
use crate::providers::MarketDataProvider;
use std::sync::Arc;
use tokio::time::Duration;

const CHECK_INTERVAL_SECS: u64 = 60;
const CANARY_SYMBOL: &str = "AAPL";

/// Spawn the recurring health check task.
pub fn spawn(
    config: HealthCheckConfig,
    provider: Arc<dyn MarketDataProvider>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
        {
            Ok(client) => client,
            Err(error) => {
                tracing::error!(%error, "failed to build health check client");
                return;
            }
        };

        let mut ticker = tokio::time::interval(Duration::from_secs(CHECK_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            fire(&client, &config, provider.as_ref()).await;
        }
    })
}

async fn fire(client: &reqwest::Client, config: &HealthCheckConfig, provider: &dyn MarketDataProvider) {
    let symbols = vec![CANARY_SYMBOL.to_string()];
    let healthy = match provider.quotes(&symbols).await {
        Ok(responses) => responses
            .first()
            .is_some_and(|response| response.quote.is_some()),
        Err(_) => false,
    };

    let (status, message) = if healthy {
        ("up", "OK".to_string())
    } else {
        ("down", format!("Failed to get health quote for {CANARY_SYMBOL}"))
    };

    let method = config
        .method
        .parse::<reqwest::Method>()
        .unwrap_or(reqwest::Method::GET);

    let mut request = client
        .request(method, &config.url)
        .query(&[("status", status), ("msg", message.as_str()), ("ping", "")]);
    if let Some(token) = &config.bearer_token {
        request = request.bearer_auth(token);
    }

    match request.send().await {
        Ok(_) => tracing::debug!(status, "health check reported"),
        Err(error) => tracing::debug!(%error, "health check report failed, will retry"),
    }
}
