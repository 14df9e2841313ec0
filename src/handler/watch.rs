//! Watch notification path.
//!
//! Runs from the watch timer, never from inbound messages. Each check
//! re-resolves the symbol's quote; a crossed bound produces a transient
//! mention (never cached) plus a fresh quote render reconciled under a
//! synthetic `watch:<symbol>` source id, so repeated notifications edit
//! the same quote message in place.

use crate::bot::DiscordTarget;
use crate::market;
use crate::providers::MarketDataProvider;
use crate::reconcile::{Payload, Reconciler};
use crate::render;
use crate::watch::{WatchCheck, WatchChecker, WatchOutcome};
use std::sync::{Arc, OnceLock};

pub struct WatchNotifier {
    provider: Arc<dyn MarketDataProvider>,
    reconciler: Arc<Reconciler>,
    http: OnceLock<Arc<serenity::http::Http>>,
}

impl WatchNotifier {
    pub fn new(provider: Arc<dyn MarketDataProvider>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            provider,
            reconciler,
            http: OnceLock::new(),
        }
    }

    /// Attach the gateway HTTP handle once the client is ready. Checks
    /// before attachment are skipped.
    pub fn attach_http(&self, http: Arc<serenity::http::Http>) {
        let _ = self.http.set(http);
    }
}

/// Whether a price crossed a watch point. The original registration price
/// may already sit past the point, in which case the first check fires.
fn is_passed_point(point: Option<f64>, price: f64, notify_above: bool) -> bool {
    let Some(point) = point else {
        return false;
    };
    if point < 0.0 || price < 0.0 {
        return false;
    }
    if notify_above {
        price > point
    } else {
        price < point
    }
}

#[async_trait::async_trait]
impl WatchChecker for WatchNotifier {
    async fn check(&self, check: &WatchCheck) -> WatchOutcome {
        if !market::is_market_open() {
            tracing::debug!(symbol = %check.symbol, "market closed, skipping watch check");
            return WatchOutcome::default();
        }

        let Some(http) = self.http.get() else {
            tracing::warn!(symbol = %check.symbol, "watch check before gateway ready, skipping");
            return WatchOutcome::default();
        };

        let symbols = vec![check.symbol.clone()];
        let quote = match self.provider.quotes(&symbols).await {
            Ok(responses) => responses.into_iter().next().and_then(|r| r.quote),
            Err(error) => {
                tracing::warn!(symbol = %check.symbol, %error, "watch quote lookup failed");
                return WatchOutcome::default();
            }
        };
        let Some(quote) = quote else {
            tracing::warn!(symbol = %check.symbol, "watch check found no quote data");
            return WatchOutcome::default();
        };

        let price = quote.latest_price();
        let outcome = WatchOutcome {
            passed_low: is_passed_point(check.low, price, false),
            passed_high: is_passed_point(check.high, price, true),
        };

        if !outcome.passed_low && !outcome.passed_high {
            return outcome;
        }

        let target = DiscordTarget::new(http.clone(), check.channel_id);
        let source_id = format!("watch:{}", check.symbol);

        let crossings = [
            (outcome.passed_low, check.low, false),
            (outcome.passed_high, check.high, true),
        ];
        for (passed, point, above) in crossings {
            let (true, Some(point)) = (passed, point) else {
                continue;
            };
            tracing::info!(symbol = %check.symbol, point, price, above, "watch point passed");
            let text = render::notify(check.requested_by, &check.symbol, point, price, above);
            let revision = self.reconciler.begin(&source_id).await;
            self.reconciler
                .apply(&source_id, revision, &target, Payload::Plain(text))
                .await;
        }

        // The fresh price render edits in place across notifications.
        let revision = self.reconciler.begin(&source_id).await;
        self.reconciler
            .apply(
                &source_id,
                revision,
                &target,
                Payload::Keyed(Ok(vec![(
                    check.symbol.clone(),
                    render::quote_block(&quote),
                )])),
            )
            .await;

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::is_passed_point;

    #[test]
    fn test_passed_point_low() {
        assert!(is_passed_point(Some(100.0), 99.0, false));
        assert!(!is_passed_point(Some(100.0), 101.0, false));
        assert!(!is_passed_point(Some(100.0), 100.0, false));
    }

    #[test]
    fn test_passed_point_high() {
        assert!(is_passed_point(Some(100.0), 101.0, true));
        assert!(!is_passed_point(Some(100.0), 99.0, true));
    }

    #[test]
    fn test_cleared_point_never_fires() {
        assert!(!is_passed_point(None, 0.0, false));
        assert!(!is_passed_point(None, f64::MAX, true));
    }
}
