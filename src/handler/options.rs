//! Option chain handler: `options[week]`-modified tokens to strike tables.
//!
//! Contracts bucket per expiration date into in-the-money and
//! out-of-the-money sides, keeping the five closest to at-the-money on
//! each side. Calls list ITM strikes descending then OTM ascending; puts
//! are mirrored.

use crate::command;
use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::providers::{MarketDataProvider, OptionContract, OptionExpiration};
use crate::render;
use std::sync::Arc;

const NEAREST_PER_SIDE: usize = 5;

pub struct OptionChainHandler {
    provider: Arc<dyn MarketDataProvider>,
}

impl OptionChainHandler {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Calls,
    Puts,
}

impl Side {
    fn label(self) -> &'static str {
        match self {
            Side::Calls => "Calls",
            Side::Puts => "Puts",
        }
    }
}

fn nearest(mut contracts: Vec<OptionContract>, underlying: f64) -> Vec<OptionContract> {
    contracts.sort_by(|a, b| {
        (a.strike - underlying)
            .abs()
            .total_cmp(&(b.strike - underlying).abs())
    });
    contracts.truncate(NEAREST_PER_SIDE);
    contracts
}

/// Rows for one side of one expiration, in display order.
fn side_rows(expiration: &OptionExpiration, underlying: f64, side: Side) -> Vec<OptionContract> {
    let contracts = match side {
        Side::Calls => &expiration.calls,
        Side::Puts => &expiration.puts,
    };

    let (itm, otm): (Vec<_>, Vec<_>) = contracts
        .iter()
        .copied()
        .partition(|contract| contract.in_the_money);
    let mut itm = nearest(itm, underlying);
    let mut otm = nearest(otm, underlying);

    match side {
        Side::Calls => {
            itm.sort_by(|a, b| b.strike.total_cmp(&a.strike));
            otm.sort_by(|a, b| a.strike.total_cmp(&b.strike));
            itm.into_iter().chain(otm).collect()
        }
        Side::Puts => {
            otm.sort_by(|a, b| b.strike.total_cmp(&a.strike));
            itm.sort_by(|a, b| a.strike.total_cmp(&b.strike));
            otm.into_iter().chain(itm).collect()
        }
    }
}

#[async_trait::async_trait]
impl MessageHandler for OptionChainHandler {
    fn tag(&self) -> &'static str {
        "OptionChainHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        let current = &event.current;
        if current.is_help {
            return None;
        }

        let mut requests: Vec<(String, u32)> = Vec::new();
        for raw in &current.tokens {
            let Some(token) = command::parse_token(&config.prefix, raw) else {
                continue;
            };
            let Some(chain) = token.modifier.option_chain else {
                continue;
            };
            if token.prefix_count == 1
                && !requests.iter().any(|(symbol, _)| *symbol == token.symbol)
            {
                requests.push((token.symbol, chain.week_offset));
            }
        }

        if requests.is_empty() {
            return None;
        }

        tracing::debug!(?requests, "handle option chain message");

        let work = requests
            .iter()
            .map(|(symbol, offset)| self.provider.option_chain(symbol, *offset));
        let results = futures::future::join_all(work).await;

        let mut messages = Vec::new();
        for ((symbol, _), result) in requests.iter().zip(results) {
            match result {
                Ok(chain) if !chain.expirations.is_empty() => {
                    for expiration in &chain.expirations {
                        let mut text = String::new();
                        for side in [Side::Calls, Side::Puts] {
                            let rows = side_rows(expiration, chain.underlying_price, side);
                            if rows.is_empty() {
                                continue;
                            }
                            text.push_str(&render::option_chain_block(
                                side.label(),
                                &expiration.date,
                                &rows,
                            ));
                        }
                        if text.is_empty() {
                            continue;
                        }
                        HandlerOutput::put(
                            &mut messages,
                            format!("option-{symbol}-{}", expiration.date),
                            text,
                        );
                    }
                }
                Ok(chain) => {
                    HandlerOutput::put(
                        &mut messages,
                        format!("option-{symbol}"),
                        format!("No options for: {}", chain.symbol),
                    );
                }
                Err(error) => {
                    tracing::error!(symbol = %symbol, %error, "option chain lookup failed");
                    HandlerOutput::put(
                        &mut messages,
                        format!("option-{symbol}"),
                        format!("No options for: {symbol}"),
                    );
                }
            }
        }

        Some(HandlerOutput::messages(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::{OptionChainHandler, Side, side_rows};
    use crate::handler::MessageHandler;
    use crate::handler::tests::{event, test_config};
    use crate::providers::tests::MockProvider;
    use crate::providers::{OptionChainResponse, OptionContract, OptionExpiration};
    use std::sync::Arc;

    fn contract(strike: f64, in_the_money: bool) -> OptionContract {
        OptionContract {
            strike,
            bid: 1.0,
            ask: 1.1,
            volume: 10,
            implied_volatility: 0.3,
            in_the_money,
        }
    }

    fn expiration(calls: Vec<OptionContract>, puts: Vec<OptionContract>) -> OptionExpiration {
        OptionExpiration {
            date: "2026-08-07".into(),
            calls,
            puts,
        }
    }

    #[test]
    fn test_call_rows_itm_descending_then_otm_ascending() {
        // Underlying at 100: ITM call strikes below, OTM above.
        let calls: Vec<_> = (1..=8)
            .map(|i| contract(100.0 - f64::from(i) * 5.0, true))
            .chain((1..=8).map(|i| contract(100.0 + f64::from(i) * 5.0, false)))
            .collect();
        let rows = side_rows(&expiration(calls, Vec::new()), 100.0, Side::Calls);

        let strikes: Vec<f64> = rows.iter().map(|c| c.strike).collect();
        assert_eq!(
            strikes,
            vec![95.0, 90.0, 85.0, 80.0, 75.0, 105.0, 110.0, 115.0, 120.0, 125.0]
        );
    }

    #[test]
    fn test_put_rows_are_mirrored() {
        // Underlying at 100: ITM put strikes above, OTM below.
        let puts: Vec<_> = (1..=8)
            .map(|i| contract(100.0 + f64::from(i) * 5.0, true))
            .chain((1..=8).map(|i| contract(100.0 - f64::from(i) * 5.0, false)))
            .collect();
        let rows = side_rows(&expiration(Vec::new(), puts), 100.0, Side::Puts);

        let strikes: Vec<f64> = rows.iter().map(|c| c.strike).collect();
        assert_eq!(
            strikes,
            vec![95.0, 90.0, 85.0, 80.0, 75.0, 105.0, 110.0, 115.0, 120.0, 125.0]
        );
    }

    #[tokio::test]
    async fn test_each_expiration_gets_its_own_key() {
        let chain = OptionChainResponse {
            symbol: "AAPL".into(),
            underlying_price: 100.0,
            expirations: vec![
                OptionExpiration {
                    date: "2026-08-07".into(),
                    calls: vec![contract(95.0, true), contract(105.0, false)],
                    puts: vec![contract(105.0, true), contract(95.0, false)],
                },
                OptionExpiration {
                    date: "2026-08-14".into(),
                    calls: vec![contract(95.0, true)],
                    puts: Vec::new(),
                },
            ],
        };
        let provider = Arc::new(MockProvider::default().with_chain(chain));
        let handler = OptionChainHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL:OPTIONS"))
            .await
            .expect("applies");

        let keys: Vec<&str> = output.messages.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["option-AAPL-2026-08-07", "option-AAPL-2026-08-14"]);
        assert!(output.messages[0].1.contains("Calls"));
        assert!(output.messages[0].1.contains("Puts"));
    }

    #[tokio::test]
    async fn test_missing_chain_is_isolated() {
        let provider = Arc::new(MockProvider::default());
        let handler = OptionChainHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL:OPTIONS"))
            .await
            .expect("applies");
        assert_eq!(output.messages[0].0, "option-AAPL");
        assert!(output.messages[0].1.contains("No options for: AAPL"));
    }

    #[tokio::test]
    async fn test_does_not_apply_without_modifier() {
        let provider = Arc::new(MockProvider::default());
        let handler = OptionChainHandler::new(provider);
        assert!(
            handler
                .handle(&test_config("$"), &event("$", "$AAPL"))
                .await
                .is_none()
        );
    }
}
