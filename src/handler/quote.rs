//! Quote handler: single-prefix tokens to price blocks.

use crate::command;
use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::providers::MarketDataProvider;
use crate::render;
use std::collections::HashSet;
use std::sync::Arc;

pub struct QuoteHandler {
    provider: Arc<dyn MarketDataProvider>,
}

impl QuoteHandler {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl MessageHandler for QuoteHandler {
    fn tag(&self) -> &'static str {
        "QuoteHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        let current = &event.current;
        if current.is_help {
            return None;
        }

        // Single-prefix tokens only; recommendation tokens are seeds for
        // the recommend handler, not direct quotes.
        let mut symbols = Vec::new();
        let mut seen = HashSet::new();
        for raw in &current.tokens {
            let Some(token) = command::parse_token(&config.prefix, raw) else {
                continue;
            };
            if token.prefix_count != 1 || token.modifier.recommend {
                continue;
            }
            if seen.insert(token.symbol.clone()) {
                symbols.push(token.symbol);
            }
        }

        if symbols.is_empty() {
            return None;
        }

        tracing::debug!(?symbols, "handle quote message");

        let responses = match self.provider.quotes(&symbols).await {
            Ok(responses) => responses,
            Err(error) => {
                tracing::error!(%error, "quote lookup failed");
                return Some(HandlerOutput::error(format!("Error getting quotes: {error}")));
            }
        };

        let mut messages = Vec::new();

        // Requested symbols first, in input order.
        for symbol in &symbols {
            let text = match responses.iter().find(|r| r.symbol == *symbol) {
                Some(response) => render_response(symbol, response.quote.as_ref(), response.error.as_deref()),
                None => format!("Unable to find data for: {symbol}"),
            };
            HandlerOutput::put(&mut messages, symbol.clone(), text);
        }

        // Then anything the provider returned that was not asked for.
        for response in &responses {
            if symbols.contains(&response.symbol) {
                continue;
            }
            let text = render_response(
                &response.symbol,
                response.quote.as_ref(),
                response.error.as_deref(),
            );
            HandlerOutput::put(&mut messages, response.symbol.clone(), text);
        }

        Some(HandlerOutput::messages(messages))
    }
}

fn render_response(
    symbol: &str,
    quote: Option<&crate::providers::Quote>,
    error: Option<&str>,
) -> String {
    match (quote, error) {
        (Some(quote), _) => render::quote_block(quote),
        (None, Some(error)) => error.to_string(),
        (None, None) => format!("Unable to find data for: {symbol}"),
    }
}

#[cfg(test)]
mod tests {
    use super::QuoteHandler;
    use crate::handler::tests::{event, test_config};
    use crate::handler::MessageHandler;
    use crate::providers::tests::MockProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_applies_to_single_prefix_tokens_only() {
        let provider = Arc::new(MockProvider::default().with_quote("AAPL", 100.0));
        let handler = QuoteHandler::new(provider);
        let config = test_config("$");

        let output = handler
            .handle(&config, &event("$", "$AAPL"))
            .await
            .expect("applies");
        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.messages[0].0, "AAPL");
        assert!(output.messages[0].1.contains("**AAPL**"));

        assert!(handler.handle(&config, &event("$", "$$Apple")).await.is_none());
        assert!(handler.handle(&config, &event("$", "$$$AAPL")).await.is_none());
        assert!(handler.handle(&config, &event("$", "$")).await.is_none());
    }

    #[tokio::test]
    async fn test_rec_tokens_are_not_quoted() {
        let provider = Arc::new(MockProvider::default().with_quote("AAPL", 100.0));
        let handler = QuoteHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$MSFT:REC $AAPL"))
            .await
            .expect("applies");
        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.messages[0].0, "AAPL");
    }

    #[tokio::test]
    async fn test_symbols_are_deduplicated_and_uppercased() {
        let provider = Arc::new(MockProvider::default().with_quote("AAPL", 100.0));
        let handler = QuoteHandler::new(provider.clone());
        let output = handler
            .handle(&test_config("$"), &event("$", "$aapl $AAPL"))
            .await
            .expect("applies");
        assert_eq!(output.messages.len(), 1);
        assert_eq!(provider.quote_calls(), vec![vec!["AAPL".to_string()]]);
    }

    #[tokio::test]
    async fn test_bad_symbol_is_isolated() {
        let provider = Arc::new(MockProvider::default().with_quote("AAPL", 100.0));
        let handler = QuoteHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL $NOPE"))
            .await
            .expect("applies");

        assert_eq!(output.messages.len(), 2);
        assert!(output.messages[0].1.contains("**AAPL**"));
        assert!(output.messages[1].1.contains("Unable to find quote for"));
        assert!(output.error.is_none());
    }

    #[tokio::test]
    async fn test_batch_failure_is_an_error_output() {
        let provider = Arc::new(MockProvider::default().failing());
        let handler = QuoteHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL"))
            .await
            .expect("applies");
        assert!(output.error.is_some());
        assert_eq!(output.messages[0].0, "ERROR");
    }
}
