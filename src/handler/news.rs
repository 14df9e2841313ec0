//! News handler: headline links for tokens carrying the `news` modifier.

use crate::command;
use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::providers::MarketDataProvider;
use crate::render;
use std::collections::HashSet;
use std::sync::Arc;

/// All news sections share one reply message.
const NEWS_KEY: &str = "news";

pub struct NewsHandler {
    provider: Arc<dyn MarketDataProvider>,
}

impl NewsHandler {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait::async_trait]
impl MessageHandler for NewsHandler {
    fn tag(&self) -> &'static str {
        "NewsHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        let current = &event.current;
        if current.is_help {
            return None;
        }

        let mut symbols = Vec::new();
        let mut seen = HashSet::new();
        for raw in &current.tokens {
            let Some(token) = command::parse_token(&config.prefix, raw) else {
                continue;
            };
            if token.prefix_count == 1 && token.modifier.news && seen.insert(token.symbol.clone()) {
                symbols.push(token.symbol);
            }
        }

        if symbols.is_empty() {
            return None;
        }

        tracing::debug!(?symbols, "handle news message");

        let responses = match self.provider.news(&symbols).await {
            Ok(responses) => responses,
            Err(error) => {
                tracing::error!(%error, "news lookup failed");
                return Some(HandlerOutput::error(format!("Error getting news: {error}")));
            }
        };

        let mut combined = String::new();
        for symbol in &symbols {
            let section = match responses.iter().find(|r| r.symbol == *symbol) {
                Some(response) => {
                    render::news_block(symbol, &response.links, response.error.as_deref())
                }
                None => render::news_block(symbol, &[], Some("missing")),
            };
            combined.push_str(&section);
        }

        Some(HandlerOutput::messages(vec![(NEWS_KEY.into(), combined)]))
    }
}

#[cfg(test)]
mod tests {
    use super::NewsHandler;
    use crate::handler::MessageHandler;
    use crate::handler::tests::{event, test_config};
    use crate::providers::tests::MockProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_applies_only_with_news_modifier() {
        let provider = Arc::new(MockProvider::default().with_news("AAPL", &["https://a"]));
        let handler = NewsHandler::new(provider);
        let config = test_config("$");

        assert!(handler.handle(&config, &event("$", "$AAPL")).await.is_none());

        let output = handler
            .handle(&config, &event("$", "$AAPL:news"))
            .await
            .expect("applies");
        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.messages[0].0, "news");
        assert!(output.messages[0].1.contains("https://a"));
    }

    #[tokio::test]
    async fn test_symbols_without_news_get_error_text() {
        let provider = Arc::new(MockProvider::default());
        let handler = NewsHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL:news"))
            .await
            .expect("applies");
        assert!(output.messages[0].1.contains("Unable to find news for: AAPL"));
    }

    #[tokio::test]
    async fn test_multiple_symbols_share_one_message() {
        let provider = Arc::new(
            MockProvider::default()
                .with_news("AAPL", &["https://a"])
                .with_news("MSFT", &["https://m"]),
        );
        let handler = NewsHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$AAPL:news $MSFT:news"))
            .await
            .expect("applies");
        assert_eq!(output.messages.len(), 1);
        assert!(output.messages[0].1.contains("https://a"));
        assert!(output.messages[0].1.contains("https://m"));
    }
}
