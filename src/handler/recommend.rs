//! Recommendation handler: seed symbols to related-ticker quotes.
//!
//! Two spellings resolve to the same seed set: a triple-prefix token
//! (`$$$MSFT`) and a single-prefix token with the `REC` modifier
//! (`$MSFT:REC`).

use crate::command;
use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::providers::MarketDataProvider;
use crate::render;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct RecommendHandler {
    provider: Arc<dyn MarketDataProvider>,
}

impl RecommendHandler {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

/// Seed symbols in input order, both spellings unified.
fn seeds(prefix: &str, tokens: &[String]) -> Vec<String> {
    let mut seeds = Vec::new();
    let mut seen = HashSet::new();
    for raw in tokens {
        let Some(token) = command::parse_token(prefix, raw) else {
            continue;
        };
        let is_seed = token.prefix_count == 3 || (token.prefix_count == 1 && token.modifier.recommend);
        if is_seed && seen.insert(token.symbol.clone()) {
            seeds.push(token.symbol);
        }
    }
    seeds
}

#[async_trait::async_trait]
impl MessageHandler for RecommendHandler {
    fn tag(&self) -> &'static str {
        "RecommendHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        let current = &event.current;
        if current.is_help {
            return None;
        }

        let seeds = seeds(&config.prefix, &current.tokens);
        if seeds.is_empty() {
            return None;
        }

        tracing::debug!(?seeds, "handle recommendation message");

        let work = seeds.iter().map(|seed| self.provider.recommendations(seed));
        let results = futures::future::join_all(work).await;

        // Seed order drives the final ordering; the first seed to recommend
        // a symbol owns its slot.
        let mut recommended: Vec<String> = Vec::new();
        let mut attribution: HashMap<String, String> = HashMap::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        for (seed, result) in seeds.iter().zip(results) {
            match result {
                Ok(response) if !response.recommended.is_empty() => {
                    for symbol in response.recommended {
                        let symbol = symbol.to_uppercase();
                        if attribution.contains_key(&symbol) {
                            continue;
                        }
                        attribution.insert(symbol.clone(), seed.clone());
                        recommended.push(symbol);
                    }
                }
                Ok(response) => {
                    let text = response
                        .error
                        .unwrap_or_else(|| format!("Unable to get recommendation: {seed}"));
                    HandlerOutput::put(&mut errors, seed.clone(), text);
                }
                Err(error) => {
                    tracing::error!(seed = %seed, %error, "recommendation lookup failed");
                    HandlerOutput::put(
                        &mut errors,
                        seed.clone(),
                        format!("Unable to get recommendation: {seed}"),
                    );
                }
            }
        }

        if recommended.is_empty() {
            return Some(HandlerOutput::messages(errors));
        }

        let responses = match self.provider.quotes(&recommended).await {
            Ok(responses) => responses,
            Err(error) => {
                tracing::error!(%error, "quote lookup for recommendations failed");
                return Some(HandlerOutput::error(format!("Error getting quotes: {error}")));
            }
        };

        let mut messages = Vec::new();
        for symbol in &recommended {
            let Some(response) = responses.iter().find(|r| r.symbol == *symbol) else {
                continue;
            };
            let rendered = match (&response.quote, &response.error) {
                (Some(quote), _) => render::quote_block(quote),
                (None, Some(error)) => error.clone(),
                (None, None) => format!("Unable to find data for: {symbol}"),
            };
            let seed = attribution
                .get(symbol)
                .map(String::as_str)
                .unwrap_or_default();
            let text = format!(
                "{} recommends similar ticker =>{rendered}",
                render::bold(seed)
            );
            HandlerOutput::put(&mut messages, symbol.clone(), text);
        }

        for (key, text) in errors {
            HandlerOutput::put(&mut messages, key, text);
        }

        Some(HandlerOutput::messages(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::{RecommendHandler, seeds};
    use crate::handler::MessageHandler;
    use crate::handler::tests::{event, test_config};
    use crate::providers::tests::MockProvider;
    use std::sync::Arc;

    #[test]
    fn test_both_spellings_resolve_to_the_same_seeds() {
        let tokens = |content: &str| crate::command::parse("$", content).tokens;
        assert_eq!(seeds("$", &tokens("$$$MSFT")), vec!["MSFT"]);
        assert_eq!(seeds("$", &tokens("$MSFT:REC")), vec!["MSFT"]);
        assert_eq!(seeds("$", &tokens("$$$MSFT $MSFT:REC")), vec!["MSFT"]);
        assert_eq!(seeds("$", &tokens("$MSFT")), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_recommended_symbols_are_quoted_with_attribution() {
        let provider = Arc::new(
            MockProvider::default()
                .with_recommendations("MSFT", &["AAPL", "GOOG"])
                .with_quote("AAPL", 100.0)
                .with_quote("GOOG", 150.0),
        );
        let handler = RecommendHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$$$MSFT"))
            .await
            .expect("applies");

        assert_eq!(output.messages.len(), 2);
        assert_eq!(output.messages[0].0, "AAPL");
        assert!(output.messages[0].1.starts_with("**MSFT** recommends"));
        assert_eq!(output.messages[1].0, "GOOG");
        // The seed itself is not quoted.
        assert!(!output.messages.iter().any(|(key, _)| key == "MSFT"));
    }

    #[tokio::test]
    async fn test_failed_seed_is_keyed_by_seed() {
        let provider = Arc::new(MockProvider::default());
        let handler = RecommendHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$$$NOPE"))
            .await
            .expect("applies");

        assert_eq!(output.messages.len(), 1);
        assert_eq!(output.messages[0].0, "NOPE");
        assert!(output.messages[0].1.contains("Unable to get recommendation"));
    }

    #[tokio::test]
    async fn test_first_seed_owns_colliding_recommendations() {
        let provider = Arc::new(
            MockProvider::default()
                .with_recommendations("MSFT", &["AAPL"])
                .with_recommendations("ORCL", &["AAPL"])
                .with_quote("AAPL", 100.0),
        );
        let handler = RecommendHandler::new(provider);
        let output = handler
            .handle(&test_config("$"), &event("$", "$$$MSFT $$$ORCL"))
            .await
            .expect("applies");

        assert_eq!(output.messages.len(), 1);
        assert!(output.messages[0].1.starts_with("**MSFT**"));
    }
}
