//! Reverse lookup handler: company-name queries to tickers to quotes.
//!
//! A double-prefix token starts a query; the unprefixed tokens that follow
//! it are part of the same query, so `$$Apple Inc` asks about "Apple Inc".

use crate::command;
use crate::config::Config;
use crate::handler::{CommandEvent, HandlerOutput, MessageHandler};
use crate::providers::MarketDataProvider;
use crate::render;
use std::sync::Arc;

pub struct LookupHandler {
    provider: Arc<dyn MarketDataProvider>,
}

impl LookupHandler {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

/// Collect the free-text queries from a token list.
fn queries(prefix: &str, tokens: &[String]) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for raw in tokens {
        let count = command::prefix_count(prefix, raw);
        if count == 2 {
            if let Some(done) = current.take() {
                queries.push(done);
            }
            current = Some(command::symbol_portion(prefix, raw).to_string());
        } else if count == 0 {
            if let Some(query) = current.as_mut() {
                query.push(' ');
                query.push_str(raw);
            }
        } else {
            // A differently-prefixed token ends the running query.
            if let Some(done) = current.take() {
                queries.push(done);
            }
        }
    }

    if let Some(done) = current {
        queries.push(done);
    }

    queries.retain(|query| !query.trim().is_empty());
    queries.dedup();
    queries
}

#[async_trait::async_trait]
impl MessageHandler for LookupHandler {
    fn tag(&self) -> &'static str {
        "LookupHandler"
    }

    async fn handle(&self, config: &Config, event: &CommandEvent) -> Option<HandlerOutput> {
        let current = &event.current;
        if current.is_help {
            return None;
        }

        let queries = queries(&config.prefix, &current.tokens);
        if queries.is_empty() {
            return None;
        }

        tracing::debug!(?queries, "handle lookup message");

        let work = queries.iter().map(|query| self.provider.search(query));
        let results = futures::future::join_all(work).await;

        let mut symbols = Vec::new();
        let mut origins: Vec<(String, String)> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(resolved) => match resolved.symbol {
                    Some(symbol) if !symbol.trim().is_empty() => {
                        let symbol = symbol.to_uppercase();
                        origins.push((symbol.clone(), query.clone()));
                        symbols.push(symbol);
                    }
                    _ => {
                        let text = resolved.error.unwrap_or_else(|| {
                            format!("Unable to lookup ticker: {query}")
                        });
                        // Failed resolutions are keyed by what the user typed.
                        HandlerOutput::put(&mut errors, query.clone(), text);
                    }
                },
                Err(error) => {
                    tracing::error!(query = %query, %error, "name lookup failed");
                    HandlerOutput::put(&mut errors, query.clone(), format!("Unable to lookup ticker: {query}"));
                }
            }
        }

        if symbols.is_empty() {
            return Some(HandlerOutput::messages(errors));
        }

        let mut messages = match self.provider.quotes(&symbols).await {
            Ok(responses) => {
                let mut messages = Vec::new();
                for response in responses {
                    let rendered = match (&response.quote, &response.error) {
                        (Some(quote), _) => render::quote_block(quote),
                        (None, Some(error)) => error.clone(),
                        (None, None) => format!("Unable to find data for: {}", response.symbol),
                    };
                    // Show what the guess was resolved from.
                    let text = match origins
                        .iter()
                        .find(|(symbol, _)| *symbol == response.symbol)
                    {
                        Some((_, query)) => {
                            format!("Best guess for: {}\n{rendered}", render::code(query))
                        }
                        None => rendered,
                    };
                    HandlerOutput::put(&mut messages, response.symbol, text);
                }
                messages
            }
            Err(error) => {
                tracing::error!(%error, "quote lookup for resolved symbols failed");
                return Some(HandlerOutput::error(format!("Error getting quotes: {error}")));
            }
        };

        for (key, text) in errors {
            HandlerOutput::put(&mut messages, key, text);
        }

        Some(HandlerOutput::messages(messages))
    }
}
