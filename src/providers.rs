//! Market data and news provider capabilities.
//!
//! Handlers consume these traits; provider payloads are decoded into the
//! typed structs here at the lookup boundary so the rest of the bot never
//! touches raw wire shapes.

pub mod yahoo;

use crate::error::Result;

/// A single price sample for one market session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSession {
    pub price: f64,
    pub change_amount: f64,
    pub change_percent: f64,
}

/// A resolved stock quote.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub company: String,
    pub regular: MarketSession,
    pub after_hours: Option<MarketSession>,
}

impl Quote {
    /// The freshest known price: after-hours when present.
    pub fn latest_price(&self) -> f64 {
        self.after_hours
            .map(|session| session.price)
            .unwrap_or(self.regular.price)
    }
}

/// Per-symbol quote lookup result. `quote` and `error` are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    pub symbol: String,
    pub quote: Option<Quote>,
    pub error: Option<String>,
}

/// Company-name to ticker resolution result.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupResponse {
    pub query: String,
    pub symbol: Option<String>,
    pub error: Option<String>,
}

/// Related-symbol recommendation result for one seed symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendResponse {
    pub symbol: String,
    pub recommended: Vec<String>,
    pub error: Option<String>,
}

/// Headline links for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsResponse {
    pub symbol: String,
    pub links: Vec<String>,
    pub error: Option<String>,
}

/// One option contract row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionContract {
    pub strike: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume: u64,
    pub implied_volatility: f64,
    pub in_the_money: bool,
}

/// All contracts sharing one expiration date.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionExpiration {
    /// Formatted as yyyy-mm-dd.
    pub date: String,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
}

/// Option chain for one symbol over one week.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionChainResponse {
    pub symbol: String,
    pub underlying_price: f64,
    pub expirations: Vec<OptionExpiration>,
}

/// Market data lookup capability.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Quote lookup for a batch of symbols. Unknown symbols come back as
    /// per-symbol errors, not a batch failure.
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteResponse>>;

    /// Resolve a free-text company name to a ticker.
    async fn search(&self, query: &str) -> Result<LookupResponse>;

    /// Related-symbol recommendations for one seed symbol.
    async fn recommendations(&self, symbol: &str) -> Result<RecommendResponse>;

    /// Recent headline links per symbol.
    async fn news(&self, symbols: &[String]) -> Result<Vec<NewsResponse>>;

    /// Option chain for the week `week_offset` weeks from now.
    async fn option_chain(&self, symbol: &str, week_offset: u32) -> Result<OptionChainResponse>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::error::LookupError;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// Scriptable in-memory provider shared by handler tests.
    #[derive(Default)]
    pub struct MockProvider {
        quotes: HashMap<String, Quote>,
        lookups: HashMap<String, String>,
        recommendations: HashMap<String, Vec<String>>,
        news_links: HashMap<String, Vec<String>>,
        chains: HashMap<String, OptionChainResponse>,
        fail: bool,
        quote_calls: Mutex<Vec<Vec<String>>>,
    }

    impl MockProvider {
        pub fn with_quote(mut self, symbol: &str, price: f64) -> Self {
            self.quotes.insert(
                symbol.to_string(),
                Quote {
                    symbol: symbol.to_string(),
                    company: format!("{symbol} Inc."),
                    regular: MarketSession {
                        price,
                        change_amount: 1.0,
                        change_percent: 1.0,
                    },
                    after_hours: None,
                },
            );
            self
        }

        pub fn with_lookup(mut self, query: &str, symbol: &str) -> Self {
            self.lookups.insert(query.to_string(), symbol.to_string());
            self
        }

        pub fn with_recommendations(mut self, seed: &str, recommended: &[&str]) -> Self {
            self.recommendations.insert(
                seed.to_string(),
                recommended.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        pub fn with_news(mut self, symbol: &str, links: &[&str]) -> Self {
            self.news_links.insert(
                symbol.to_string(),
                links.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        pub fn with_chain(mut self, response: OptionChainResponse) -> Self {
            self.chains.insert(response.symbol.clone(), response);
            self
        }

        /// Every call fails at the transport level.
        pub fn failing(mut self) -> Self {
            self.fail = true;
            self
        }

        pub fn quote_calls(&self) -> Vec<Vec<String>> {
            self.quote_calls.lock().clone()
        }

        fn fail_if_scripted(&self) -> Result<()> {
            if self.fail {
                Err(LookupError::MalformedResponse("mock provider failure".into()).into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for MockProvider {
        async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteResponse>> {
            self.fail_if_scripted()?;
            self.quote_calls.lock().push(symbols.to_vec());
            Ok(symbols
                .iter()
                .map(|symbol| match self.quotes.get(symbol) {
                    Some(quote) => QuoteResponse {
                        symbol: symbol.clone(),
                        quote: Some(quote.clone()),
                        error: None,
                    },
                    None => QuoteResponse {
                        symbol: symbol.clone(),
                        quote: None,
                        error: Some(format!("Unable to find quote for: **{symbol}**")),
                    },
                })
                .collect())
        }

        async fn search(&self, query: &str) -> Result<LookupResponse> {
            self.fail_if_scripted()?;
            Ok(match self.lookups.get(query) {
                Some(symbol) => LookupResponse {
                    query: query.to_string(),
                    symbol: Some(symbol.clone()),
                    error: None,
                },
                None => LookupResponse {
                    query: query.to_string(),
                    symbol: None,
                    error: Some(format!("Unable to find stock ticker for **{query}**")),
                },
            })
        }

        async fn recommendations(&self, symbol: &str) -> Result<RecommendResponse> {
            self.fail_if_scripted()?;
            Ok(match self.recommendations.get(symbol) {
                Some(recommended) => RecommendResponse {
                    symbol: symbol.to_string(),
                    recommended: recommended.clone(),
                    error: None,
                },
                None => RecommendResponse {
                    symbol: symbol.to_string(),
                    recommended: Vec::new(),
                    error: Some(format!("Unable to get recommendation: **{symbol}**")),
                },
            })
        }

        async fn news(&self, symbols: &[String]) -> Result<Vec<NewsResponse>> {
            self.fail_if_scripted()?;
            Ok(symbols
                .iter()
                .map(|symbol| NewsResponse {
                    symbol: symbol.clone(),
                    links: self.news_links.get(symbol).cloned().unwrap_or_default(),
                    error: None,
                })
                .collect())
        }

        async fn option_chain(&self, symbol: &str, _week_offset: u32) -> Result<OptionChainResponse> {
            self.fail_if_scripted()?;
            self.chains
                .get(symbol)
                .cloned()
                .ok_or_else(|| {
                    LookupError::NotFound {
                        symbol: symbol.to_string(),
                    }
                    .into()
                })
        }
    }
}
