//! Yahoo Finance provider: quotes, search, recommendations, news, options.

use crate::error::{LookupError, Result};
use crate::providers::{
    LookupResponse, MarketDataProvider, MarketSession, NewsResponse, OptionChainResponse,
    OptionContract, OptionExpiration, Quote, QuoteResponse, RecommendResponse,
};
use crate::render;
use chrono::{Datelike, Duration, TimeZone, Utc};
use serde::Deserialize;

const QUOTE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";
const SEARCH_URL: &str = "https://query1.finance.yahoo.com/v1/finance/search";
const RECOMMEND_URL: &str = "https://query1.finance.yahoo.com/v6/finance/recommendationsbysymbol";
const OPTIONS_URL: &str = "https://query1.finance.yahoo.com/v7/finance/options";

pub struct YahooProvider {
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tickerbot")
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .map_err(LookupError::Request)?;
        Ok(Self { client })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(LookupError::Request)?
            .error_for_status()
            .map_err(LookupError::Request)?;

        Ok(response.json::<T>().await.map_err(LookupError::Request)?)
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for YahooProvider {
    async fn quotes(&self, symbols: &[String]) -> Result<Vec<QuoteResponse>> {
        let joined = symbols.join(",");
        let envelope: QuoteEnvelope = self
            .get_json(QUOTE_URL, &[("symbols", joined), ("formatted", "false".into())])
            .await?;

        let raw = envelope.quote_response.result;
        let mut responses = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let found = raw
                .iter()
                .find(|quote| quote.symbol.eq_ignore_ascii_case(symbol));
            responses.push(match found.and_then(RawQuote::decode) {
                Some(quote) => QuoteResponse {
                    symbol: symbol.clone(),
                    quote: Some(quote),
                    error: None,
                },
                None => QuoteResponse {
                    symbol: symbol.clone(),
                    quote: None,
                    error: Some(format!(
                        "Unable to find quote for: {}",
                        render::bold(symbol)
                    )),
                },
            });
        }

        Ok(responses)
    }

    async fn search(&self, query: &str) -> Result<LookupResponse> {
        let envelope: SearchEnvelope = self
            .get_json(
                SEARCH_URL,
                &[
                    ("q", query.to_string()),
                    ("quotesCount", "6".into()),
                    ("newsCount", "0".into()),
                ],
            )
            .await?;

        let mut equities: Vec<_> = envelope
            .quotes
            .into_iter()
            .filter(|hit| hit.score.unwrap_or(0.0) > 0.0 && hit.symbol.is_some())
            .collect();
        equities.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });

        match equities.into_iter().next().and_then(|hit| hit.symbol) {
            Some(symbol) => Ok(LookupResponse {
                query: query.to_string(),
                symbol: Some(symbol.to_uppercase()),
                error: None,
            }),
            None => Ok(LookupResponse {
                query: query.to_string(),
                symbol: None,
                error: Some(format!(
                    "Unable to find stock ticker for {}",
                    render::bold(query)
                )),
            }),
        }
    }

    async fn recommendations(&self, symbol: &str) -> Result<RecommendResponse> {
        let url = format!("{RECOMMEND_URL}/{symbol}");
        let envelope: RecommendEnvelope = self.get_json(&url, &[]).await?;

        let recommended: Vec<String> = envelope
            .finance
            .result
            .into_iter()
            .flat_map(|entry| entry.recommended_symbols)
            .map(|hit| hit.symbol.to_uppercase())
            .collect();

        if recommended.is_empty() {
            return Ok(RecommendResponse {
                symbol: symbol.to_string(),
                recommended,
                error: Some(format!(
                    "Unable to get recommendation: {}",
                    render::bold(symbol)
                )),
            });
        }

        Ok(RecommendResponse {
            symbol: symbol.to_string(),
            recommended,
            error: None,
        })
    }

    async fn news(&self, symbols: &[String]) -> Result<Vec<NewsResponse>> {
        let mut responses = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let envelope: std::result::Result<SearchEnvelope, _> = self
                .get_json(
                    SEARCH_URL,
                    &[
                        ("q", format!("{symbol} stock")),
                        ("quotesCount", "0".into()),
                        ("newsCount", "5".into()),
                    ],
                )
                .await
                .map_err(|error| {
                    tracing::error!(%symbol, %error, "news lookup failed");
                    error
                });

            responses.push(match envelope {
                Ok(envelope) => {
                    let links: Vec<String> = envelope
                        .news
                        .into_iter()
                        .filter_map(|item| item.link)
                        .take(5)
                        .collect();
                    NewsResponse {
                        symbol: symbol.clone(),
                        links,
                        error: None,
                    }
                }
                Err(error) => NewsResponse {
                    symbol: symbol.clone(),
                    links: Vec::new(),
                    error: Some(error.to_string()),
                },
            });
        }

        Ok(responses)
    }

    async fn option_chain(&self, symbol: &str, week_offset: u32) -> Result<OptionChainResponse> {
        let url = format!("{OPTIONS_URL}/{symbol}");
        let envelope: OptionsEnvelope = self.get_json(&url, &[]).await?;

        let chain = envelope
            .option_chain
            .result
            .into_iter()
            .next()
            .ok_or_else(|| LookupError::NotFound {
                symbol: symbol.to_string(),
            })?;

        let underlying_price = chain
            .quote
            .as_ref()
            .and_then(|quote| quote.regular_market_price)
            .ok_or_else(|| {
                LookupError::MalformedResponse(format!("no underlying price for {symbol}"))
            })?;

        // Pick the expirations falling inside the requested week.
        let (week_start, week_end) = week_bounds(week_offset);
        let target_dates: Vec<i64> = chain
            .expiration_dates
            .iter()
            .copied()
            .filter(|epoch| (week_start..=week_end).contains(epoch))
            .collect();

        let mut expirations = Vec::new();
        for epoch in target_dates {
            let envelope: OptionsEnvelope = self
                .get_json(&url, &[("date", epoch.to_string())])
                .await?;
            let Some(chain) = envelope.option_chain.result.into_iter().next() else {
                continue;
            };
            for raw in chain.options {
                expirations.push(OptionExpiration {
                    date: format_expiration(raw.expiration_date),
                    calls: raw.calls.iter().filter_map(RawContract::decode).collect(),
                    puts: raw.puts.iter().filter_map(RawContract::decode).collect(),
                });
            }
        }

        Ok(OptionChainResponse {
            symbol: symbol.to_uppercase(),
            underlying_price,
            expirations,
        })
    }
}

/// Unix-epoch bounds of the week `offset` weeks from now (Monday..Sunday).
fn week_bounds(offset: u32) -> (i64, i64) {
    let target = Utc::now() + Duration::weeks(i64::from(offset));
    let days_from_monday = i64::from(target.weekday().num_days_from_monday());
    let monday = (target - Duration::days(days_from_monday))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default();
    let start = Utc.from_utc_datetime(&monday).timestamp();
    let end = start + Duration::days(7).num_seconds() - 1;
    (start, end)
}

fn format_expiration(epoch: i64) -> String {
    match Utc.timestamp_opt(epoch, 0).single() {
        Some(datetime) => datetime.format("%Y-%m-%d").to_string(),
        None => epoch.to_string(),
    }
}

// Wire shapes, decoded here and nowhere else.

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResult,
}

#[derive(Debug, Deserialize)]
struct QuoteResult {
    #[serde(default)]
    result: Vec<RawQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuote {
    symbol: String,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_change: Option<f64>,
    regular_market_change_percent: Option<f64>,
    post_market_price: Option<f64>,
    post_market_change: Option<f64>,
    post_market_change_percent: Option<f64>,
}

impl RawQuote {
    fn decode(&self) -> Option<Quote> {
        let company = self
            .short_name
            .clone()
            .or_else(|| self.long_name.clone())?;
        let regular = MarketSession {
            price: self.regular_market_price?,
            change_amount: self.regular_market_change?,
            change_percent: self.regular_market_change_percent?,
        };

        let after_hours = match (
            self.post_market_price,
            self.post_market_change,
            self.post_market_change_percent,
        ) {
            (Some(price), Some(change_amount), Some(change_percent)) => Some(MarketSession {
                price,
                change_amount,
                change_percent,
            }),
            _ => None,
        };

        Some(Quote {
            symbol: self.symbol.to_uppercase(),
            company,
            regular,
            after_hours,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    quotes: Vec<SearchHit>,
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    symbol: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecommendEnvelope {
    finance: RecommendFinance,
}

#[derive(Debug, Deserialize)]
struct RecommendFinance {
    #[serde(default)]
    result: Vec<RecommendResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendResult {
    #[serde(default)]
    recommended_symbols: Vec<RecommendHit>,
}

#[derive(Debug, Deserialize)]
struct RecommendHit {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct OptionsEnvelope {
    #[serde(rename = "optionChain")]
    option_chain: OptionsResult,
}

#[derive(Debug, Deserialize)]
struct OptionsResult {
    #[serde(default)]
    result: Vec<RawChain>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawChain {
    quote: Option<RawUnderlying>,
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<RawExpiration>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUnderlying {
    regular_market_price: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExpiration {
    expiration_date: i64,
    #[serde(default)]
    calls: Vec<RawContract>,
    #[serde(default)]
    puts: Vec<RawContract>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    strike: Option<f64>,
    bid: Option<f64>,
    ask: Option<f64>,
    volume: Option<u64>,
    implied_volatility: Option<f64>,
    #[serde(default)]
    in_the_money: bool,
}

impl RawContract {
    fn decode(&self) -> Option<OptionContract> {
        Some(OptionContract {
            strike: self.strike?,
            bid: self.bid.unwrap_or(0.0),
            ask: self.ask.unwrap_or(0.0),
            volume: self.volume.unwrap_or(0),
            implied_volatility: self.implied_volatility.unwrap_or(0.0),
            in_the_money: self.in_the_money,
        })
    }
}
