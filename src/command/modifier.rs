//! Colon-suffix modifier parsing.
//!
//! The substring after a token's first colon is upper-cased and comma-split
//! into words. Each word is tokenized once into a keyword plus optional
//! bracket arguments, then matched against a closed keyword set. Unknown
//! keywords are ignored so old bots tolerate new grammar.

/// Modifier flags attached to a single command token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenModifier {
    pub news: bool,
    pub watch: Option<WatchBounds>,
    pub stop_watch: bool,
    pub option_chain: Option<OptionChainRequest>,
    pub recommend: bool,
}

/// Low and high alert points for a watch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WatchBounds {
    pub low: f64,
    pub high: f64,
}

/// Option chain request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionChainRequest {
    /// 0 = the current week.
    pub week_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    News,
    StopWatch,
    Watch,
    Options,
    Recommend,
}

impl Keyword {
    fn parse(word: &str) -> Option<Self> {
        match word {
            "NEWS" => Some(Keyword::News),
            "STOPWATCH" => Some(Keyword::StopWatch),
            "WATCH" => Some(Keyword::Watch),
            "OPTIONS" => Some(Keyword::Options),
            "REC" => Some(Keyword::Recommend),
            _ => None,
        }
    }
}

/// One modifier word split into keyword text and bracket arguments.
#[derive(Debug, PartialEq, Eq)]
struct ModifierWord {
    keyword: String,
    bracket_args: Option<String>,
}

fn tokenize(raw: &str) -> Vec<ModifierWord> {
    raw.split(',')
        .map(|word| word.trim().to_uppercase())
        .filter(|word| !word.is_empty())
        .map(|word| match word.split_once('[') {
            Some((keyword, args)) => ModifierWord {
                keyword: keyword.to_string(),
                bracket_args: Some(args.strip_suffix(']').unwrap_or(args).to_string()),
            },
            None => ModifierWord {
                keyword: word,
                bracket_args: None,
            },
        })
        .collect()
}

/// Parse the modifier substring of a token. `raw` is the text after the
/// first colon; `None` or malformed sections degrade to defaults.
pub fn parse(symbol: &str, raw: Option<&str>) -> TokenModifier {
    let Some(raw) = raw else {
        return TokenModifier::default();
    };

    let mut modifier = TokenModifier::default();
    for word in tokenize(raw) {
        let Some(keyword) = Keyword::parse(&word.keyword) else {
            tracing::debug!(symbol, word = %word.keyword, "ignoring unknown modifier keyword");
            continue;
        };

        match keyword {
            Keyword::News => modifier.news = true,
            Keyword::StopWatch => modifier.stop_watch = true,
            Keyword::Recommend => modifier.recommend = true,
            Keyword::Watch => modifier.watch = parse_watch(symbol, word.bracket_args.as_deref()),
            Keyword::Options => {
                modifier.option_chain = parse_options(symbol, word.bracket_args.as_deref());
            }
        }
    }

    modifier
}

/// `WATCH[low|high]`: both values must parse as non-negative numbers, else
/// the watch request is dropped.
fn parse_watch(symbol: &str, args: Option<&str>) -> Option<WatchBounds> {
    let Some(args) = args else {
        tracing::warn!(symbol, "WATCH missing values section");
        return None;
    };

    let mut parts = args.split('|');
    let (Some(low), Some(high), None) = (parts.next(), parts.next(), parts.next()) else {
        tracing::warn!(symbol, args, "WATCH expects exactly low|high");
        return None;
    };

    let low = parse_bound(low)?;
    let high = parse_bound(high)?;
    Some(WatchBounds { low, high })
}

fn parse_bound(raw: &str) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    if value.is_finite() && value >= 0.0 {
        Some(value)
    } else {
        None
    }
}

/// `OPTIONS` or `OPTIONS[week-offset]`: the offset defaults to 0 and must
/// be a non-negative number.
fn parse_options(symbol: &str, args: Option<&str>) -> Option<OptionChainRequest> {
    let raw = match args {
        None => return Some(OptionChainRequest { week_offset: 0 }),
        Some(raw) => raw.trim(),
    };

    if raw.is_empty() {
        return Some(OptionChainRequest { week_offset: 0 });
    }

    match raw.parse::<i64>() {
        Ok(offset) if offset >= 0 => Some(OptionChainRequest {
            week_offset: offset as u32,
        }),
        _ => {
            tracing::warn!(symbol, args = raw, "OPTIONS invalid week offset");
            None
        }
    }
}
