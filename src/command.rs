//! Command grammar: raw message text to a structured command.
//!
//! A message is whitespace-tokenized and every token keeps its leading
//! prefix repetitions. Dispatch later decides handler applicability by
//! counting leading prefixes on each token, not on the message as a whole,
//! so one message can mix quote, lookup, and recommendation tokens.

pub mod modifier;

use modifier::TokenModifier;

/// A parsed inbound command.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub is_help: bool,
    pub tokens: Vec<String>,
}

impl Command {
    pub fn help() -> Self {
        Self {
            is_help: true,
            tokens: Vec::new(),
        }
    }
}

/// A single prefixed token, split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToken {
    /// Leading prefix repetitions (1 = quote, 2 = name lookup, 3 = recommendation).
    pub prefix_count: usize,
    /// Symbol portion, prefixes stripped and upper-cased.
    pub symbol: String,
    /// Modifier flags from the colon suffix.
    pub modifier: TokenModifier,
}

/// Parse raw message content against the configured prefix.
pub fn parse(prefix: &str, content: &str) -> Command {
    let trimmed = content.trim();

    // A message of nothing but repeated prefixes asks for help.
    if is_only_prefixes(prefix, trimmed) {
        return Command::help();
    }

    let mut tokens = Vec::new();
    let mut prefixed = 0usize;
    for raw in trimmed.split_whitespace() {
        if raw.starts_with(prefix) {
            let symbol = symbol_portion(prefix, raw);
            if symbol.is_empty() {
                // Bare prefixes mixed into a longer message carry nothing.
                continue;
            }
            // Tickers are never numeric in this grammar.
            if symbol.chars().any(|c| c.is_ascii_digit()) {
                tracing::warn!(token = raw, "dropping token with digits in symbol");
                continue;
            }
            prefixed += 1;
        }
        // Unprefixed tokens are kept: they may belong to a reverse-lookup query.
        tokens.push(raw.to_string());
    }

    if prefixed == 0 {
        return Command::help();
    }

    Command {
        is_help: false,
        tokens,
    }
}

/// Count leading repetitions of the prefix on a token.
pub fn prefix_count(prefix: &str, token: &str) -> usize {
    let mut rest = token;
    let mut count = 0;
    while let Some(stripped) = rest.strip_prefix(prefix) {
        rest = stripped;
        count += 1;
    }
    count
}

/// The symbol text of a token: prefixes stripped, anything after the first
/// colon removed.
pub fn symbol_portion<'a>(prefix: &str, token: &'a str) -> &'a str {
    let mut rest = token;
    while let Some(stripped) = rest.strip_prefix(prefix) {
        rest = stripped;
    }
    match rest.split_once(':') {
        Some((symbol, _)) => symbol,
        None => rest,
    }
}

/// The modifier text of a token: everything after the first colon.
pub fn modifier_portion<'a>(prefix: &str, token: &'a str) -> Option<&'a str> {
    let mut rest = token;
    while let Some(stripped) = rest.strip_prefix(prefix) {
        rest = stripped;
    }
    rest.split_once(':').map(|(_, raw)| raw)
}

/// Split a prefixed token into its parts. Returns `None` for unprefixed tokens.
pub fn parse_token(prefix: &str, token: &str) -> Option<ParsedToken> {
    let count = prefix_count(prefix, token);
    if count == 0 {
        return None;
    }

    let symbol = symbol_portion(prefix, token);
    if symbol.is_empty() {
        return None;
    }

    Some(ParsedToken {
        prefix_count: count,
        symbol: symbol.to_uppercase(),
        modifier: modifier::parse(symbol, modifier_portion(prefix, token)),
    })
}

fn is_only_prefixes(prefix: &str, trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return false;
    }
    let mut rest = trimmed;
    while let Some(stripped) = rest.strip_prefix(prefix) {
        rest = stripped;
    }
    rest.is_empty()
}
