//! Discord markdown rendering for quotes, news, option chains, and help.
//!
//! Pure functions only. Everything here returns a String ready to post.

use crate::providers::{MarketSession, OptionContract, Quote};

const NBSP: char = '\u{a0}';

const STRIKE_LABEL: &str = "STRIKE ";
const BID_LABEL: &str = "BID   ";
const ASK_LABEL: &str = "ASK   ";
const VOLUME_LABEL: &str = "VOLUME";
const IV_LABEL: &str = "IV    ";

pub fn bold(text: &str) -> String {
    format!("**{text}**")
}

pub fn italic(text: &str) -> String {
    format!("*{text}*")
}

pub fn code(text: &str) -> String {
    format!("`{text}`")
}

pub fn code_block(language: &str, body: &str) -> String {
    format!("```{language}\n{body}\n```")
}

fn direction(amount: f64) -> &'static str {
    if amount == 0.0 {
        ""
    } else if amount > 0.0 {
        "+"
    } else {
        "-"
    }
}

fn session_lines(session: &MarketSession) -> String {
    format!(
        "{:.2}\n{} {:.2} [{:.2}%]",
        session.price,
        direction(session.change_amount),
        session.change_amount.abs(),
        session.change_percent.abs()
    )
}

/// Render one quote as a symbol/company header plus a diff-highlighted
/// price block.
pub fn quote_block(quote: &Quote) -> String {
    let header = format!(
        "{}{NBSP}{NBSP}{NBSP}{NBSP}{}",
        bold(&quote.symbol),
        italic(&quote.company)
    );

    let mut body = session_lines(&quote.regular);
    if let Some(after_hours) = &quote.after_hours {
        body.push_str("\n\n(After Hours)\n");
        body.push_str(&session_lines(after_hours));
    }

    format!("\n{header}\n{}", code_block("diff", &body))
}

/// Render the news section for one symbol.
pub fn news_block(symbol: &str, links: &[String], error: Option<&str>) -> String {
    let mut message = String::new();
    message.push('\n');
    message.push_str(&bold("News"));
    message.push('\n');
    match error {
        Some(_) => {
            message.push_str(&format!("Unable to find news for: {symbol}\n"));
        }
        None if links.is_empty() => {
            message.push_str(&format!("Unable to find news for: {symbol}\n"));
        }
        None => {
            for link in links {
                message.push_str(link);
                message.push('\n');
            }
        }
    }
    message
}

fn option_row(contract: &OptionContract) -> String {
    let marker = if contract.in_the_money { "#" } else { " " };
    format!(
        "{marker}{:<width_strike$} {:<width_bid$} {:<width_ask$} {:<width_vol$} {:<width_iv$}",
        format!("{:.2}", contract.strike),
        format!("{:.2}", contract.bid),
        format!("{:.2}", contract.ask),
        contract.volume,
        format!("{:.2}", contract.implied_volatility),
        width_strike = STRIKE_LABEL.len(),
        width_bid = BID_LABEL.len(),
        width_ask = ASK_LABEL.len(),
        width_vol = VOLUME_LABEL.len(),
        width_iv = IV_LABEL.len(),
    )
}

/// Render one expiration date's contracts as an md table. Rows arrive
/// already ordered; in-the-money rows get the `#` header marker.
pub fn option_chain_block(kind: &str, date: &str, rows: &[OptionContract]) -> String {
    let mut body = format!("{kind}\n\n{date}\n\n");
    body.push_str(&format!(
        " {STRIKE_LABEL} {BID_LABEL} {ASK_LABEL} {VOLUME_LABEL} {IV_LABEL}"
    ));
    for contract in rows {
        body.push('\n');
        body.push_str(&option_row(contract));
    }
    format!("\n{}", code_block("md", &body))
}

/// Watch notification mentioning the requesting user.
pub fn notify(user_id: u64, symbol: &str, point: f64, price: f64, above: bool) -> String {
    format!(
        "<@!{user_id}> {symbol} has passed the {} point of {point:.2}, reaching {price:.2}",
        if above { "high" } else { "low" }
    )
}

/// The help block, parameterized on the configured prefix.
pub fn help_text(prefix: &str) -> String {
    let body = format!(
        r#"Beep Boop.

[COMMANDS]
{prefix}                         This help.
{prefix}{prefix}                        This help.
{prefix} SYMBOL... [OPTION...]   Price information for <SYMBOL>
{prefix}{prefix} QUERY [OPTION...]      Query results for <QUERY>
{prefix}{prefix}{prefix} SYMBOL [OPTION...]     Recommended tickers related to <SYMBOL>

[OPTIONS]
news                      Get recent news for a <SYMBOL> or <QUERY>
watch[LOW|HIGH]           Watch the <SYMBOL> for if/when it crosses the <LOW> or <HIGH> points
stopwatch                 Stop watching the <SYMBOL>
options[WEEK]             Option chain for the <SYMBOL>, <WEEK> weeks out
rec                       Recommended tickers related to the <SYMBOL>

An OPTION can be added to a COMMAND by appending it with ':'

[EXAMPLE]
{prefix}MSFT                     Gets price information for MSFT
{prefix}{prefix}Microsoft Corporation   Reverse lookup a symbol for 'Microsoft Corporation' and gets price information.
{prefix}AAPL:news                Gets price information and news for AAPL
{prefix}AAPL:watch[100|200]      Gets price information for AAPL and watches the 100 and 200 price points.
{prefix}{prefix}{prefix}TSLA                   Gets price information for tickers related to TSLA."#
    );
    code_block("", &body)
}
