//! NYSE market hours: weekends, a static holiday table, and the
//! 09:00-16:00 Eastern trading window.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

/// Recognized full-day market holidays, keyed (year, month, day).
const HOLIDAYS: &[((i32, u32, u32), &str)] = &[
    ((2025, 1, 1), "New Years Day"),
    ((2025, 1, 20), "Martin Luther King, Jr. Day"),
    ((2025, 2, 17), "Washington's Birthday"),
    ((2025, 4, 18), "Good Friday"),
    ((2025, 5, 26), "Memorial Day"),
    ((2025, 6, 19), "Juneteenth"),
    ((2025, 7, 4), "Independence Day"),
    ((2025, 9, 1), "Labor Day"),
    ((2025, 11, 27), "Thanksgiving Day"),
    ((2025, 12, 25), "Christmas Day"),
    ((2026, 1, 1), "New Years Day"),
    ((2026, 1, 19), "Martin Luther King, Jr. Day"),
    ((2026, 2, 16), "Washington's Birthday"),
    ((2026, 4, 3), "Good Friday"),
    ((2026, 5, 25), "Memorial Day"),
    ((2026, 6, 19), "Juneteenth"),
    ((2026, 7, 3), "Independence Day"),
    ((2026, 9, 7), "Labor Day"),
    ((2026, 11, 26), "Thanksgiving Day"),
    ((2026, 12, 25), "Christmas Day"),
];

fn which_holiday(date: &DateTime<Tz>) -> Option<&'static str> {
    let key = (date.year(), date.month(), date.day());
    HOLIDAYS
        .iter()
        .find(|(holiday, _)| *holiday == key)
        .map(|(_, name)| *name)
}

fn is_open_at(date: &DateTime<Tz>) -> bool {
    if which_holiday(date).is_some() {
        return false;
    }

    let weekday = date.weekday();
    if weekday == Weekday::Sat || weekday == Weekday::Sun {
        return false;
    }

    (9..16).contains(&date.hour())
}

/// Whether the market is open right now.
pub fn is_market_open() -> bool {
    is_open_at(&Utc::now().with_timezone(&New_York))
}

/// Human status line for the bot activity, e.g. "Market Closed for
/// Thanksgiving Day".
pub fn status_line() -> String {
    let now = Utc::now().with_timezone(&New_York);
    let holiday = which_holiday(&now);
    let open = is_open_at(&now);
    match holiday {
        Some(name) if !open => format!("Market Closed for {name}"),
        _ if open => "Market Open".into(),
        _ => "Market Closed".into(),
    }
}
