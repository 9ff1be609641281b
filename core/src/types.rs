//! Shared primitive types used across the fare engine.

use chrono::{NaiveDate, NaiveDateTime};

/// A signed amount of money in cents. Card balances may go negative.
pub type Cents = i64;

/// A tap timestamp. Tap logs carry local wall-clock time, no zone.
pub type Timestamp = NaiveDateTime;

/// The key the metrics aggregator partitions its totals by.
pub type DateKey = NaiveDate;

/// The canonical run identifier.
pub type RunId = String;

/// Format cents as a dollar string, e.g. `-125` -> `-$1.25`.
pub fn format_cents(amount: Cents) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

/// Parse a dollar amount such as `19`, `12.5` or `0.01` into cents.
pub fn parse_dollars(text: &str) -> Option<Cents> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };
    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(if negative { -cents } else { cents })
}
