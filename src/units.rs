//! Unit normalization for listing cells: compact durations, start timestamps
//! and dollar amounts.

use chrono::{Duration, NaiveDateTime};

pub const START_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

const HOURS_PER_WEEK: f64 = 7.0 * 24.0;
const HOURS_PER_DAY: f64 = 24.0;
const MINUTES_PER_HOUR: f64 = 60.0;

/// Parse a compact duration such as `1w2d3h30m` or `45min` into hours.
pub fn parse_duration(input: &str) -> Result<f64, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("empty duration".to_string());
    }

    let mut total = 0.0;
    let mut rest = s;
    while !rest.is_empty() {
        rest = rest.trim_start();
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(format!("bad duration {:?}: expected a number at {:?}", input, rest));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|e| format!("bad duration {:?}: {}", input, e))?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let (unit, tail) = rest.split_at(unit_len);
        let hours = match unit {
            "w" => value as f64 * HOURS_PER_WEEK,
            "d" => value as f64 * HOURS_PER_DAY,
            "h" => value as f64,
            "m" | "min" => value as f64 / MINUTES_PER_HOUR,
            "" => return Err(format!("bad duration {:?}: {} has no unit", input, value)),
            other => return Err(format!("bad duration {:?}: unknown unit {:?}", input, other)),
        };
        total += hours;
        rest = tail;
    }
    Ok(total)
}

/// Parse a listing start time. Locale formatters sometimes emit invisible
/// separators (U+202F before AM/PM); on failure those are dropped and the
/// parse is retried once.
pub fn parse_start(input: &str) -> Result<NaiveDateTime, String> {
    let s = input.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, START_FORMAT) {
        return Ok(dt);
    }
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_digit() || "/:, AMP".contains(*c))
        .collect();
    NaiveDateTime::parse_from_str(cleaned.trim(), START_FORMAT)
        .map_err(|e| format!("bad start time {:?}: {}", input, e))
}

/// Parse a dollar amount like `$1,234.50`.
pub fn parse_price(input: &str) -> Result<f64, String> {
    let cleaned: String = input.trim().chars().filter(|c| *c != '$' && *c != ',').collect();
    cleaned
        .parse::<f64>()
        .map_err(|e| format!("bad price {:?}: {}", input, e))
}

/// Convert fractional hours into a chrono duration, rounded to the second.
/// `None` when the span is not finite or beyond what chrono can represent.
pub fn hours_to_duration(hours: f64) -> Option<Duration> {
    let secs = (hours * 3600.0).round();
    if !secs.is_finite() || secs.abs() >= i64::MAX as f64 {
        return None;
    }
    Duration::try_seconds(secs as i64)
}
