//! Token lifetime grammar.
//!
//! Accepts strings such as `"7d"`, `"1h"`, `"90 minutes"`, `"1.5h"`, `"0s"`,
//! `"-1h"` or `"2 days ago"`. Units are case-insensitive. A year is 365.25 days.
//! Zero and negative lifetimes are valid and produce already-expired tokens.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{TokenError, TokenResult};

const MINUTE: f64 = 60.0;
const HOUR: f64 = MINUTE * 60.0;
const DAY: f64 = HOUR * 24.0;
const WEEK: f64 = DAY * 7.0;
const YEAR: f64 = DAY * 365.25;

static TTL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)^([+-])? ?(\d+|\d+\.\d+) ?(seconds?|secs?|s|minutes?|mins?|m|hours?|hrs?|h|days?|d|weeks?|w|years?|yrs?|y)(?: (ago|from now))?$",
    )
    .ok()
});

/// Parse a lifetime expression into whole seconds (rounded to nearest).
pub fn parse_ttl(input: &str) -> TokenResult<i64> {
    let invalid = || TokenError::InvalidTtl(input.to_string());
    let pattern = TTL_PATTERN.as_ref().ok_or_else(invalid)?;
    let captures = pattern.captures(input.trim()).ok_or_else(invalid)?;

    let amount: f64 = captures
        .get(2)
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(invalid)?;
    let unit = captures
        .get(3)
        .map(|m| m.as_str().to_ascii_lowercase())
        .ok_or_else(invalid)?;

    let multiplier = match unit.as_str() {
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => MINUTE,
        "h" | "hr" | "hrs" | "hour" | "hours" => HOUR,
        "d" | "day" | "days" => DAY,
        "w" | "week" | "weeks" => WEEK,
        _ => YEAR,
    };
    let seconds = (amount * multiplier).round() as i64;

    let minus = captures.get(1).is_some_and(|m| m.as_str() == "-");
    let suffix = captures.get(4).map(|m| m.as_str().to_ascii_lowercase());
    match (minus, suffix.as_deref()) {
        // "-1h ago" is ambiguous
        (true, Some(_)) => Err(invalid()),
        (true, None) | (false, Some("ago")) => Ok(-seconds),
        _ => Ok(seconds),
    }
}
