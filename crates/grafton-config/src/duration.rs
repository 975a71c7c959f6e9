// crates/grafton-config/src/duration.rs
// ============================================================================
// Module: Duration Strings
// Description: Parser for unit-suffixed duration strings such as `1h30m`.
// Purpose: Accept human-readable timeouts in config files and flags.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! A duration string is one or more `<number><unit>` terms, e.g. `5m`,
//! `1.5h`, `1h30m`, `250ms`. Units are `ns`, `us` (or `µs`), `ms`, `s`, `m`
//! and `h`. The bare string `0` is accepted. Negative durations are rejected.
//! Arithmetic is done in integer nanoseconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Nanoseconds per unit suffix.
const UNITS: [(&str, u128); 8] = [
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 60 * 60 * 1_000_000_000),
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Duration parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    /// Input is not a valid duration string.
    #[error("invalid duration `{0}`")]
    Invalid(String),
    /// A term is missing its unit.
    #[error("missing unit in duration `{0}`")]
    MissingUnit(String),
    /// A term uses an unknown unit.
    #[error("unknown unit `{unit}` in duration `{input}`")]
    UnknownUnit {
        /// Unrecognized unit text.
        unit: String,
        /// Full input string.
        input: String,
    },
    /// The value does not fit in a [`Duration`].
    #[error("duration `{0}` is out of range")]
    Overflow(String),
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a duration string.
///
/// # Errors
///
/// Returns [`DurationError`] when the string is malformed or out of range.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    let text = input.trim();
    let text = text.strip_prefix('+').unwrap_or(text);
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() || text.starts_with('-') {
        return Err(DurationError::Invalid(input.to_string()));
    }

    let mut rest = text;
    let mut total: u128 = 0;
    while !rest.is_empty() {
        let (whole, fraction, after_number) = split_number(rest)
            .ok_or_else(|| DurationError::Invalid(input.to_string()))?;
        let unit_len = after_number
            .find(|ch: char| ch.is_ascii_digit() || ch == '.')
            .unwrap_or(after_number.len());
        let unit = &after_number[.. unit_len];
        if unit.is_empty() {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let scale = UNITS.iter().find(|(name, _)| *name == unit).map(|(_, scale)| *scale).ok_or_else(
            || DurationError::UnknownUnit {
                unit: unit.to_string(),
                input: input.to_string(),
            },
        )?;
        let term = term_nanos(whole, fraction, scale)
            .ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        total = total.checked_add(term).ok_or_else(|| DurationError::Overflow(input.to_string()))?;
        rest = &after_number[unit_len ..];
    }

    let secs = u64::try_from(total / 1_000_000_000)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    let nanos = u32::try_from(total % 1_000_000_000)
        .map_err(|_| DurationError::Overflow(input.to_string()))?;
    Ok(Duration::new(secs, nanos))
}

/// Splits a leading `digits[.digits]` number off `text`.
fn split_number(text: &str) -> Option<(&str, &str, &str)> {
    let whole_len = text.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(text.len());
    let whole = &text[.. whole_len];
    let after_whole = &text[whole_len ..];
    let (fraction, rest) = match after_whole.strip_prefix('.') {
        Some(after_dot) => {
            let fraction_len =
                after_dot.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(after_dot.len());
            (&after_dot[.. fraction_len], &after_dot[fraction_len ..])
        }
        None => ("", after_whole),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    Some((whole, fraction, rest))
}

/// Converts one term to nanoseconds, truncating sub-nanosecond fractions.
fn term_nanos(whole: &str, fraction: &str, scale: u128) -> Option<u128> {
    let whole_value = if whole.is_empty() { 0 } else { whole.parse::<u128>().ok()? };
    let mut nanos = whole_value.checked_mul(scale)?;
    let mut divisor: u128 = 1;
    let mut fraction_value: u128 = 0;
    for digit in fraction.bytes().take(18) {
        fraction_value = fraction_value * 10 + u128::from(digit - b'0');
        divisor *= 10;
    }
    nanos = nanos.checked_add(fraction_value.checked_mul(scale)? / divisor)?;
    Some(nanos)
}

// ============================================================================
// SECTION: Tests
// ============================================================================
