//! Timestamp and duration parsing for upstream payloads.
//!
//! Upstream sources mix epoch seconds, epoch milliseconds, ISO 8601
//! timestamps and ISO 8601 durations. Everything is normalized to epoch
//! seconds (UTC) here.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::error::FetchError;

/// Epoch values at or above this magnitude are treated as milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Offset-aware timestamp formats tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Naive timestamp formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// ISO 8601 duration grammar. Year and month groups are matched so they can
/// be rejected explicitly.
#[allow(clippy::expect_used)]
static ISO_DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,]\d+)?S)?)?$",
    )
    .expect("failed to compile ISO duration regex")
});

/// Plain decimal number, optionally signed and fractional.
#[allow(clippy::expect_used)]
static NUMERIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(?:\.\d+)?$").expect("failed to compile numeric regex")
});

/// Converts an epoch value that may be in milliseconds to seconds.
#[must_use]
pub const fn normalize_epoch(value: i64) -> i64 {
    if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD.unsigned_abs() {
        value.wrapping_div(1000)
    } else {
        value
    }
}

/// Truncates a finite float towards zero into an `i64`.
fn float_to_i64(value: f64) -> Result<i64, FetchError> {
    if !value.is_finite() {
        return Err(FetchError::invalid(format!("non-finite number {value}")));
    }
    let truncated = value.trunc();
    // i64::MAX is not exactly representable; stay inside the safe range.
    if truncated.abs() >= 9.0e18 {
        return Err(FetchError::invalid(format!("number out of range: {value}")));
    }
    #[allow(clippy::as_conversions, clippy::cast_possible_truncation)]
    let converted = truncated as i64;
    Ok(converted)
}

/// Normalizes a floating point epoch value to whole seconds.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] for non-finite or out-of-range values.
pub fn normalize_epoch_f64(value: f64) -> Result<i64, FetchError> {
    let threshold = 1.0e11;
    if value.abs() >= threshold {
        float_to_i64(value / 1000.0)
    } else {
        float_to_i64(value)
    }
}

/// Converts a JSON number to whole units, truncating fractions.
fn number_to_i64(number: &serde_json::Number) -> Result<i64, FetchError> {
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    number
        .as_f64()
        .map_or_else(|| Err(FetchError::invalid(format!("unsupported number {number}"))), float_to_i64)
}

/// Parses a timestamp value into epoch seconds.
///
/// Accepts JSON numbers and numeric strings (epoch seconds or milliseconds)
/// and ISO 8601 strings. Naive ISO values are interpreted as UTC.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] if the value is null, blank, or not a
/// recognizable timestamp.
pub fn parse_timestamp(value: &Value) -> Result<i64, FetchError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(normalize_epoch(i))
            } else {
                n.as_f64().map_or_else(
                    || Err(FetchError::invalid(format!("unsupported number {n}"))),
                    normalize_epoch_f64,
                )
            }
        }
        Value::String(s) => parse_timestamp_str(s),
        other => Err(FetchError::invalid(format!(
            "unsupported timestamp value: {other}"
        ))),
    }
}

/// Parses a timestamp string into epoch seconds.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] if the text is blank or unparsable.
pub fn parse_timestamp_str(text: &str) -> Result<i64, FetchError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FetchError::invalid("timestamp is empty"));
    }
    if NUMERIC_RE.is_match(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(normalize_epoch(i));
        }
        let parsed: f64 = text
            .parse()
            .map_err(|_| FetchError::invalid(format!("invalid epoch value: {text}")))?;
        return normalize_epoch_f64(parsed);
    }
    parse_iso_timestamp(text)
}

/// Parses an ISO 8601 timestamp into epoch seconds.
///
/// Offsets may be `Z`, `±HH:MM` or `±HHMM`; fractional seconds are
/// truncated.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] if no supported format matches.
pub fn parse_iso_timestamp(text: &str) -> Result<i64, FetchError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp());
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Ok(dt.timestamp());
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(dt.and_utc().timestamp());
        }
    }
    Err(FetchError::invalid(format!("invalid timestamp: {text}")))
}

/// Parses a duration value into seconds.
///
/// Numbers and numeric strings are seconds; strings starting with `P` are
/// ISO 8601 durations.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] for negative, blank or unparsable
/// values, and for ISO durations carrying year or month components.
pub fn parse_duration(value: &Value) -> Result<i64, FetchError> {
    let seconds = match value {
        Value::Number(n) => number_to_i64(n)?,
        Value::String(s) => parse_duration_str(s)?,
        other => {
            return Err(FetchError::invalid(format!(
                "unsupported duration value: {other}"
            )));
        }
    };
    if seconds < 0 {
        return Err(FetchError::invalid(format!("negative duration {seconds}")));
    }
    Ok(seconds)
}

/// Parses a duration string (numeric seconds or ISO 8601) into seconds.
///
/// # Errors
///
/// See [`parse_duration`].
pub fn parse_duration_str(text: &str) -> Result<i64, FetchError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FetchError::invalid("duration is empty"));
    }
    if NUMERIC_RE.is_match(text) {
        if let Ok(i) = text.parse::<i64>() {
            return Ok(i);
        }
        let parsed: f64 = text
            .parse()
            .map_err(|_| FetchError::invalid(format!("invalid duration: {text}")))?;
        return float_to_i64(parsed);
    }
    if text.starts_with(['P', 'p']) {
        return parse_iso_duration(&text.to_ascii_uppercase());
    }
    Err(FetchError::invalid(format!("invalid duration: {text}")))
}

/// Parses an ISO 8601 duration into whole seconds.
///
/// Supports weeks, days, hours, minutes and (fractional) seconds. Year and
/// month components have no fixed length and are rejected.
///
/// # Errors
///
/// Returns [`FetchError::Validation`] if the text does not match the
/// grammar, carries no components, or uses years or months.
pub fn parse_iso_duration(text: &str) -> Result<i64, FetchError> {
    let invalid = || FetchError::invalid(format!("invalid ISO 8601 duration: {text}"));
    let caps = ISO_DURATION_RE.captures(text).ok_or_else(invalid)?;
    if caps.get(1).is_some() || caps.get(2).is_some() {
        return Err(FetchError::invalid(format!(
            "ISO 8601 duration with years or months is ambiguous: {text}"
        )));
    }
    if text.ends_with('T') || (3..=7).all(|i| caps.get(i).is_none()) {
        return Err(invalid());
    }

    let component = |index: usize| -> Result<i64, FetchError> {
        caps.get(index)
            .map_or(Ok(0), |m| m.as_str().parse::<i64>().map_err(|_| invalid()))
    };
    let units: [(usize, i64); 5] = [(3, 604_800), (4, 86_400), (5, 3_600), (6, 60), (7, 1)];
    let mut total: i64 = 0;
    for (index, unit) in units {
        total = component(index)?
            .checked_mul(unit)
            .and_then(|part| total.checked_add(part))
            .ok_or_else(invalid)?;
    }
    Ok(total)
}
