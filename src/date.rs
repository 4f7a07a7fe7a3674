//! Day values as the user types them and as the quake API expects them.
//!
//! The API speaks `DD/MM/YYYY`; HTML date inputs speak `YYYY-MM-DD`. Parsing
//! is lenient and the `_or` variants never fail: a malformed day falls back
//! to a caller-provided day so the fetch pipeline always has something to ask
//! for.

use chrono::{DateTime, Local, NaiveDate};
use tracing::warn;

/// Format accepted by the quake API.
const API_FORMAT: &str = "%d/%m/%Y";

/// Format of an HTML `<input type="date">` value.
const NATIVE_FORMAT: &str = "%Y-%m-%d";

/// Additional day formats accepted from free text.
const LENIENT_FORMATS: [&str; 3] = [NATIVE_FORMAT, API_FORMAT, "%d-%m-%Y"];

/// The current local day.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format a day for the API (`DD/MM/YYYY`, zero padded).
#[must_use]
pub fn api_format(date: NaiveDate) -> String {
    date.format(API_FORMAT).to_string()
}

/// Format a day as a date-input value (`YYYY-MM-DD`).
#[must_use]
pub fn native_value(date: NaiveDate) -> String {
    date.format(NATIVE_FORMAT).to_string()
}

/// Label shown next to the date picker.
#[must_use]
pub fn date_label(date: NaiveDate) -> String {
    format!("Fecha seleccionada: {}", api_format(date))
}

/// Parse a day from free text.
///
/// Accepts `YYYY-MM-DD`, `DD/MM/YYYY`, `DD-MM-YYYY` and RFC 3339 datetimes
/// (the date part is kept as written, no timezone shift).
#[must_use]
pub fn parse_day(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    LENIENT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(input)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Parse a day, falling back to `fallback` on malformed input.
#[must_use]
pub fn parse_day_or(input: &str, fallback: NaiveDate) -> NaiveDate {
    parse_day(input).unwrap_or_else(|| {
        warn!("unparseable date {:?}, using {}", input, api_format(fallback));
        fallback
    })
}

/// Normalize any accepted day text to the API format, defaulting to today.
#[must_use]
pub fn to_api_format(input: &str) -> String {
    api_format(parse_day_or(input, today()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_api_format_zero_pads() {
        assert_eq!(api_format(day(2024, 3, 7)), "07/03/2024");
        assert_eq!(native_value(day(2024, 3, 7)), "2024-03-07");
    }

    #[test]
    fn test_round_trip_through_native_value() {
        let days = [
            day(2024, 1, 1),
            day(2024, 2, 29),
            day(1999, 12, 31),
            day(2099, 1, 1),
        ];

        for d in days {
            assert_eq!(to_api_format(&native_value(d)), api_format(d));
        }
    }

    #[test]
    fn test_parse_accepts_several_shapes() {
        let expected = day(2023, 11, 14);
        assert_eq!(parse_day("2023-11-14"), Some(expected));
        assert_eq!(parse_day("14/11/2023"), Some(expected));
        assert_eq!(parse_day(" 14-11-2023 "), Some(expected));
        assert_eq!(parse_day("2023-11-14T22:13:20+00:00"), Some(expected));
    }

    #[test]
    fn test_malformed_input_falls_back() {
        let fallback = day(2020, 6, 15);
        assert_eq!(parse_day_or("yesterday-ish", fallback), fallback);
        assert_eq!(parse_day_or("", fallback), fallback);
        assert_eq!(parse_day_or("31/02/2024", fallback), fallback);
    }

    #[test]
    fn test_to_api_format_malformed_is_today() {
        assert_eq!(to_api_format("not a date"), api_format(today()));
    }

    #[test]
    fn test_date_label() {
        assert_eq!(date_label(day(2025, 5, 1)), "Fecha seleccionada: 01/05/2025");
    }
}
