// src/parsers.rs

//! Heuristic parsers for upstream date and valuation fields.
//!
//! Municipal datasets are inconsistent about column typing: the same field
//! may arrive as an ISO timestamp, a bare date, a slash-separated date, a
//! currency string, or a number. These parsers are deliberately forgiving
//! and never fail a whole request over one bad cell.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse an upstream filed/issue date.
///
/// Tries, in order:
/// 1. RFC 3339 (`2024-12-09T00:00:00Z`, with offset)
/// 2. ISO 8601 without zone (`2024-12-09T00:00:00`, optional fraction)
/// 3. Bare ISO date (`2024-12-09`)
/// 4. Splitting on `/` or `-` into exactly three parts: a 4-character
///    first part is read as `YYYY-MM-DD`, anything else as `MM/DD/YYYY`.
///
/// Known limitation: step 4 assumes month-before-day for short-year forms.
/// Locale-swapped `DD/MM/YYYY` input parses to the wrong date whenever the
/// day is 12 or less; upstream format is not always documented per
/// jurisdiction, so this stays as-is rather than guessing.
pub fn parse_issue_date(value: &str) -> Option<DateTime<Utc>> {
    let input = value.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return midnight_utc(date);
    }

    let parts: Vec<&str> = input.split(['/', '-']).collect();
    if parts.len() != 3 {
        return None;
    }

    let (a, b, c) = (parts[0].trim(), parts[1].trim(), parts[2].trim());
    let (year, month, day) = if a.len() == 4 {
        (a.parse().ok()?, b.parse().ok()?, c.parse().ok()?)
    } else {
        (c.parse().ok()?, a.parse().ok()?, b.parse().ok()?)
    };

    midnight_utc(NaiveDate::from_ymd_opt(year, month, day)?)
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Parse a valuation string into a non-negative finite number.
///
/// Strips every character except ASCII digits and `.`, then reads the
/// longest numeric prefix of what remains, so `"$250,000.00"` becomes
/// `250000.0` and a doubly-dotted `"1.2.3"` becomes `1.2`. Anything
/// without a leading number maps to `0.0`.
pub fn parse_valuation(value: &str) -> f64 {
    let clean: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    // Longest numeric prefix: digits with at most one decimal point.
    let mut end = 0;
    let mut seen_dot = false;
    for c in clean.chars() {
        match c {
            '.' if seen_dot => break,
            '.' => seen_dot = true,
            _ => {}
        }
        end += 1;
    }

    match clean[..end].parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_iso_datetime_without_zone() {
        let parsed = parse_issue_date("2024-12-09T00:00:00").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2024, 12, 9)
        );
        assert_eq!(parsed.hour(), 0);
    }

    #[test]
    fn test_parse_rfc3339_matches_native_interpretation() {
        let parsed = parse_issue_date("2024-06-15T08:30:00Z").unwrap();
        let native = DateTime::parse_from_rfc3339("2024-06-15T08:30:00Z").unwrap();
        assert_eq!(parsed, native.with_timezone(&Utc));
    }

    #[test]
    fn test_parse_bare_iso_date() {
        let parsed = parse_issue_date("2024-12-09").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2024, 12, 9)
        );
    }

    #[test]
    fn test_parse_slash_date_is_month_first() {
        // Property: MM/DD/YYYY, month before day. 03/04 is March 4th.
        let parsed = parse_issue_date("03/04/2024").unwrap();
        assert_eq!((parsed.month(), parsed.day()), (3, 4));
    }

    #[test]
    fn test_parse_dash_date_with_long_year_first() {
        let parsed = parse_issue_date("2024-3-4").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2024, 3, 4)
        );
    }

    #[test]
    fn test_unparsable_dates_return_none() {
        assert!(parse_issue_date("N/A").is_none());
        assert!(parse_issue_date("").is_none());
        assert!(parse_issue_date("12/2024").is_none());
        assert!(parse_issue_date("13/40/2024").is_none());
        assert!(parse_issue_date("soon").is_none());
    }

    #[test]
    fn test_parse_valuation_strips_currency_formatting() {
        assert_eq!(parse_valuation("$250,000.00"), 250000.0);
        assert_eq!(parse_valuation("1,500"), 1500.0);
        assert_eq!(parse_valuation("USD 42"), 42.0);
    }

    #[test]
    fn test_parse_valuation_plain_number() {
        assert_eq!(parse_valuation("98765"), 98765.0);
        assert_eq!(parse_valuation("12.5"), 12.5);
    }

    #[test]
    fn test_parse_valuation_takes_longest_numeric_prefix() {
        assert_eq!(parse_valuation("1.2.3"), 1.2);
        assert_eq!(parse_valuation("1.000.000"), 1.0);
        assert_eq!(parse_valuation("10."), 10.0);
    }

    #[test]
    fn test_parse_valuation_defaults_to_zero() {
        assert_eq!(parse_valuation(""), 0.0);
        assert_eq!(parse_valuation("n/a"), 0.0);
        assert_eq!(parse_valuation("..."), 0.0);
    }
}
