// src/models/query.rs

//! Bounded, defaulted query-parameter parsing.
//!
//! Every numeric parameter silently falls back to its default when missing,
//! non-numeric, non-finite, or out of range. Bad input narrows a view, it
//! never errors.

use std::collections::HashMap;

pub type Params = HashMap<String, String>;

fn raw<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params.get(key).map(String::as_str)
}

fn parse_num(value: Option<&str>) -> Option<f64> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accept values in `(0, max]`, otherwise fall back to `default`.
fn window(value: Option<&str>, default: f64, max: f64) -> f64 {
    match parse_num(value) {
        Some(v) if v > 0.0 && v <= max => v,
        _ => default,
    }
}

/// Accept values `>= 0`; missing input yields `default`, invalid or
/// negative input yields `invalid`. The two differ on the ranking views,
/// where a malformed minimum opens the filter instead of re-tightening it.
fn floor_value(value: Option<&str>, default: f64, invalid: f64) -> f64 {
    match value.map(str::trim) {
        None | Some("") => default,
        Some(v) => match v.parse::<f64>() {
            Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => parsed,
            _ => invalid,
        },
    }
}

/// Accept integer values clamped into `[min, max]`; fractional input is
/// truncated toward zero, unparsable input falls back to `default`.
fn clamped_int(value: Option<&str>, default: i64, min: i64, max: i64) -> i64 {
    let parsed = match value.map(str::trim) {
        None | Some("") => default,
        Some(v) => match v.parse::<i64>() {
            Ok(n) => n,
            Err(_) => v
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
                .unwrap_or(default),
        },
    };
    parsed.clamp(min, max)
}

fn lowered(value: Option<&str>, default: &str) -> String {
    match value.map(str::trim) {
        None | Some("") => default.to_string(),
        Some(v) => v.to_lowercase(),
    }
}

/// Parameters for the top-permits ranking view.
#[derive(Debug, Clone, PartialEq)]
pub struct TopParams {
    pub days: f64,
    pub min_value: f64,
    pub limit: usize,
    pub trade: String,
    pub mode: String,
    pub debug: bool,
}

impl TopParams {
    pub fn parse(params: &Params) -> Self {
        Self {
            days: window(raw(params, "days"), 30.0, 365.0),
            min_value: floor_value(raw(params, "min"), 250000.0, 0.0),
            limit: window(raw(params, "limit"), 25.0, 200.0) as usize,
            trade: lowered(raw(params, "trade"), "roof"),
            mode: lowered(raw(params, "mode"), "normal"),
            debug: raw(params, "debug") == Some("1"),
        }
    }

    /// Rows to pull upstream. Filtering happens locally after the fetch,
    /// so this is deliberately larger than the requested result limit.
    pub fn fetch_limit(&self) -> usize {
        (self.limit * 5).max(500)
    }
}

/// Parameters for the address-pulse chronological view.
#[derive(Debug, Clone, PartialEq)]
pub struct PulseParams {
    pub q: String,
    pub zip: String,
    pub years: f64,
    pub debug: bool,
}

impl PulseParams {
    pub fn parse(params: &Params) -> Self {
        Self {
            q: raw(params, "q").unwrap_or("").trim().to_string(),
            zip: raw(params, "zip").unwrap_or("").trim().to_string(),
            years: window(raw(params, "years"), 3.0, 10.0),
            debug: raw(params, "debug") == Some("1"),
        }
    }

    pub fn days(&self) -> f64 {
        self.years * 365.0
    }
}

/// Parameters for the short-horizon radar view.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarParams {
    pub trade: String,
    pub days: i64,
    pub limit: i64,
    pub debug: bool,
}

impl RadarParams {
    pub fn parse(params: &Params) -> Self {
        Self {
            trade: lowered(raw(params, "trade"), "roof"),
            days: clamped_int(raw(params, "days"), 7, 1, 30),
            limit: clamped_int(raw(params, "limit"), 50, 1, 200),
            debug: params.contains_key("debug"),
        }
    }
}

/// Parameters for the history search view.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryParams {
    pub q: String,
    pub days: f64,
    pub min_val: f64,
    pub limit: usize,
}

impl HistoryParams {
    pub fn parse(params: &Params) -> Self {
        Self {
            q: raw(params, "q").unwrap_or("").trim().to_string(),
            days: window(raw(params, "days"), 30.0, 365.0),
            min_val: floor_value(raw(params, "minVal"), 250000.0, 250000.0),
            limit: window(raw(params, "limit"), 25.0, 100.0) as usize,
        }
    }

    pub fn fetch_limit(&self) -> usize {
        (self.limit * 10).max(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_top_params_defaults() {
        let parsed = TopParams::parse(&params(&[]));
        assert_eq!(parsed.days, 30.0);
        assert_eq!(parsed.min_value, 250000.0);
        assert_eq!(parsed.limit, 25);
        assert_eq!(parsed.trade, "roof");
        assert_eq!(parsed.mode, "normal");
        assert!(!parsed.debug);
    }

    #[test]
    fn test_top_params_out_of_range_days_falls_back() {
        let parsed = TopParams::parse(&params(&[("days", "9999")]));
        assert_eq!(parsed.days, 30.0);
        let parsed = TopParams::parse(&params(&[("days", "-1")]));
        assert_eq!(parsed.days, 30.0);
        let parsed = TopParams::parse(&params(&[("days", "banana")]));
        assert_eq!(parsed.days, 30.0);
    }

    #[test]
    fn test_top_params_invalid_min_opens_filter() {
        // Malformed minimum valuation opens the filter instead of
        // silently reapplying the 250k default.
        let parsed = TopParams::parse(&params(&[("min", "lots")]));
        assert_eq!(parsed.min_value, 0.0);
        let parsed = TopParams::parse(&params(&[("min", "-5")]));
        assert_eq!(parsed.min_value, 0.0);
        let parsed = TopParams::parse(&params(&[("min", "100000")]));
        assert_eq!(parsed.min_value, 100000.0);
    }

    #[test]
    fn test_top_params_fetch_limit_floor() {
        assert_eq!(TopParams::parse(&params(&[])).fetch_limit(), 500);
        let parsed = TopParams::parse(&params(&[("limit", "150")]));
        assert_eq!(parsed.fetch_limit(), 750);
    }

    #[test]
    fn test_pulse_params_years_bounded() {
        let parsed = PulseParams::parse(&params(&[("years", "25")]));
        assert_eq!(parsed.years, 3.0);
        let parsed = PulseParams::parse(&params(&[("years", "5")]));
        assert_eq!(parsed.days(), 5.0 * 365.0);
    }

    #[test]
    fn test_radar_params_clamp() {
        let parsed = RadarParams::parse(&params(&[("days", "90"), ("limit", "500")]));
        assert_eq!(parsed.days, 30);
        assert_eq!(parsed.limit, 200);
        let parsed = RadarParams::parse(&params(&[("days", "0")]));
        assert_eq!(parsed.days, 1);
    }

    #[test]
    fn test_radar_params_fractional_input_truncates() {
        let parsed = RadarParams::parse(&params(&[("days", "15.9"), ("limit", "49.5")]));
        assert_eq!(parsed.days, 15);
        assert_eq!(parsed.limit, 49);
        // Truncation happens before clamping.
        let parsed = RadarParams::parse(&params(&[("days", "-3.7")]));
        assert_eq!(parsed.days, 1);
    }

    #[test]
    fn test_radar_debug_is_presence() {
        assert!(RadarParams::parse(&params(&[("debug", "")])).debug);
        assert!(!RadarParams::parse(&params(&[])).debug);
    }

    #[test]
    fn test_history_params_invalid_min_keeps_default() {
        let parsed = HistoryParams::parse(&params(&[("minVal", "junk")]));
        assert_eq!(parsed.min_val, 250000.0);
        let parsed = HistoryParams::parse(&params(&[("minVal", "0")]));
        assert_eq!(parsed.min_val, 0.0);
    }

    #[test]
    fn test_history_params_limit_and_fetch_limit() {
        let parsed = HistoryParams::parse(&params(&[("limit", "400")]));
        assert_eq!(parsed.limit, 25);
        assert_eq!(parsed.fetch_limit(), 250);
        let parsed = HistoryParams::parse(&params(&[("limit", "10")]));
        assert_eq!(parsed.fetch_limit(), 200);
    }
}
