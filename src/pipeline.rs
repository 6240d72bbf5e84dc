// src/pipeline.rs

//! Filtering, ranking, and truncation of normalized records.
//!
//! All filtering happens here, after the over-fetch: upstream column typing
//! is too inconsistent to push valuation or keyword filters into the query.
//! Truncation always happens after sorting so ranking sees the full
//! filtered set.

use chrono::{DateTime, Duration, Utc};

use crate::classify::matches_trade;
use crate::models::{HistoryRecord, PermitRecord};
use crate::parsers::parse_issue_date;

/// Start of a `days`-long window ending at `now`.
pub fn window_start(now: DateTime<Utc>, days: f64) -> DateTime<Utc> {
    now - Duration::milliseconds((days * 86_400_000.0) as i64)
}

/// Ranking view: date window, minimum valuation, trade match; sorted by
/// valuation descending, truncated to `limit`.
pub fn filter_and_rank(
    records: Vec<PermitRecord>,
    days: f64,
    min_value: f64,
    trade: &str,
    mode: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<PermitRecord> {
    let min_time = window_start(now, days);

    let mut kept: Vec<PermitRecord> = records
        .into_iter()
        .filter(|permit| {
            let Some(issue_date) = permit.issue_date else {
                return false;
            };
            if issue_date < min_time {
                return false;
            }
            if permit.value < min_value {
                return false;
            }
            matches_trade(permit.description.as_deref().unwrap_or(""), trade, mode)
        })
        .collect();

    kept.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    kept.truncate(limit);
    kept
}

/// Chronological view: date window plus optional exact-zip and free-text
/// match against address or permit number; sorted by filed date
/// descending, truncated to `limit`.
pub fn filter_chronological(
    records: Vec<PermitRecord>,
    days: f64,
    zip: &str,
    q: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<PermitRecord> {
    let min_time = window_start(now, days);
    let q = q.to_lowercase();

    let mut kept: Vec<PermitRecord> = records
        .into_iter()
        .filter(|permit| {
            let Some(issue_date) = permit.issue_date else {
                return false;
            };
            if issue_date < min_time {
                return false;
            }
            if !zip.is_empty() && permit.zip.as_deref() != Some(zip) {
                return false;
            }
            if !q.is_empty() {
                let address = permit.address.to_lowercase();
                let permit_number = permit
                    .permit_number
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase();
                if !address.contains(&q) && !permit_number.contains(&q) {
                    return false;
                }
            }
            true
        })
        .collect();

    kept.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));
    kept.truncate(limit);
    kept
}

/// History view inclusion rule.
///
/// A record with no filed date passes the window check (the dataset may
/// simply lack the column); a filed date that is present but unparsable
/// fails it. A null valuation is always excluded: this view requires one
/// to rank against.
pub fn include_history(record: &HistoryRecord, days: f64, min_val: f64, now: DateTime<Utc>) -> bool {
    if let Some(filed_at) = record.filed_at.as_deref() {
        let Some(filed_date) = parse_issue_date(filed_at) else {
            return false;
        };
        if filed_date < window_start(now, days) {
            return false;
        }
    }

    match record.valuation {
        Some(valuation) => valuation >= min_val,
        None => false,
    }
}
