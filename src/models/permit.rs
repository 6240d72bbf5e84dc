// src/models/permit.rs

//! Canonical permit record shapes.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Derived boolean-style tags summarizing a record's notable attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskFlag {
    MissingValuation,
    MissingAddress,
    HighValuation,
    RecentFiled,
    TradeRoofing,
    TradeSolar,
}

/// Normalized permit record used by the ranking and chronological views.
///
/// Constructed fresh per request from a raw upstream row, never persisted.
/// `value` is always non-negative and finite; a row whose valuation cannot
/// be parsed carries `0.0`. `issue_date` is `None` exactly when the raw
/// string could not be parsed; such records are excluded from every
/// date-windowed view.
#[derive(Debug, Clone, PartialEq)]
pub struct PermitRecord {
    pub permit_number: Option<String>,
    /// Raw upstream date string, echoed back to consumers as-is.
    pub issue_date_raw: Option<String>,
    pub issue_date: Option<DateTime<Utc>>,
    pub address: String,
    pub zip: Option<String>,
    pub value: f64,
    pub description: Option<String>,
}

/// Richer record exposed by the history search view.
///
/// Unlike [`PermitRecord`], valuation stays nullable here: "no valuation
/// column" and "valuation of zero" are different facts and both matter to
/// the risk flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub id: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    pub permit_type: Option<String>,
    pub subtype: Option<String>,
    pub filed_at: Option<String>,
    pub valuation: Option<f64>,
    pub source_url: String,
    pub risk_flags: BTreeSet<RiskFlag>,
}
