// src/normalize.rs

//! Schema-driven normalization of raw upstream rows.
//!
//! A raw row is an opaque JSON object with no guaranteed key set. The
//! active jurisdiction's field map decides which columns to read; absent
//! fields degrade to `None`/defaults rather than failing the row.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::classify::{mentions_roofing, mentions_solar};
use crate::models::{HistoryRecord, PermitRecord, RiskFlag};
use crate::parsers::{parse_issue_date, parse_valuation};
use crate::registry::{FieldMap, Provider};

/// Raw upstream row: field name to string/number/null, any key may be absent.
pub type RawRecord = serde_json::Map<String, Value>;

/// Valuation threshold for the `HIGH_VALUATION` flag.
const HIGH_VALUATION_FLOOR: f64 = 250000.0;

/// Window for the `RECENT_FILED` flag, in days.
const RECENT_FILED_DAYS: i64 = 14;

/// Read a field as a non-empty string, stringifying numbers.
fn field_string(row: &RawRecord, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn mapped_string(row: &RawRecord, field: Option<&str>) -> Option<String> {
    field.and_then(|f| field_string(row, f))
}

/// Normalize a raw row into the canonical shape used by the ranking and
/// chronological views.
///
/// Generic fallback columns (`address`, `work_description`, `description`)
/// are consulted when the schema-mapped field is absent, to tolerate
/// partial upstream data.
pub fn normalize_permit_row(row: &RawRecord, fields: &FieldMap) -> PermitRecord {
    let issue_date_raw = field_string(row, &fields.filed_at);
    let issue_date = issue_date_raw.as_deref().and_then(parse_issue_date);

    let address = field_string(row, &fields.address)
        .or_else(|| field_string(row, "address"))
        .unwrap_or_default();

    let description = field_string(row, &fields.description)
        .or_else(|| field_string(row, "work_description"))
        .or_else(|| field_string(row, "description"));

    PermitRecord {
        permit_number: field_string(row, &fields.id),
        issue_date_raw,
        issue_date,
        address,
        zip: mapped_string(row, fields.zip.as_deref()),
        value: field_string(row, &fields.valuation)
            .map(|v| parse_valuation(&v))
            .unwrap_or(0.0),
        description,
    }
}

/// Normalize a raw row into the richer history-search shape, deriving the
/// risk-flag set. Pure for a fixed `now`, so normalizing the same row
/// twice yields identical records.
pub fn normalize_history_record(
    row: &RawRecord,
    provider: &Provider,
    fields: &FieldMap,
    now: DateTime<Utc>,
) -> HistoryRecord {
    let id = field_string(row, &fields.id);
    let address = field_string(row, &fields.address);
    let filed_at = field_string(row, &fields.filed_at);

    // Null and absent collapse to None; a present-but-unparsable value is
    // Some(0.0). None and zero are distinct facts in this view.
    let valuation = match row.get(&fields.valuation) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_valuation(s)),
        Some(Value::Number(n)) => Some(parse_valuation(&n.to_string())),
        Some(_) => Some(0.0),
    };

    let description = field_string(row, &fields.description)
        .unwrap_or_default()
        .to_lowercase();

    let mut risk_flags = std::collections::BTreeSet::new();
    if valuation.is_none() || valuation == Some(0.0) {
        risk_flags.insert(RiskFlag::MissingValuation);
    }
    if address.is_none() {
        risk_flags.insert(RiskFlag::MissingAddress);
    }
    if valuation.is_some_and(|v| v >= HIGH_VALUATION_FLOOR) {
        risk_flags.insert(RiskFlag::HighValuation);
    }
    if let Some(filed_date) = filed_at.as_deref().and_then(parse_issue_date) {
        if filed_date >= now - Duration::days(RECENT_FILED_DAYS) {
            risk_flags.insert(RiskFlag::RecentFiled);
        }
    }
    if mentions_roofing(&description) {
        risk_flags.insert(RiskFlag::TradeRoofing);
    }
    if mentions_solar(&description) {
        risk_flags.insert(RiskFlag::TradeSolar);
    }

    HistoryRecord {
        source_url: record_source_url(provider, fields, id.as_deref()),
        id,
        address,
        status: mapped_string(row, fields.status.as_deref()),
        permit_type: mapped_string(row, fields.permit_type.as_deref()),
        subtype: mapped_string(row, fields.subtype.as_deref()),
        filed_at,
        valuation,
        risk_flags,
    }
}

/// Link back to the upstream record: the dataset resource filtered to the
/// record id, or the dataset root when the id is missing.
fn record_source_url(provider: &Provider, fields: &FieldMap, id: Option<&str>) -> String {
    match id {
        Some(id) => {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .append_pair(&fields.id, id)
                .append_pair("$limit", "1")
                .finish();
            format!(
                "https://{}/resource/{}.json?{}",
                provider.domain, provider.dataset, query
            )
        }
        None => format!("https://{}/resource/{}", provider.domain, provider.dataset),
    }
}
