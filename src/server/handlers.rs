// src/server/handlers.rs

//! Request handlers for the permit API endpoints.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::cache::canonical_key;
use crate::classify::radar_keywords;
use crate::error::AppError;
use crate::intake::{
    build_payload, forward_detached, is_self_fetch_target, lead_key, missing_fields,
};
use crate::models::{
    HistoryParams, Params, PermitRecord, PulseParams, RadarParams, TopParams,
};
use crate::normalize::{normalize_history_record, normalize_permit_row};
use crate::pipeline::{filter_and_rank, filter_chronological, include_history};
use crate::providers::socrata::{
    count_url, fetch_feed, fetch_history, radar_query, sanitize_domain, FeedOutcome,
};
use crate::registry::ProviderType;

use super::{cacheable_json_response, error_response, json_response, AppState};

/// Dataset reachability probe: one `count(1)` query against the configured
/// dataset.
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let domain = sanitize_domain(&state.config.upstream.domain);
    let dataset = &state.config.upstream.dataset;
    let url = count_url(&domain, dataset);

    match state.client.get_value(&url).await {
        Ok(rows) => json_response(
            &json!({ "ok": true, "dataset": dataset, "url": url, "rows": rows }),
            StatusCode::OK,
        ),
        Err(e) => error_response("upstream", Some(&e.to_string()), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// Short-horizon keyword radar. The one view that pushes its filters into
/// the upstream query instead of filtering locally.
pub async fn radar(State(state): State<Arc<AppState>>, Query(params): Query<Params>) -> Response {
    let params = RadarParams::parse(&params);
    let domain = sanitize_domain(&state.config.upstream.domain);
    let dataset = state.config.upstream.dataset.trim().to_string();

    let terms = radar_keywords(&params.trade);
    let query = radar_query(&domain, &dataset, terms, params.days, params.limit, Utc::now());

    let text = match state.client.get_text(&query.url).await {
        Ok(text) => text,
        Err(AppError::UpstreamFetch { detail, .. }) => {
            return json_response(
                &json!({ "ok": false, "error": "upstream", "url": query.url, "detail": detail }),
                StatusCode::BAD_GATEWAY,
            );
        }
        Err(e) => {
            return json_response(
                &json!({
                    "ok": false,
                    "error": "upstream",
                    "detail": format!("fetch failed: {e}"),
                    "url": query.url,
                }),
                StatusCode::BAD_GATEWAY,
            );
        }
    };

    // Tolerate a non-array body: legacy consumers expect ok with zero rows.
    let rows: Vec<Value> = serde_json::from_str(&text).unwrap_or_default();
    let count = rows.len();

    let mut body = json!({
        "ok": true,
        "count": count,
        "count_1": count.to_string(),
        "count(*)": count,
        "total": count,
        "view": dataset,
        "dataset": dataset,
        "source_view": dataset,
        "view_id": dataset,
        "url": query.url,
        "ui": format!("https://{domain}/resource/{dataset}"),
        "rows": rows,
        "params": { "trade": params.trade, "days": params.days, "limit": params.limit },
    });
    if params.debug {
        body["debug"] = json!({
            "where": query.where_clause,
            "select": query.select,
            "domain": domain,
            "dataset": dataset,
        });
    }
    json_response(&body, StatusCode::OK)
}

fn feed_error_parts(error: Option<&AppError>) -> (Option<String>, Option<String>) {
    match error {
        None => (None, None),
        Some(AppError::UpstreamFetch { status, detail }) => (
            Some(format!("ladbs_fetch_failed_{status}")),
            Some(detail.clone()),
        ),
        Some(e) => (Some("ladbs_fetch_exception".to_string()), Some(e.to_string())),
    }
}

fn permit_item(permit: &PermitRecord) -> Value {
    json!({
        "permitNumber": permit.permit_number,
        "issueDate": permit.issue_date_raw,
        "address": permit.address,
        "zip": permit.zip,
        "value": permit.value,
        "description": permit.description,
    })
}

fn feed_source(domain: &str, dataset: &str) -> String {
    format!("LADBS permits via https://{domain}/resource/{dataset}")
}

async fn load_feed<'a>(
    state: &'a AppState,
    domain: &str,
    dataset: &str,
    fetch_limit: usize,
) -> (FeedOutcome<'a>, Vec<PermitRecord>) {
    let provider = &state.registry.default_jurisdiction().provider;
    let outcome = fetch_feed(&state.client, domain, dataset, provider, fetch_limit).await;
    let records = outcome
        .rows
        .iter()
        .map(|row| normalize_permit_row(row, outcome.fields))
        .collect();
    (outcome, records)
}

/// Ranking view: highest-valuation permits matching a trade within a date
/// window.
pub async fn top_permits(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let params = TopParams::parse(&params);
    let domain = sanitize_domain(&state.config.upstream.domain);
    let dataset = state.config.upstream.dataset.clone();

    let (outcome, records) = load_feed(&state, &domain, &dataset, params.fetch_limit()).await;
    let fetched_rows = outcome.rows.len();
    let permits = filter_and_rank(
        records,
        params.days,
        params.min_value,
        &params.trade,
        &params.mode,
        params.limit,
        Utc::now(),
    );

    let items: Vec<Value> = permits
        .iter()
        .map(|permit| {
            let mut item = permit_item(permit);
            item["trade"] = json!(params.trade);
            item
        })
        .collect();

    let (error_code, error_detail) = feed_error_parts(outcome.error.as_ref());
    let mut body = json!({
        "ok": error_code.is_none(),
        "meta": {
            "days": params.days,
            "minValue": params.min_value,
            "limit": params.limit,
            "trade": params.trade,
            "source": feed_source(&domain, &dataset),
            "error": error_code,
            "count": items.len(),
        },
        "permits": items,
    });
    if params.debug {
        body["debug"] = json!({
            "socUrl": outcome.url,
            "fetchedRows": fetched_rows,
            "errorDetail": error_detail,
        });
    }

    let status = if outcome.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    json_response(&body, status)
}

/// Chronological view: recent activity around an address, zip, or permit
/// number.
pub async fn address_pulse(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Params>,
) -> Response {
    let params = PulseParams::parse(&params);
    let domain = sanitize_domain(&state.config.upstream.domain);
    let dataset = state.config.upstream.dataset.clone();

    let (outcome, records) = load_feed(&state, &domain, &dataset, 2000).await;
    let fetched_rows = outcome.rows.len();
    let permits = filter_chronological(records, params.days(), &params.zip, &params.q, 200, Utc::now());
    let items: Vec<Value> = permits.iter().map(permit_item).collect();

    let (error_code, error_detail) = feed_error_parts(outcome.error.as_ref());
    let mut body = json!({
        "ok": error_code.is_none(),
        "meta": {
            "q": params.q,
            "zip": params.zip,
            "years": params.years,
            "days": params.days(),
            "source": feed_source(&domain, &dataset),
            "error": error_code,
            "count": items.len(),
        },
        "permits": items,
    });
    if params.debug {
        body["debug"] = json!({
            "socUrl": outcome.url,
            "fetchedRows": fetched_rows,
            "errorDetail": error_detail,
        });
    }

    let status = if outcome.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    json_response(&body, status)
}

/// Jurisdiction directory for consumers building a picker.
pub async fn jurisdictions(State(state): State<Arc<AppState>>) -> Response {
    let list: Vec<Value> = state
        .registry
        .all()
        .iter()
        .map(|jurisdiction| {
            json!({
                "id": jurisdiction.id,
                "name": jurisdiction.name,
                "placeholder": jurisdiction.placeholder,
            })
        })
        .collect();
    json_response(&json!({ "ok": true, "jurisdictions": list }), StatusCode::OK)
}

fn api_envelope(ok: bool, data: Value, error: Option<String>) -> Value {
    json!({ "ok": ok, "data": data, "error": error })
}

/// Multi-jurisdiction history search with a short-TTL response cache.
pub async fn history_search(
    State(state): State<Arc<AppState>>,
    Query(raw_params): Query<Params>,
) -> Response {
    let jurisdiction_id = raw_params
        .get("jurisdiction")
        .map(|value| value.trim())
        .unwrap_or("");
    if jurisdiction_id.is_empty() {
        return json_response(
            &api_envelope(false, Value::Null, Some("jurisdiction_required".into())),
            StatusCode::BAD_REQUEST,
        );
    }

    let Some(jurisdiction) = state.registry.resolve(jurisdiction_id) else {
        return json_response(
            &api_envelope(false, Value::Null, Some("unknown_jurisdiction".into())),
            StatusCode::BAD_REQUEST,
        );
    };
    if jurisdiction.provider.provider_type != ProviderType::Socrata {
        return json_response(
            &api_envelope(false, Value::Null, Some("unknown_jurisdiction".into())),
            StatusCode::BAD_REQUEST,
        );
    }

    let params = HistoryParams::parse(&raw_params);
    let pairs: Vec<(String, String)> = raw_params
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let cache_key = canonical_key("/v1/history/search", &pairs);
    if let Some(body) = state.cache.get(&cache_key).await {
        return cacheable_json_response(body, state.cache.ttl_secs());
    }

    let fetched = fetch_history(
        &state.client,
        &jurisdiction.provider,
        &params.q,
        params.fetch_limit(),
    )
    .await;
    let (source_url, rows, fields) = match fetched {
        Ok(result) => result,
        Err(e) => {
            return json_response(
                &api_envelope(false, Value::Null, Some(format!("upstream: {e}"))),
                StatusCode::BAD_GATEWAY,
            );
        }
    };

    let now = Utc::now();
    let results: Vec<_> = rows
        .iter()
        .map(|row| normalize_history_record(row, &jurisdiction.provider, fields, now))
        .filter(|record| include_history(record, params.days, params.min_val, now))
        .take(params.limit)
        .collect();

    let envelope = api_envelope(
        true,
        json!({
            "jurisdiction": jurisdiction.id,
            "query": {
                "q": params.q,
                "days": params.days,
                "minVal": params.min_val,
                "limit": params.limit,
            },
            "meta": {
                "jurisdiction": jurisdiction.id,
                "count": results.len(),
                "fetchLimit": params.fetch_limit(),
                "source_url": source_url,
            },
            "results": results,
        }),
        None,
    );
    let body = envelope.to_string();
    state.cache.put_detached(cache_key, body.clone());
    cacheable_json_response(body, state.cache.ttl_secs())
}

/// Pilot lead intake: validate, back up, forward.
pub async fn pilot_intake(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let data: Map<String, Value> = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(_) => {
            return json_response(
                &json!({ "ok": false, "error": "bad_json" }),
                StatusCode::BAD_REQUEST,
            );
        }
    };

    let missing = missing_fields(&data);
    if !missing.is_empty() {
        return json_response(
            &json!({ "ok": false, "error": format!("missing:{}", missing.join(",")) }),
            StatusCode::BAD_REQUEST,
        );
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    let now = Utc::now();
    let payload = build_payload(data, user_agent, now);
    let key = lead_key(&payload, now);
    let payload = Value::Object(payload);

    // The backup write is best-effort; a failed store never blocks the lead.
    if let Err(e) = state
        .leads
        .put(&key, &payload, state.config.intake.lead_ttl_secs)
        .await
    {
        tracing::warn!("Lead backup write failed for {}: {}", key, e);
    }

    if let Some(target) = &state.config.intake.forward_to {
        if !is_self_fetch_target(target, &state.config.intake.self_hosts) {
            forward_detached(state.client.http().clone(), target.clone(), payload);
        }
    }

    json_response(&json!({ "ok": true }), StatusCode::OK)
}
