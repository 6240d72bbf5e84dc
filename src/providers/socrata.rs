// src/providers/socrata.rs

//! Socrata-style REST provider: query building, fetching, and the
//! two-shape fallback.
//!
//! The upstream protocol is `$select`/`$where`/`$order`/`$limit` query
//! parameters against `https://{domain}/resource/{dataset}.json`, with an
//! optional `X-App-Token` header. Resilience is exactly one retry: if a
//! fetch with the primary column-name shape fails, the alternate shape is
//! tried once, then the failure is surfaced.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use url::form_urlencoded::Serializer;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;
use crate::normalize::RawRecord;
use crate::registry::{FieldMap, Provider};

/// HTTP client for Socrata portals.
#[derive(Debug, Clone)]
pub struct SocrataClient {
    client: reqwest::Client,
    app_token: Option<String>,
}

impl SocrataClient {
    /// Create a configured client.
    pub fn new(config: &HttpConfig, app_token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, app_token })
    }

    /// Underlying HTTP client, shared with non-Socrata outbound calls.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(url)
            .header("Accept", "application/json");
        if let Some(token) = &self.app_token {
            request = request.header("X-App-Token", token);
        }
        request
    }

    /// Fetch a URL, returning the body on 2xx and a status-carrying error
    /// (with the body as truncated detail) otherwise.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .request(url)
            .send()
            .await
            .map_err(AppError::transport)?;

        let status = response.status();
        let text = response.text().await.map_err(AppError::transport)?;
        if !status.is_success() {
            return Err(AppError::upstream(status.as_u16(), text));
        }
        Ok(text)
    }

    /// Fetch a URL and decode the body as an array of raw rows.
    pub async fn get_rows(&self, url: &str) -> Result<Vec<RawRecord>> {
        let text = self.get_text(url).await?;
        serde_json::from_str::<Vec<RawRecord>>(&text).map_err(AppError::transport)
    }

    /// Fetch a URL and decode the body as arbitrary JSON.
    pub async fn get_value(&self, url: &str) -> Result<Value> {
        let text = self.get_text(url).await?;
        serde_json::from_str(&text).map_err(AppError::transport)
    }
}

/// Strip scheme and trailing slashes from a configured domain.
pub fn sanitize_domain(domain: &str) -> String {
    let trimmed = domain.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme.trim_end_matches('/').to_string()
}

fn resource_base(domain: &str, dataset: &str) -> String {
    // A domain carrying an explicit scheme is used verbatim; bare domains
    // get https.
    if domain.contains("://") {
        format!("{domain}/resource/{dataset}.json")
    } else {
        format!("https://{domain}/resource/{dataset}.json")
    }
}

/// Feed query for the ranking/chronological views: newest filings first,
/// over-fetched so filtering can happen locally.
pub fn feed_url(domain: &str, dataset: &str, fields: &FieldMap, fetch_limit: usize) -> String {
    let query = Serializer::new(String::new())
        .append_pair("$order", &format!("{} DESC", fields.filed_at))
        .append_pair("$limit", &fetch_limit.to_string())
        .finish();
    format!("{}?{}", resource_base(domain, dataset), query)
}

/// History query: explicit `$select` over the mapped columns, optional
/// free-text `$q` when the schema declares searchable fields.
pub fn history_url(provider: &Provider, fields: &FieldMap, q: &str, fetch_limit: usize) -> String {
    let mut serializer = Serializer::new(String::new());
    serializer
        .append_pair("$select", &fields.select_fields().join(","))
        .append_pair("$order", &format!("{} DESC", fields.filed_at))
        .append_pair("$limit", &fetch_limit.to_string());
    if !q.is_empty() && !provider.search_fields.is_empty() {
        serializer.append_pair("$q", q);
    }
    format!(
        "{}?{}",
        resource_base(&provider.domain, &provider.dataset),
        serializer.finish()
    )
}

/// Dataset row count, used by the health check.
pub fn count_url(domain: &str, dataset: &str) -> String {
    let query = Serializer::new(String::new())
        .append_pair("$select", "count(1)")
        .finish();
    format!("{}?{}", resource_base(domain, dataset), query)
}

/// A radar query pushed upstream, kept alongside its clauses for debug
/// output.
#[derive(Debug, Clone)]
pub struct RadarQuery {
    pub url: String,
    pub where_clause: String,
    pub select: String,
}

/// Columns returned by the radar view.
const RADAR_SELECT: &[&str] = &[
    "permit_nbr",
    "issue_date",
    "work_desc",
    "permit_type",
    "permit_sub_type",
    "primary_address",
    "zip_code",
    "valuation",
    "lat",
    "lon",
];

/// Build the radar query: a date window plus an upstream keyword LIKE
/// block. The one view that pushes its filters into the query.
pub fn radar_query(
    domain: &str,
    dataset: &str,
    terms: &[&str],
    days: i64,
    limit: i64,
    now: DateTime<Utc>,
) -> RadarQuery {
    let end = now;
    let start = end - chrono::Duration::days(days);
    let mut clauses = vec![format!(
        "issue_date BETWEEN '{}' AND '{}'",
        iso_no_zone(start),
        iso_no_zone(end)
    )];

    if !terms.is_empty() {
        let likes: Vec<String> = terms
            .iter()
            .map(|term| format!("upper(work_desc) LIKE '%{}%'", term.replace('\'', "''")))
            .collect();
        clauses.push(format!("({})", likes.join(" OR ")));
    }

    let where_clause = clauses.join(" AND ");
    let select = RADAR_SELECT.join(",");
    let query = Serializer::new(String::new())
        .append_pair("$select", &select)
        .append_pair("$where", &where_clause)
        .append_pair("$order", "issue_date DESC")
        .append_pair("$limit", &limit.to_string())
        .finish();

    RadarQuery {
        url: format!("{}?{}", resource_base(domain, dataset), query),
        where_clause,
        select,
    }
}

fn iso_no_zone(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Result of a feed fetch. Mirrors the request lifecycle instead of
/// short-circuiting: the ranking views respond with their normal shape
/// even when upstream failed, carrying the error in `meta`.
#[derive(Debug)]
pub struct FeedOutcome<'a> {
    pub url: String,
    pub rows: Vec<RawRecord>,
    pub fields: &'a FieldMap,
    pub error: Option<AppError>,
}

/// Fetch the permit feed with the two-shape fallback.
///
/// The primary column-name shape is tried first; on any failure the
/// alternate shape (when the provider declares one) is tried once with
/// identical order/limit semantics. Both failing surfaces the final
/// failure. No further retries, no backoff.
pub async fn fetch_feed<'a>(
    client: &SocrataClient,
    domain: &str,
    dataset: &str,
    provider: &'a Provider,
    fetch_limit: usize,
) -> FeedOutcome<'a> {
    let primary_url = feed_url(domain, dataset, &provider.fields, fetch_limit);
    let primary_err = match client.get_rows(&primary_url).await {
        Ok(rows) => {
            return FeedOutcome {
                url: primary_url,
                rows,
                fields: &provider.fields,
                error: None,
            };
        }
        Err(e) => e,
    };

    let Some(alt_fields) = provider.alt_fields.as_ref() else {
        return FeedOutcome {
            url: primary_url,
            rows: Vec::new(),
            fields: &provider.fields,
            error: Some(primary_err),
        };
    };

    tracing::warn!(
        "Primary feed fetch failed ({}), retrying with alternate shape",
        primary_err
    );
    let alt_url = feed_url(domain, dataset, alt_fields, fetch_limit);
    match client.get_rows(&alt_url).await {
        Ok(rows) => FeedOutcome {
            url: alt_url,
            rows,
            fields: alt_fields,
            error: None,
        },
        Err(e) => FeedOutcome {
            url: alt_url,
            rows: Vec::new(),
            fields: &provider.fields,
            error: Some(e),
        },
    }
}

/// Fetch history rows with the two-shape fallback; both attempts failing
/// propagates the final failure.
pub async fn fetch_history<'a>(
    client: &SocrataClient,
    provider: &'a Provider,
    q: &str,
    fetch_limit: usize,
) -> Result<(String, Vec<RawRecord>, &'a FieldMap)> {
    let primary_url = history_url(provider, &provider.fields, q, fetch_limit);
    let primary_err = match client.get_rows(&primary_url).await {
        Ok(rows) => return Ok((primary_url, rows, &provider.fields)),
        Err(e) => e,
    };

    let Some(alt_fields) = provider.alt_fields.as_ref() else {
        return Err(primary_err);
    };

    tracing::warn!(
        "Primary history fetch failed ({}), retrying with alternate shape",
        primary_err
    );
    let alt_url = history_url(provider, alt_fields, q, fetch_limit);
    let rows = client.get_rows(&alt_url).await?;
    Ok((alt_url, rows, alt_fields))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use chrono::TimeZone;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn la_provider() -> Provider {
        SchemaRegistry::builtin()
            .resolve("la_city")
            .unwrap()
            .provider
            .clone()
    }

    #[test]
    fn test_sanitize_domain() {
        assert_eq!(sanitize_domain("data.lacity.org"), "data.lacity.org");
        assert_eq!(sanitize_domain("https://data.lacity.org/"), "data.lacity.org");
        assert_eq!(sanitize_domain("  http://example.gov//"), "example.gov");
    }

    #[test]
    fn test_feed_url_orders_by_filed_date() {
        let provider = la_provider();
        let url = feed_url("data.lacity.org", "pi9x-tg5x", &provider.fields, 500);
        assert!(url.starts_with("https://data.lacity.org/resource/pi9x-tg5x.json?"));
        assert!(url.contains("%24order=issue_date+DESC"));
        assert!(url.contains("%24limit=500"));
    }

    #[test]
    fn test_history_url_selects_mapped_fields() {
        let provider = la_provider();
        let url = history_url(&provider, &provider.fields, "", 200);
        assert!(url.contains("permit_nbr"));
        assert!(url.contains("work_desc"));
        assert!(url.contains("%24limit=200"));
        assert!(!url.contains("%24q="));
    }

    #[test]
    fn test_history_url_passes_free_text_query() {
        let provider = la_provider();
        let url = history_url(&provider, &provider.fields, "main st", 200);
        assert!(url.contains("%24q=main+st"));
    }

    #[test]
    fn test_history_url_omits_query_without_search_fields() {
        let mut provider = la_provider();
        provider.search_fields.clear();
        let url = history_url(&provider, &provider.fields, "main st", 200);
        assert!(!url.contains("%24q="));
    }

    #[test]
    fn test_radar_query_builds_keyword_like_block() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let query = radar_query(
            "data.lacity.org",
            "pi9x-tg5x",
            &["ROOF", "RE-ROOF"],
            7,
            50,
            now,
        );
        assert!(query.where_clause.contains("issue_date BETWEEN '2025-01-08T12:00:00.000' AND '2025-01-15T12:00:00.000'"));
        assert!(query
            .where_clause
            .contains("upper(work_desc) LIKE '%ROOF%' OR upper(work_desc) LIKE '%RE-ROOF%'"));
        assert!(query.select.contains("permit_nbr"));
        assert!(query.url.contains("%24order=issue_date+DESC"));
    }

    #[test]
    fn test_radar_query_escapes_single_quotes() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let query = radar_query("d", "x", &["O'NEIL"], 7, 50, now);
        assert!(query.where_clause.contains("'%O''NEIL%'"));
    }

    #[test]
    fn test_radar_query_without_terms_has_no_like_block() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let query = radar_query("d", "x", &[], 7, 50, now);
        assert!(!query.where_clause.contains("LIKE"));
        assert!(query.where_clause.contains("issue_date BETWEEN"));
    }

    #[test]
    fn test_count_url() {
        assert_eq!(
            count_url("data.lacity.org", "pi9x-tg5x"),
            "https://data.lacity.org/resource/pi9x-tg5x.json?%24select=count%281%29"
        );
    }

    /// Serve one scripted HTTP response per connection, in order.
    async fn scripted_server(
        responses: Vec<(u16, String)>,
    ) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).await.unwrap();
                    request.extend_from_slice(&buf[..n]);
                    if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });
        (addr, handle)
    }

    fn test_client() -> SocrataClient {
        SocrataClient::new(&crate::models::HttpConfig::default(), None).unwrap()
    }

    const ALT_SHAPE_ROW: &str = r#"[{"pcis_permit":"P-1","address":"1 MAIN ST","zip":"90012","issue_date":"2025-01-10T00:00:00","permit_valuation":"1000","work_description":"reroof"}]"#;

    #[tokio::test]
    async fn test_feed_fetch_retries_alternate_shape_once() {
        let (addr, server) = scripted_server(vec![
            (503, "primary down".to_string()),
            (200, ALT_SHAPE_ROW.to_string()),
        ])
        .await;

        let provider = la_provider();
        let outcome = fetch_feed(
            &test_client(),
            &format!("http://{addr}"),
            "pi9x-tg5x",
            &provider,
            10,
        )
        .await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.rows.len(), 1);
        // The delivered rows came via the alternate column-name shape.
        assert_eq!(outcome.fields.id, "pcis_permit");
        assert!(outcome.url.contains("issue_date+DESC"));
        // Exactly two requests: primary, then one alternate attempt.
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_fetch_surfaces_final_failure_when_both_shapes_fail() {
        let (addr, server) = scripted_server(vec![
            (503, "primary down".to_string()),
            (500, "alt down".to_string()),
        ])
        .await;

        let provider = la_provider();
        let outcome = fetch_feed(
            &test_client(),
            &format!("http://{addr}"),
            "pi9x-tg5x",
            &provider,
            10,
        )
        .await;

        assert!(outcome.rows.is_empty());
        match outcome.error {
            Some(AppError::UpstreamFetch { status, detail }) => {
                // The alternate attempt's failure wins, not the primary's.
                assert_eq!(status, 500);
                assert_eq!(detail, "alt down");
            }
            other => panic!("unexpected outcome error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_feed_fetch_without_alternate_shape_fails_after_one_attempt() {
        let (addr, server) = scripted_server(vec![(503, "down".to_string())]).await;

        let mut provider = la_provider();
        provider.alt_fields = None;
        let outcome = fetch_feed(
            &test_client(),
            &format!("http://{addr}"),
            "pi9x-tg5x",
            &provider,
            10,
        )
        .await;

        match outcome.error {
            Some(AppError::UpstreamFetch { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected outcome error: {other:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_history_fetch_falls_back_to_alternate_shape() {
        let (addr, server) = scripted_server(vec![
            (503, "primary down".to_string()),
            (200, ALT_SHAPE_ROW.to_string()),
        ])
        .await;

        let mut provider = la_provider();
        provider.domain = format!("http://{addr}");
        let (url, rows, fields) = fetch_history(&test_client(), &provider, "", 10)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(fields.id, "pcis_permit");
        assert!(url.contains("pcis_permit"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_history_fetch_propagates_final_failure() {
        let (addr, server) = scripted_server(vec![
            (503, "primary down".to_string()),
            (502, "alt detail".to_string()),
        ])
        .await;

        let mut provider = la_provider();
        provider.domain = format!("http://{addr}");
        let err = fetch_history(&test_client(), &provider, "", 10)
            .await
            .unwrap_err();

        match err {
            AppError::UpstreamFetch { status, detail } => {
                assert_eq!(status, 502);
                assert_eq!(detail, "alt detail");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.await.unwrap();
    }
}
