// src/intake.rs

//! Pilot lead intake: validation, durable backup, and fire-and-forget
//! webhook forwarding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::Result;

/// Fields a lead submission must carry non-blank values for.
pub const REQUIRED_FIELDS: &[&str] = &["name", "company", "phone", "email"];

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Required fields that are absent or blank, in declaration order.
pub fn missing_fields(data: &Map<String, Value>) -> Vec<&'static str> {
    REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| is_blank(data.get(*field)))
        .collect()
}

/// Enrich the submitted object with receipt metadata. Submitted keys are
/// kept as-is.
pub fn build_payload(
    mut data: Map<String, Value>,
    user_agent: &str,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    data.insert(
        "receivedAt".to_string(),
        Value::String(now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    );
    data.insert("ua".to_string(), Value::String(user_agent.to_string()));
    data
}

/// Storage key for a lead backup entry.
pub fn lead_key(payload: &Map<String, Value>, now: DateTime<Utc>) -> String {
    let email = payload
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default();
    format!("pilot:{}:{}", email, now.timestamp_millis())
}

/// Forwarding targets that resolve back to this service are skipped to
/// avoid request loops.
pub fn is_self_fetch_target(target: &str, self_hosts: &[String]) -> bool {
    let Ok(url) = url::Url::parse(target) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_lowercase();
    host.ends_with(".workers.dev") || self_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host))
}

/// Forward a lead to the configured webhook without blocking the response.
/// Delivery failures are logged and dropped; the backup entry is the
/// durable copy.
pub fn forward_detached(client: reqwest::Client, target: String, payload: Value) {
    tokio::spawn(async move {
        let result = client.post(&target).json(&payload).send().await;
        match result {
            Ok(response) if !response.status().is_success() => {
                tracing::warn!("Lead forward to {} returned {}", target, response.status());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Lead forward to {} failed: {}", target, e);
            }
        }
    });
}

/// Durable backup storage for submitted leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn put(&self, key: &str, payload: &Value, ttl_secs: u64) -> Result<()>;
}

#[derive(Debug)]
struct StoredLead {
    key: String,
    payload: Value,
    expires_at: Instant,
}

/// In-memory lead store. A persistent backend slots in behind the same
/// trait.
#[derive(Debug, Default)]
pub struct MemoryLeadStore {
    entries: Arc<RwLock<Vec<StoredLead>>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .filter(|lead| lead.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch an unexpired lead by key.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .iter()
            .find(|lead| lead.key == key && lead.expires_at > now)
            .map(|lead| lead.payload.clone())
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn put(&self, key: &str, payload: &Value, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.push(StoredLead {
            key: key.to_string(),
            payload: payload.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl_secs),
        });
        Ok(())
    }
}
