// src/models/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Outbound HTTP client settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Upstream open-data portal settings
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// CORS origin allow-list
    #[serde(default)]
    pub cors: CorsConfig,

    /// Response cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Pilot-intake forwarding settings
    #[serde(default)]
    pub intake: IntakeConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return defaults if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply environment overrides for values that should not live in a
    /// checked-in config file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("SOC_APP_TOKEN") {
            if !token.trim().is_empty() {
                self.upstream.app_token = Some(token);
            }
        }
        if let Ok(domain) = std::env::var("SOC_DOMAIN") {
            if !domain.trim().is_empty() {
                self.upstream.domain = domain;
            }
        }
        if let Ok(dataset) = std::env::var("SOC_DATASET") {
            if !dataset.trim().is_empty() {
                self.upstream.dataset = dataset;
            }
        }
        if let Ok(target) = std::env::var("FORWARD_TO") {
            if !target.trim().is_empty() {
                self.intake.forward_to = Some(target);
            }
        }
        self
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::config("server.port must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::config("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::config("http.timeout_secs must be > 0"));
        }
        if self.upstream.domain.trim().is_empty() {
            return Err(AppError::config("upstream.domain is empty"));
        }
        if self.upstream.dataset.trim().is_empty() {
            return Err(AppError::config("upstream.dataset is empty"));
        }
        if self.cors.allowed_origins.is_empty() {
            return Err(AppError::config("cors.allowed_origins is empty"));
        }
        if self.cache.history_ttl_secs == 0 {
            return Err(AppError::config("cache.history_ttl_secs must be > 0"));
        }
        Ok(())
    }
}

/// Listen address settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
        }
    }
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for upstream requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Upstream open-data portal settings for the single-city views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "defaults::domain")]
    pub domain: String,

    #[serde(default = "defaults::dataset")]
    pub dataset: String,

    /// Socrata application token, sent as `X-App-Token` when present
    #[serde(default)]
    pub app_token: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            domain: defaults::domain(),
            dataset: defaults::dataset(),
            app_token: None,
        }
    }
}

/// CORS origin allow-list. Requests from other origins are answered with
/// the first configured origin rather than rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "defaults::allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: defaults::allowed_origins(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL for cached history-search responses, in seconds
    #[serde(default = "defaults::history_ttl")]
    pub history_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            history_ttl_secs: defaults::history_ttl(),
        }
    }
}

/// Pilot-intake forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    /// Webhook URL leads are forwarded to, fire-and-forget
    #[serde(default)]
    pub forward_to: Option<String>,

    /// TTL for the lead-store backup entry, in seconds
    #[serde(default = "defaults::lead_ttl")]
    pub lead_ttl_secs: u64,

    /// Hostnames that identify this service itself; forwarding targets
    /// resolving here are skipped to avoid request loops
    #[serde(default = "defaults::self_hosts")]
    pub self_hosts: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            forward_to: None,
            lead_ttl_secs: defaults::lead_ttl(),
            self_hosts: defaults::self_hosts(),
        }
    }
}

mod defaults {
    // Server defaults
    pub fn host() -> String {
        "0.0.0.0".into()
    }
    pub fn port() -> u16 {
        8080
    }

    // HTTP client defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; permitpulse/1.0)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Upstream defaults (LADBS permits on the LA open-data portal)
    pub fn domain() -> String {
        "data.lacity.org".into()
    }
    pub fn dataset() -> String {
        "pi9x-tg5x".into()
    }

    // CORS defaults
    pub fn allowed_origins() -> Vec<String> {
        vec![
            "https://getpermitpulse.com".into(),
            "https://www.getpermitpulse.com".into(),
        ]
    }

    // Cache defaults
    pub fn history_ttl() -> u64 {
        120
    }

    // Intake defaults
    pub fn lead_ttl() -> u64 {
        60 * 60 * 24 * 90
    }
    pub fn self_hosts() -> Vec<String> {
        vec!["api.getpermitpulse.com".into()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_validates() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_origins() {
        let mut config = AppConfig::default();
        config.cors.allowed_origins.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = AppConfig::default();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 9090\n\n[upstream]\ndomain = \"data.example.gov\""
        )
        .unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.upstream.domain, "data.example.gov");
        // Untouched sections keep their defaults.
        assert_eq!(config.upstream.dataset, "pi9x-tg5x");
        assert_eq!(config.cache.history_ttl_secs, 120);
    }

    #[test]
    fn test_load_or_default_tolerates_missing_file() {
        let config = AppConfig::load_or_default("/nonexistent/config.toml");
        assert_eq!(config.server.port, 8080);
    }
}
