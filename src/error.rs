// src/error.rs

//! Unified error handling for the permit API.

use thiserror::Error;

/// Result type alias for permit API operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Maximum length of an upstream response body carried as error detail.
const MAX_DETAIL_LEN: usize = 600;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Upstream returned a non-2xx status
    #[error("upstream {status}: {detail}")]
    UpstreamFetch { status: u16, detail: String },

    /// Network-level failure reaching upstream
    #[error("{0}")]
    UpstreamTransport(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client error outside the upstream fetch path
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Create an upstream-status error, truncating the response body.
    pub fn upstream(status: u16, body: impl AsRef<str>) -> Self {
        Self::UpstreamFetch {
            status,
            detail: truncate_detail(body.as_ref()),
        }
    }

    /// Create an upstream transport error from any displayable cause.
    pub fn transport(cause: impl std::fmt::Display) -> Self {
        Self::UpstreamTransport(cause.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

/// Truncate an upstream body so error payloads stay bounded.
pub fn truncate_detail(body: &str) -> String {
    if body.len() <= MAX_DETAIL_LEN {
        return body.to_string();
    }
    let mut end = MAX_DETAIL_LEN;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body[..end].to_string()
}
