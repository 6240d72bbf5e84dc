// src/models/mod.rs

//! Domain models for the permit API.

mod config;
mod permit;
mod query;

pub use config::{
    AppConfig, CacheConfig, CorsConfig, HttpConfig, IntakeConfig, ServerConfig, UpstreamConfig,
};
pub use permit::{HistoryRecord, PermitRecord, RiskFlag};
pub use query::{HistoryParams, Params, PulseParams, RadarParams, TopParams};
