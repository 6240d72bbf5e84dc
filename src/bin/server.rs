// src/bin/server.rs

//! Permit API server entry point.

use std::sync::Arc;

use axum::extract::Request;
use axum::ServiceExt;
use clap::Parser;
use tower_http::normalize_path::NormalizePath;
use tracing_subscriber::EnvFilter;

use permitpulse::error::Result;
use permitpulse::models::AppConfig;
use permitpulse::server::{build_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "permitpulse", about = "Building-permit aggregation API", version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("permitpulse=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config).with_env_overrides();
    config.validate()?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(
        "Upstream dataset {} on {}",
        config.upstream.dataset,
        config.upstream.domain
    );

    let state = Arc::new(AppState::new(config)?);
    tracing::info!(
        "Serving {} jurisdiction(s) on {}",
        state.registry.all().len(),
        addr
    );

    // Trailing-slash normalization must run before routing, so it wraps
    // the router instead of living inside it.
    let app = NormalizePath::trim_trailing_slash(build_router(state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app)).await?;
    Ok(())
}
