//! leadgen-gw - lead-generation API gateway
//!
//! Serves the `/api/*` proxy surface for the lead-generation front-end.

use anyhow::Result;
use clap::Parser;
use leadgen_common::config::{default_config_path, load_toml_config, TomlConfig};
use leadgen_gw::config::GatewayConfig;
use leadgen_gw::{build_router, AppState};
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "leadgen-gw")]
#[command(about = "Lead-generation API gateway")]
#[command(version)]
struct Args {
    /// Address to listen on (default 127.0.0.1:8787)
    #[arg(short, long, env = "LEADGEN_BIND")]
    bind: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, env = "LEADGEN_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting leadgen-gw v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let toml_config = match args.config.or_else(default_config_path) {
        Some(path) => {
            info!("Config file: {}", path.display());
            load_toml_config(&path)?
        }
        None => TomlConfig::default(),
    };

    let config = GatewayConfig::resolve(args.bind.as_deref(), &toml_config)?;
    config.credentials.log_presence();

    let state = match AppState::from_config(&config) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize routers: {}", e);
            return Err(e.into());
        }
    };
    info!(
        routes = state.dispatcher.registered_paths().len(),
        "Routers initialized"
    );

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("leadgen-gw listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
