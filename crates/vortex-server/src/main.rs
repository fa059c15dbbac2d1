use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use vortex_models::VortexConfig;
use vortex_server::{build_state, router};

#[derive(Parser, Debug)]
#[command(
    name = "vortex-server",
    about = "Quantum Vortex analysis service - rotates backend credentials, fuses market context, and serves signal analysis over HTTP"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/vortex.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config: VortexConfig =
        toml::from_str(&config_str).with_context(|| "Failed to parse config")?;

    let state = Arc::new(build_state(&config));
    let app = router(state, config.server.enable_cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "vortex server listening");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Received shutdown signal");
        shutdown.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("Server error")?;

    Ok(())
}
