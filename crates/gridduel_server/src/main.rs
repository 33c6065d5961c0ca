//! Gridduel - unified CLI
//!
//! Serves one shared game session over WebSockets.

#![warn(missing_docs)]

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use gridduel_server::{GameSession, LivenessPolicy, ServerConfig, router};
use std::path::PathBuf;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            board_size,
            run_length,
            reset_delay_ms,
            ping_interval_ms,
            max_missed_pongs,
            reject_duplicate_clients,
        } => {
            let mut settings = load_config(config)?;
            if let Some(host) = host {
                settings = settings.with_host(host);
            }
            if let Some(port) = port {
                settings = settings.with_port(port);
            }
            if let Some(size) = board_size {
                settings = settings.with_board_size(size);
            }
            if let Some(run_length) = run_length {
                settings = settings.with_run_length(run_length);
            }
            if let Some(delay) = reset_delay_ms {
                settings = settings.with_reset_delay_ms(delay);
            }
            if let Some(interval) = ping_interval_ms {
                settings = settings.with_ping_interval_ms(interval);
            }
            if let Some(missed) = max_missed_pongs {
                settings = settings.with_max_missed_pongs(missed);
            }
            if let Some(reject) = reject_duplicate_clients {
                settings = settings.with_reject_duplicate_clients(reject);
            }
            run_server(settings).await
        }
        Command::Config { config } => {
            let settings = load_config(config)?;
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

/// Defaults, then the file, then `GRIDDUEL_*` environment overrides.
fn load_config(path: Option<PathBuf>) -> Result<ServerConfig> {
    let config = ServerConfig::load(path.as_deref())?.with_env_overrides()?;
    Ok(config)
}

/// Run the WebSocket game server until Ctrl-C.
#[instrument(skip(config))]
async fn run_server(config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,gridduel_server=debug")),
        )
        .init();

    config.validate()?;
    let session = GameSession::from_config(&config)?;
    let app = router(session.clone(), LivenessPolicy::from_config(&config));

    let addr = format!("{}:{}", config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        %addr,
        size = config.board_size(),
        run_length = config.run_length(),
        "Gridduel listening on ws://{}/play/socket",
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    session.shutdown();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
