//! # logrelay
//!
//! Log relay binary: loads settings, installs logging and metrics, and runs
//! the HTTP/WebSocket server until interrupted.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use logrelay_server::RelayServer;
use logrelay_settings::RelaySettings;

/// How long to wait for sessions to drain after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Real-time build log relay.
#[derive(Parser, Debug)]
#[command(name = "logrelay", about = "Real-time build log relay")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Settings file (default `~/.logrelay/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level or filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

/// Load settings from the chosen file and `env`, then apply CLI overrides.
fn resolve_settings<F>(cli: &Cli, env: F) -> Result<RelaySettings>
where
    F: Fn(&str) -> Option<String>,
{
    let path = cli.config.clone().unwrap_or_else(logrelay_settings::settings_path);
    let mut settings = logrelay_settings::load_settings_with_env(&path, env)
        .with_context(|| format!("Failed to load settings from {}", path.display()))?;
    if let Some(host) = &cli.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(level) = &cli.log_level {
        settings.logging.level.clone_from(level);
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = resolve_settings(&cli, |key| std::env::var(key).ok())?;

    logrelay_logging::init_subscriber(&settings.logging.level, settings.logging.format);

    let metrics_handle = logrelay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let server = RelayServer::from_settings(&settings, metrics_handle)
        .context("Failed to configure authentication")?;

    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        origins = settings.origins.allowed.len(),
        "log relay listening on http://{addr}"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    let drained = server
        .shutdown()
        .graceful_shutdown(vec![handle], Some(SHUTDOWN_GRACE))
        .await;
    if !drained {
        tracing::warn!("forced exit with connections still open");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
