//! botteam daemon: runs the bot team in the background until ctrl-c.

use anyhow::{Context, Result};
use bt_core::config::Config;
use bt_daemon::daemon::Daemon;
use bt_telemetry::logging::{self, LogFormat};
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::var_os("BOTTEAM_CONFIG") {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load config")?;

    logging::init(
        "botteam-daemon",
        &config.general.log_level,
        LogFormat::from_config(&config.general.log_format),
    );
    info!(
        project = %config.general.project_name,
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "botteam daemon starting"
    );

    let daemon = Daemon::new(config).context("failed to initialize daemon")?;
    let shutdown = daemon.shutdown_handle();

    // Wire ctrl-c to trigger graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run().await
}
