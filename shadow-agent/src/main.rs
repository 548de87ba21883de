//! shadow-agent binary entry point.
//!
//! Usage:
//! ```bash
//! shadow-agent --config agent.toml
//! shadow-agent --delta '{"config":{"display":"HELLO"}}' --provision stop
//! shadow-agent --help
//! ```

use anyhow::{Context, Result};
use cellshadow_agent::config::{Config, SessionMode};
use cellshadow_agent::sim::{ProvisioningRun, SimulatedDevice};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Run a cellshadow device against simulated collaborators.
#[derive(Parser, Debug)]
#[command(name = "shadow-agent")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Desired-state delta served by the simulated cloud (repeatable)
    #[arg(long = "delta", value_name = "JSON")]
    deltas: Vec<String>,

    /// How the simulated provisioning run ends
    #[arg(long, value_enum, default_value_t = ProvisioningRun::Stop)]
    provision: ProvisioningRun,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path).context("failed to load configuration")?,
        None => Config::default(),
    };

    let mode = match config.engine.session {
        SessionMode::Persistent => "persistent session",
        SessionMode::PerCycle => "session per cycle",
    };
    tracing::info!("shadow-agent v{} started", env!("CARGO_PKG_VERSION"));
    tracing::info!("Current mode: {}", mode);
    tracing::info!(
        "Poll interval: {:.1} minutes",
        config.engine.poll_interval_secs as f64 / 60.0
    );

    let device = SimulatedDevice::new(&config, &cli.deltas, cli.provision);
    let coordinator = device.coordinator(config.coordinator_config());

    tokio::select! {
        result = coordinator.run() => {
            let err = match result {
                Ok(never) => match never {},
                Err(e) => e,
            };
            Err(err).context("device startup failed")
        }
        _ = device.restart.wait() => {
            tracing::info!("Restarting, agent exits");
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
