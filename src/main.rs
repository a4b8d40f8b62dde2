//! # Transient Analysis Entry Point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use transient_analysis::{
    app::App,
    cli::{self, Cli},
    config::ConfigLoader,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        debug!(config = %redacted_json, "Effective configuration");
    }

    let app = App::bootstrap(&config).await?;

    let result = tokio::select! {
        result = cli::run(cli.command, &app) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; returning in-flight requests to pending");
            Ok(())
        }
    };

    app.shutdown().await;
    result
}
