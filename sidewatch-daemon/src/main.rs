use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use sidewatch_core::config::SidewatchConfig;
use sidewatch_daemon::cli::DaemonCli;
use sidewatch_daemon::logging;
use sidewatch_daemon::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> ExitCode {
    match run(DaemonCli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "sidewatch terminated");
            eprintln!("sidewatch: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: DaemonCli) -> Result<ExitCode> {
    let mut config = SidewatchConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

    if cli.validate {
        println!("configuration is valid: {}", cli.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "sidewatch starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    let reason = orchestrator.run().await?;
    tracing::info!(reason = ?reason, "sidewatch exiting");
    Ok(ExitCode::from(reason.exit_code()))
}
