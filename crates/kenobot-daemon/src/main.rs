//! The KenoBot daemon binary.
//!
//! Loads configuration, sets up logging, wires a [`Kenobot`] instance,
//! writes the PID file, and runs until SIGINT/SIGTERM, then stops
//! everything in order. Recoverable errors never exit the process; only
//! lifecycle signals do.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use kenobot_config::Config;
use kenobot_core::{DataPaths, PidFile};
use kenobot_llm::{ClaudeProvider, ProviderConfig};
use kenobot_runtime::Kenobot;
use kenobot_telemetry::{LogConfig, setup_logging};

/// KenoBot - a long-running personal assistant daemon.
#[derive(Debug, Parser)]
#[command(name = "kenobot", version, about)]
struct Cli {
    /// Path to the config file (defaults apply when omitted).
    #[arg(short, long, env = "KENOBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, env = "KENOBOT_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = kenobot_config::load(cli.config.as_deref()).context("loading config")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }

    let mut log_config = LogConfig::new(&config.logging.level)
        .with_format(config.logging.format.parse().unwrap_or_default());
    for directive in &config.logging.directives {
        log_config = log_config.with_directive(directive);
    }
    setup_logging(&log_config).context("setting up logging")?;

    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    let paths = DataPaths::new(config.data_dir());
    paths.ensure_layout().context("creating data directories")?;
    let _pid_file = PidFile::write(paths.pid_file()).context("writing pid file")?;

    let provider = ClaudeProvider::new(provider_config(&config));
    let bot = Kenobot::build(&config, Box::new(provider)).context("wiring the daemon")?;

    let addr = bot.start().await.context("starting the daemon")?;
    info!(%addr, data_dir = %config.data_dir().display(), "kenobot running");

    wait_for_shutdown().await;

    info!("shutdown signal received, stopping");
    bot.stop().await;
    Ok(())
}

fn provider_config(config: &Config) -> ProviderConfig {
    if config.provider.api_key.is_empty() {
        error!("provider.api_key is not set; provider calls will fail until it is");
    }
    let mut provider = ProviderConfig::new(&config.provider.api_key, &config.provider.model)
        .max_tokens(config.provider.max_tokens);
    if let Some(base_url) = &config.provider.base_url {
        provider = provider.base_url(base_url);
    }
    provider
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
