pub mod analyze;
pub mod config_cmd;
pub mod process;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use anima_core::EvolutionConfig;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use crate::cli::*;
use crate::config;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let explicit = cli.config.as_deref();

    match cli.command {
        // Works even when the config file is broken.
        Commands::Config(cmd) => config_cmd::run(cmd, explicit, cli.json),
        Commands::Process {
            events,
            traits,
            context,
            agent,
            actor,
            recent,
            db,
            record,
        } => {
            let config = load_config(explicit)?;
            let args = process::ProcessArgs {
                events,
                traits,
                context,
                agent,
                actor,
                recent,
                db,
                record,
            };
            process::run(config, args, cli.json).await
        }
        Commands::Analyze { events, window } => {
            let config = load_config(explicit)?;
            analyze::run(&config, &events, window, cli.json)
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<EvolutionConfig> {
    let loaded = config::load(explicit)?;
    init_tracing(&loaded.config.logging.level);
    Ok(loaded.config)
}

/// `RUST_LOG` wins over `logging.level`. Logs go to stderr so `--json` stays clean.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
