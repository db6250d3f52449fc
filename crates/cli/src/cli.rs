use anima_core::evolution::TimeWindow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "anima",
    about = "Anima: personality trait evolution for AI agents",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Output raw JSON (for scripting/piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Evolution config file (default: <config dir>/anima/evolution.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one evolution step and print the adjusted traits
    Process {
        /// JSON array of interaction events
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
        /// JSON object with the current value of every trait
        #[arg(long, value_name = "FILE")]
        traits: PathBuf,
        /// JSON evolution context (agent record, actor, environment)
        #[arg(long, value_name = "FILE")]
        context: Option<PathBuf>,
        /// Agent ID (defaults to the agent in the context)
        #[arg(long)]
        agent: Option<String>,
        /// Actor ID (overrides the context)
        #[arg(long)]
        actor: Option<String>,
        /// JSON recent-change accumulators (daily/weekly/monthly)
        #[arg(long, value_name = "FILE", conflicts_with = "db")]
        recent: Option<PathBuf>,
        /// SQLite URL of the trait change log (e.g. sqlite://anima.db)
        #[arg(long, value_name = "URL")]
        db: Option<String>,
        /// Append the applied deltas to the change log
        #[arg(long, requires = "db")]
        record: bool,
    },

    /// Summarize an event file without changing any traits
    Analyze {
        /// JSON array of interaction events
        #[arg(long, value_name = "FILE")]
        events: PathBuf,
        /// Analysis window: daily, weekly, monthly, quarterly (default from config)
        #[arg(long)]
        window: Option<TimeWindow>,
    },

    /// Inspect or create the evolution config
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Check the configuration and list every problem
    Validate,
    /// Write the default configuration to the config path
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}
