use anyhow::Result;
use colored::Colorize;
use std::path::Path;

use crate::cli::ConfigCommand;
use crate::config::{self, ConfigSource};
use crate::output;

const ENV_OVERRIDES: &[&str] = &["ANIMA_LOG_LEVEL", "ANIMA_CACHE_ENABLED", "ANIMA_MAX_EVENTS"];

pub fn run(cmd: ConfigCommand, explicit: Option<&Path>, json_mode: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Show => show(explicit, json_mode),
        ConfigCommand::Validate => validate(explicit, json_mode),
        ConfigCommand::Init { force } => init(explicit, force, json_mode),
        ConfigCommand::Path => path(explicit, json_mode),
    }
}

fn show(explicit: Option<&Path>, json_mode: bool) -> Result<()> {
    let loaded = config::load(explicit)?;

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&loaded.config)?);
        return Ok(());
    }

    output::print_header("Evolution Configuration");
    match &loaded.source {
        ConfigSource::File(path) => output::print_field("file", path.display()),
        ConfigSource::Defaults => output::print_field("file", "(none, using defaults)".dimmed()),
    }
    println!();
    for line in loaded.config.to_toml_string()?.lines() {
        println!("  {line}");
    }
    println!();

    // Show environment overrides if active
    for var in ENV_OVERRIDES {
        if std::env::var(var).is_ok() {
            println!("  {} {var} environment variable is active", "ℹ".blue());
        }
    }
    Ok(())
}

fn validate(explicit: Option<&Path>, json_mode: bool) -> Result<()> {
    let loaded = config::load(explicit)?;
    let report = loaded.config.validate();

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::print_header("Config Validation");
        output::print_report(&report);
        println!();
    }

    if !report.is_valid {
        anyhow::bail!("Configuration has {} error(s)", report.errors.len());
    }
    Ok(())
}

fn init(explicit: Option<&Path>, force: bool, json_mode: bool) -> Result<()> {
    let path = config::resolve_path(explicit)?;
    config::init(&path, force)?;

    if json_mode {
        println!("{}", serde_json::json!({ "path": path.display().to_string(), "written": true }));
    } else {
        println!("  {} wrote {}", "✓".green().bold(), path.display());
    }
    Ok(())
}

fn path(explicit: Option<&Path>, json_mode: bool) -> Result<()> {
    let path = config::resolve_path(explicit)?;
    if json_mode {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "exists": path.exists() })
        );
    } else {
        println!("{}", path.display());
    }
    Ok(())
}
