use anima_core::evolution::preprocess::events_from_json;
use anima_core::{EvolutionConfig, EvolutionEngine, InMemoryRecentChangeStore, SqliteRecentChangeStore, SystemClock};
use anima_shared::{EvolutionContext, RecentChangeStore, RecentChanges, TraitVector};
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::read_json;
use crate::output;

pub struct ProcessArgs {
    pub events: PathBuf,
    pub traits: PathBuf,
    pub context: Option<PathBuf>,
    pub agent: Option<String>,
    pub actor: Option<String>,
    pub recent: Option<PathBuf>,
    pub db: Option<String>,
    pub record: bool,
}

pub async fn run(config: EvolutionConfig, args: ProcessArgs, json_mode: bool) -> Result<()> {
    let config = config.validated().context("Invalid evolution config")?;

    let raw_events: Vec<serde_json::Value> = read_json(&args.events)?;
    let (events, unparseable) = events_from_json(raw_events);
    if unparseable > 0 {
        warn!(count = unparseable, file = %args.events.display(), "Skipping events that do not parse");
    }
    let current: TraitVector = read_json(&args.traits)?;
    let context: EvolutionContext = match &args.context {
        Some(path) => read_json(path)?,
        None => EvolutionContext::default(),
    };

    let agent_id = args
        .agent
        .clone()
        .or_else(|| context.agent.as_ref().map(|agent| agent.id.clone()))
        .context("No agent ID: pass --agent or include an agent record in the context file")?;

    // Keep a typed handle for --record; the engine only sees the trait object.
    let sqlite = match &args.db {
        Some(url) => {
            let store = SqliteRecentChangeStore::connect(url, Arc::new(SystemClock)).await?;
            store.init().await?;
            Some(Arc::new(store))
        }
        None => None,
    };
    let store: Arc<dyn RecentChangeStore> = match (&sqlite, &args.recent) {
        (Some(store), _) => store.clone(),
        (None, Some(path)) => {
            let recent: RecentChanges = read_json(path)?;
            let store = InMemoryRecentChangeStore::new();
            store.set(&agent_id, recent);
            Arc::new(store)
        }
        (None, None) => Arc::new(InMemoryRecentChangeStore::new()),
    };

    let engine = EvolutionEngine::new(config, store);
    let result = engine
        .process_evolution(&agent_id, args.actor.as_deref(), &events, &current, &context)
        .await;

    let mut recorded = None;
    if let Some(store) = sqlite.as_ref().filter(|_| args.record && result.success) {
        let rows = store
            .record_changes(&agent_id, &result.adjustment.limited_delta)
            .await
            .context("Failed to record applied deltas")?;
        info!(agent_id = %agent_id, rows, "Recorded trait changes");
        recorded = Some(rows);
    }

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if unparseable > 0 {
            println!(
                "  {} {unparseable} event(s) in {} could not be parsed",
                "⚠".yellow(),
                args.events.display()
            );
        }
        output::print_result(&current, &result);
        if let Some(rows) = recorded {
            println!("  {} recorded {rows} trait change(s)", "✓".green().bold());
            println!();
        }
    }

    if !result.success {
        anyhow::bail!("Evolution failed for {agent_id}: {}", result.errors.join("; "));
    }
    Ok(())
}
