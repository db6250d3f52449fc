use anima_core::evolution::preprocess::{events_from_json, prepare_events};
use anima_core::evolution::{pattern, InteractionPattern, TimeWindow};
use anima_core::{Clock, EvolutionConfig, SystemClock};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::read_json;
use crate::output;

#[derive(Serialize)]
struct AnalyzeOutput {
    pattern: InteractionPattern,
    events_dropped: usize,
    warnings: Vec<String>,
}

pub fn run(config: &EvolutionConfig, events_path: &Path, window: Option<TimeWindow>, json_mode: bool) -> Result<()> {
    let raw_events: Vec<serde_json::Value> = read_json(events_path)?;
    let out = summarize(config, raw_events, window, &SystemClock);

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    output::print_pattern(&out.pattern);
    output::print_messages(&out.warnings, &[]);
    println!();
    Ok(())
}

/// Preprocess against `clock` and analyze. Ages and the future-skew check use `clock.now()`.
fn summarize(
    config: &EvolutionConfig,
    raw_events: Vec<serde_json::Value>,
    window: Option<TimeWindow>,
    clock: &dyn Clock,
) -> AnalyzeOutput {
    let (events, unparseable) = events_from_json(raw_events);
    let prepared = prepare_events(&events, clock.now(), config);

    let mut warnings = prepared.warnings;
    if unparseable > 0 {
        warnings.push(format!("{unparseable} event(s) could not be parsed"));
    }
    AnalyzeOutput {
        pattern: pattern::analyze(&prepared.events, window.unwrap_or(config.analysis_window)),
        events_dropped: prepared.dropped + unparseable,
        warnings,
    }
}
