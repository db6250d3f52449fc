use anima_core::evolution::{EvolutionResult, InteractionPattern};
use anima_core::ValidationReport;
use anima_shared::TraitVector;
use colored::Colorize;
use comfy_table::{presets::NOTHING, CellAlignment, ContentArrangement, Table};
use std::collections::BTreeMap;
use std::fmt::Display;

/// Print a decorated section header.
pub fn print_header(title: &str) {
    let line = "─".repeat(36);
    println!();
    println!("  {}", title.bold());
    println!("  {}", line.dimmed());
}

/// Key/value line in the dimmed-label style.
pub fn print_field(label: &str, value: impl Display) {
    println!("  {} {value}", format!("{label}:").dimmed());
}

/// Signed delta, green up, red down, dim when unchanged.
pub fn format_delta(delta: f64) -> String {
    let text = format!("{delta:+.4}");
    if delta > 0.0 {
        text.green().to_string()
    } else if delta < 0.0 {
        text.red().to_string()
    } else {
        text.dimmed().to_string()
    }
}

fn plain_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Current vs. new value for every trait, with the raw and limited deltas.
pub fn print_trait_table(current: &TraitVector, result: &EvolutionResult) {
    let mut table = plain_table();
    table.set_header(vec!["  trait", "current", "raw", "anchored", "applied", "new"]);

    for (kind, value) in current.iter() {
        let adjustment = &result.adjustment;
        table.add_row(vec![
            format!("  {}", kind.as_str().bold()),
            format!("{value:.4}"),
            format!("{:+.4}", adjustment.raw_delta[kind]).dimmed().to_string(),
            format!("{:+.4}", adjustment.anchored_delta[kind]).dimmed().to_string(),
            format_delta(adjustment.limited_delta[kind]),
            format!("{:.4}", result.new_traits[kind]),
        ]);
    }
    for index in 1..6 {
        if let Some(column) = table.column_mut(index) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }

    println!("{table}");
}

pub fn print_result(current: &TraitVector, result: &EvolutionResult) {
    let status = if result.success {
        "✓ success".green().bold().to_string()
    } else {
        "✗ failed".red().bold().to_string()
    };

    print_header("Evolution Result");
    print_field("status", status);
    print_field("agent", &result.agent_id);
    if let Some(actor) = &result.actor_id {
        print_field("actor", actor);
    }
    print_field("result", result.result_id.to_string().dimmed());
    print_field(
        "events",
        format!(
            "{} processed / {} received ({} dropped)",
            result.metadata.events_processed, result.metadata.events_received, result.metadata.events_dropped
        ),
    );
    print_field("confidence", format!("{:.3}", result.adjustment.confidence));
    print_field("stability", format!("{:.3}", result.adjustment.stability_score));
    print_field(
        "time",
        format!(
            "{:.2} ms{}",
            result.metadata.processing_time_ms,
            if result.metadata.cache_hit { " (pattern cached)" } else { "" }
        ),
    );

    if result.success {
        print_header("Traits");
        print_trait_table(current, result);
    }

    if !result.adjustment.applied_limits.is_empty() {
        print_header("Applied Limits");
        for limit in &result.adjustment.applied_limits {
            println!("  {} {limit}", "•".yellow());
        }
    }
    print_messages(&result.warnings, &result.errors);
    println!();
}

/// Warnings in yellow, errors in red.
pub fn print_messages(warnings: &[String], errors: &[String]) {
    if !warnings.is_empty() {
        print_header("Warnings");
        for warning in warnings {
            println!("  {} {warning}", "⚠".yellow());
        }
    }
    if !errors.is_empty() {
        print_header("Errors");
        for error in errors {
            println!("  {} {error}", "✗".red());
        }
    }
}

fn print_distribution<K: Display>(title: &str, distribution: &BTreeMap<K, f64>) {
    if distribution.is_empty() {
        return;
    }
    let mut table = plain_table();
    for (key, share) in distribution {
        let bar = "█".repeat((share * 20.0).round() as usize);
        table.add_row(vec![
            format!("    {key}"),
            format!("{:>5.1}%", share * 100.0),
            bar.cyan().to_string(),
        ]);
    }
    println!("  {}", title.dimmed());
    println!("{table}");
}

pub fn print_pattern(pattern: &InteractionPattern) {
    print_header("Interaction Pattern");
    print_field("window", pattern.window);
    print_field("interactions", pattern.total_interactions);
    if pattern.total_interactions == 0 {
        println!("  {}", "No usable events.".dimmed());
        return;
    }
    print_field("per day", format!("{:.2}", pattern.interaction_frequency));
    if let Some(kind) = pattern.dominant_interaction_type() {
        print_field("dominant", kind.as_str().bold());
    }
    print_field("engagement", format!("{:.2} (trend {:+.3})", pattern.average_engagement, pattern.engagement_trend));
    print_field("complexity", format!("{:.2} (trend {:+.3})", pattern.average_complexity, pattern.complexity_trend));
    match pattern.average_satisfaction {
        Some(satisfaction) => print_field(
            "satisfaction",
            format!("{satisfaction:.2} (trend {:+.3})", pattern.satisfaction_trend),
        ),
        None => print_field("satisfaction", "(not reported)".dimmed()),
    }
    print_field("topic diversity", format!("{:.2}", pattern.topic_diversity));
    println!();

    print_distribution("types", &pattern.type_distribution);
    print_distribution("modes", &pattern.mode_distribution);
    print_distribution("engagement", &pattern.engagement_distribution);
    print_distribution("time of day", &pattern.time_of_day_distribution);
}

pub fn print_report(report: &ValidationReport) {
    if report.is_valid {
        println!("  {} configuration is valid", "✓".green().bold());
    } else {
        println!(
            "  {} configuration has {} error(s)",
            "✗".red().bold(),
            report.errors.len()
        );
    }
    print_messages(&report.warnings, &report.errors);
}
