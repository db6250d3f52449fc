use colored::Colorize;

/// Format an error for CLI display with contextual help messages.
pub fn display_error(err: &anyhow::Error) {
    let chain = format!("{err:#}");

    if chain.contains("unable to open database file") || chain.contains("error connecting to") {
        eprintln!("  {} Cannot open the trait change log", "ERROR".red().bold());
        eprintln!(
            "        Check the URL, e.g. {}",
            "--db sqlite://anima.db?mode=rwc".dimmed()
        );
    } else if chain.contains("Failed to parse evolution config") {
        eprintln!("  {} {}", "ERROR".red().bold(), err);
        for cause in err.chain().skip(1) {
            eprintln!("        {} {cause}", "caused by:".dimmed());
        }
        eprintln!(
            "        Start from the defaults with: {}",
            "anima config init --force".dimmed()
        );
    } else {
        eprintln!("  {} {}", "ERROR".red().bold(), err);
        // Print cause chain
        for cause in err.chain().skip(1) {
            eprintln!("        {} {cause}", "caused by:".dimmed());
        }
    }
}
