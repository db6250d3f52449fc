mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;

#[tokio::main]
async fn main() {
    // Optional .env next to the working directory or the binary.
    if dotenvy::dotenv().is_err() {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }

    let cli = cli::Cli::parse();
    if let Err(e) = commands::dispatch(cli).await {
        error::display_error(&e);
        std::process::exit(1);
    }
}
