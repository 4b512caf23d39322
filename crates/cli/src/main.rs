//! Troupe CLI — the main entry point.
//!
//! Starts the character-agent host: loads configuration and the
//! requested character files, then hands control to the supervisor,
//! which owns the process until shutdown.

use clap::Parser;

use troupe_characters::{default_character, load_characters};
use troupe_config::AppConfig;
use troupe_supervisor::Supervisor;

#[derive(Parser)]
#[command(
    name = "troupe",
    about = "Troupe — character-agent host",
    version,
    author
)]
struct Cli {
    /// Character file, or a comma-separated list of character files.
    /// Bare filenames resolve against the characters directory.
    #[arg(short, long)]
    characters: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Split a `--characters` argument into individual path arguments.
fn split_character_args(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let characters = match &cli.characters {
        Some(arg) => {
            let args = split_character_args(arg);
            match load_characters(&args, &config.characters_dir) {
                Ok(characters) => characters,
                Err(e) => {
                    eprintln!("Failed to load characters: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => vec![default_character()],
    };

    let supervisor = Supervisor::new(config);
    let code = supervisor.run(characters).await;
    std::process::exit(code);
}
