//! Overdub CLI - Offline Vocal Mixdown
//!
//! Command-line interface for the Overdub mixdown engine.

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;

use overdub::cli::{commands, Cli, Commands};
use overdub::mixdown::MixMode;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Overdub v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Overdub v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Mix { mix, output } => {
            commands::mix(&mix, MixMode::Export, &output)
                .with_context(|| format!("export mix to {} failed", output.display()))?;
        }
        Commands::Preview { mix, output } => {
            commands::mix(&mix, MixMode::Preview, &output)
                .with_context(|| format!("preview mix to {} failed", output.display()))?;
        }
        Commands::Impulse {
            sample_rate,
            seed,
            output,
        } => commands::impulse(sample_rate, seed, &output)
            .with_context(|| format!("writing impulse to {} failed", output.display()))?,
        Commands::Inspect { path } => commands::inspect(&path)
            .with_context(|| format!("cannot inspect {}", path.display()))?,
    }
    Ok(())
}
