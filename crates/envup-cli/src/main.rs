mod cmd;
mod output;
mod prompt;
mod root;

use clap::{Parser, Subcommand};
use cmd::env::EnvSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "envup",
    about = "Upgrade environment stacks to the latest infrastructure template",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .envup/)
    #[arg(long, global = true, env = "ENVUP_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Show debug output, including skip advisories
    #[arg(long, global = true, short = 'v')]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage environments
    Env {
        #[command(subcommand)]
        subcommand: EnvSubcommand,
    },
}

/// INFO for the long-running upgrade so polling progress shows, WARN
/// otherwise. `-v` always wins.
fn default_level(command: &Commands, verbose: bool) -> tracing::Level {
    match (command, verbose) {
        (_, true) => tracing::Level::DEBUG,
        (
            Commands::Env {
                subcommand: EnvSubcommand::Upgrade { .. },
            },
            false,
        ) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    }
}

fn main() {
    let cli = Cli::parse();

    let default_level = default_level(&cli.command, cli.verbose);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Env { subcommand } => cmd::env::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
