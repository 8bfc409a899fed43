//! CLI frontend for the microsimulation runtime.

mod commands;
mod models;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ms",
    about = "Discrete-event microsimulation runner",
    version,
    propagate_version = true
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a bundled model
    Run {
        /// Model name (see `ms models`)
        model: String,

        /// Number of replicates, each on its own thread
        #[arg(short = 'n', long, default_value = "1")]
        replicates: u32,

        /// Base seed shared by all replicates
        #[arg(short, long)]
        seed: Option<u64>,

        /// Stop once the next event lies beyond this time
        #[arg(long)]
        horizon: Option<f64>,

        /// Age entities just in time instead of all at once
        #[arg(long)]
        jit: bool,

        /// Record and print the event trace of the first replicate
        #[arg(long)]
        trace: bool,

        /// TOML file with run configuration; flags override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print replicate summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List bundled models
    Models,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            model,
            replicates,
            seed,
            horizon,
            jit,
            trace,
            config,
            json,
        } => commands::run::run(&commands::run::RunOptions {
            model,
            replicates,
            seed,
            horizon,
            jit,
            trace,
            config,
            json,
        }),
        Commands::Models => commands::models::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
