use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "fitrack")]
#[command(about = "FITRACK - browse exercises, run timed sessions, review your history", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the local document store (defaults to the platform data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the demo exercises to an empty catalog
    Seed,
    /// List the available exercises
    Exercises,
    /// Run a timed session for one exercise
    Train {
        /// Id of the exercise (see `fitrack exercises`)
        id: String,
        /// Stop and cancel once this percentage is reached
        #[arg(long, value_name = "PERCENT")]
        cancel_at: Option<f64>,
        /// Run the timer this many times faster than real time
        #[arg(long, default_value_t = 1.0)]
        speed: f64,
    },
    /// Show completed and cancelled sessions
    History,
    /// Print the effective configuration
    Config,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(context: &commands::Context, command: Commands) -> Result<()> {
    match command {
        Commands::Seed => commands::seed::run(context).await,
        Commands::Exercises => commands::exercises::run(context).await,
        Commands::Train {
            id,
            cancel_at,
            speed,
        } => commands::train::run(context, &id, cancel_at, speed).await,
        Commands::History => commands::history::run(context).await,
        Commands::Config => commands::config::run(context),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let context = commands::Context::open(cli.config, cli.store)?;
    context.run(dispatch(&context, cli.command)).await
}
