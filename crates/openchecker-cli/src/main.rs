//! OpenChecker CLI tool.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "openchecker")]
#[command(about = "OpenChecker compliance scan agent", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./openchecker.kdl when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume scan jobs from the broker until interrupted
    Agent,
    /// Run a single job from a JSON file without a broker
    Scan {
        /// Path to the job message
        job: PathBuf,
    },
    /// Validate an agent configuration
    Validate {
        /// Path to the configuration file
        path: Option<PathBuf>,
    },
    /// List the registered checker commands
    Checkers,
    /// Show message and consumer counts of the job queue
    Status,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Agent => {
            commands::agent::run(config).await?;
        }
        Commands::Scan { job } => {
            commands::scan::run(config, &job).await?;
        }
        Commands::Validate { path } => {
            commands::validate(path.as_deref().or(config))?;
        }
        Commands::Checkers => {
            commands::checkers(config)?;
        }
        Commands::Status => {
            commands::status(config).await?;
        }
    }

    Ok(())
}
