use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use idxsync::cli::sync::SyncArgs;
use idxsync::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SyncOpts {
    /// Fetch a single date (YYYY-MM-DD or DD-Mon-YYYY)
    #[arg(long, conflicts_with_all = ["start", "end"])]
    date: Option<String>,

    /// Start of the date range; defaults to the configured start date
    #[arg(long)]
    start: Option<String>,

    /// End of the date range; defaults to today and cannot be in the future
    #[arg(long, requires = "start")]
    end: Option<String>,

    /// Comma separated index names, e.g. "NIFTY 50,NIFTY BANK"
    #[arg(long)]
    indices: Option<String>,

    /// Sync every live equity index instead of the configured list
    #[arg(long, conflicts_with = "indices")]
    all: bool,
}

impl From<SyncOpts> for SyncArgs {
    fn from(opts: SyncOpts) -> SyncArgs {
        SyncArgs {
            date: opts.date,
            start: opts.start,
            end: opts.end,
            indices: opts.indices,
            all: opts.all,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch new index history and upsert it into the store
    Sync(SyncOpts),
    /// List live equity indices
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config_path = cli.config_path.as_deref();
    let result = match cli.command {
        Some(Commands::Setup) => idxsync::cli::setup::setup(),
        Some(Commands::Sync(opts)) => {
            idxsync::run_command(idxsync::AppCommand::Sync(opts.into()), config_path).await
        }
        Some(Commands::List) => idxsync::run_command(idxsync::AppCommand::List, config_path).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
