pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::sync::SyncArgs;
use crate::core::config::AppConfig;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Sync(SyncArgs),
    List,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("idxsync starting...");

    let config = AppConfig::load_or_default(config_path)?;
    debug!("Loaded config: {config:#?}");

    match command {
        AppCommand::Sync(args) => cli::sync::run(&config, &args).await,
        AppCommand::List => {
            let nifty = config.nifty();
            let catalog = providers::nifty::NiftyIndicesProvider::new(
                &nifty.history_base_url,
                &nifty.live_base_url,
            )?;
            cli::indices::run(&catalog).await
        }
    }
}
