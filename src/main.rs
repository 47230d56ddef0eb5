use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use folo_sync::app::AppContext;
use folo_sync::cli::{commands, Cli, Commands};
use folo_sync::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Migrate { batch } => {
            let db_path = AppContext::resolve_db_path(&config, cli.db)?;
            commands::migrate(&db_path, batch)?;
        }
        Commands::Status => {
            let db_path = AppContext::resolve_db_path(&config, cli.db)?;
            commands::status(&db_path)?;
        }
        Commands::Sync { view } => {
            let ctx = AppContext::new(config, cli.db)?;
            commands::sync(&ctx, view).await?;
        }
        Commands::Read { entry_id } => {
            let ctx = AppContext::new(config, cli.db)?;
            commands::read(&ctx, &entry_id).await?;
        }
        Commands::Unread => {
            let ctx = AppContext::new(config, cli.db)?;
            commands::unread(&ctx)?;
        }
        Commands::Watch { interval } => {
            let ctx = AppContext::new(config, cli.db)?;
            commands::watch(&ctx, interval).await?;
        }
    }

    Ok(())
}
