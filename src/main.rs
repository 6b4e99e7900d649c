use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use skufill::app::AppContext;
use skufill::cli::{commands, Cli, Commands, DaemonAction};
use skufill::config::Config;
use skufill::daemon::{daemon_status, stop_daemon, Daemon, DaemonConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Stop and status only need the PID file
    if let Commands::Daemon { action } = &cli.command {
        match action {
            DaemonAction::Stop => {
                stop_daemon()?;
                println!("Daemon stopped");
                return Ok(());
            }
            DaemonAction::Status => {
                println!("{}", daemon_status());
                return Ok(());
            }
            DaemonAction::Start { .. } => {}
        }
    }

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Run => {
            commands::run_now(&ctx).await?;
        }
        Commands::Candidates => {
            commands::list_candidates(&ctx)?;
        }
        Commands::Add { sku, title } => {
            commands::add_product(&ctx, &sku, title.as_deref())?;
        }
        Commands::List => {
            commands::list_products(&ctx)?;
        }
        Commands::Install => {
            commands::install(&ctx)?;
        }
        Commands::Uninstall => {
            commands::uninstall(&ctx)?;
        }
        Commands::Daemon { action } => {
            if let DaemonAction::Start { log } = action {
                let config = DaemonConfig {
                    install_on_start: true,
                    log_file: log,
                };
                Daemon::new(Arc::new(ctx), config).run().await?;
            }
        }
    }

    Ok(())
}
