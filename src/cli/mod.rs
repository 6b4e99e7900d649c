pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "skufill")]
#[command(about = "Fill missing product descriptions and images by SKU", long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/skufill/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one update batch now
    Run,
    /// List products the next batch will consider
    Candidates,
    /// Add a product to the catalog
    Add {
        /// SKU (barcode) of the product
        sku: String,

        /// Product title
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List all products
    List,
    /// Schedule the recurring update
    Install,
    /// Cancel the pending scheduled update
    Uninstall,
    /// Background daemon that fires scheduled updates
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in the foreground
    Start {
        /// Log file path (default: stdout)
        #[arg(short, long)]
        log: Option<PathBuf>,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
