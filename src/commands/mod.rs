//! Command-line interface for the aperture application.
//!
//! The default invocation (no subcommand) runs the sync engine against
//! whatever flags and persisted [`crate::libs::config::Config`] resolve to
//! — matching the original tool's flat, subcommand-less CLI. `init` is the
//! one additional subcommand, an interactive wizard for the persisted
//! defaults.
//!
//! ## Usage
//!
//! ```bash
//! aperture --username me@example.com --directory ./Photos --recent 50
//! aperture init
//! ```

pub mod init;
pub mod sync;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactively set up persisted defaults (album, directory, sizes, …)
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
}

/// The main CLI structure. With no subcommand, its flattened arguments
/// drive a sync run directly; `init` is the only named subcommand.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    sync: sync::SyncArgs,
}

impl Cli {
    /// Parses command-line arguments and executes the corresponding command.
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();

        match cli.command {
            Some(Commands::Init(args)) => init::cmd(args),
            None => sync::cmd(cli.sync).await,
        }
    }
}
