//! Main entry point for the aperture application.
//!
//! Handles initialization of the tracing system and delegates to the CLI
//! handler for command execution.

use anyhow::Result;
use aperture::commands::Cli;
use std::env;

/// Main function that initializes the application.
///
/// Sets up logging and delegates to CLI handler for command execution.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing only if debug mode is enabled
    // This prevents log output from cluttering normal CLI usage
    if env::var("APERTURE_DEBUG").is_ok() || env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "aperture=debug".into()))
            .init();
    }

    Cli::menu().await
}
