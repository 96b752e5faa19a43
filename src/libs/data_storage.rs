//! Cross-platform data storage path management for application files.
//!
//! Resolves a single base directory for aperture's persisted files (config,
//! cookie jar, cached password) following each platform's convention:
//!
//! - **Windows**: `%LOCALAPPDATA%\lacodda\aperture\`
//! - **macOS**: `~/Library/Application Support/lacodda/aperture/`
//! - **Linux/Unix**: `~/.local/share/lacodda/aperture/`

use anyhow::Result;
use serde::Deserialize;
use std::env::consts::OS;
use std::env::var;
use std::path::{Path, PathBuf};
use std::{fs, str};

// Include compile-time application metadata
include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

/// Cross-platform data storage path manager.
#[derive(Deserialize, Clone)]
pub struct DataStorage {
    /// Base directory path for all application data.
    base_path: PathBuf,
}

impl DataStorage {
    /// Creates a new `DataStorage` instance with a platform-appropriate base path.
    pub fn new() -> Self {
        let base_path = match OS {
            "windows" => var("LOCALAPPDATA").unwrap_or_else(|_| ".".into()),
            "macos" => var("HOME").unwrap_or_else(|_| ".".into()) + "/Library/Application Support",
            _ => var("HOME").unwrap_or_else(|_| ".".into()) + "/.local/share",
        };

        let base_path = Path::new(&base_path).join(APP_METADATA_OWNER).join(APP_METADATA_NAME);

        Self { base_path }
    }

    /// Resolves a filename to a complete path within the application data directory,
    /// creating the directory tree if it does not yet exist.
    pub fn get_path(&self, file_name: &str) -> Result<PathBuf> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path)?;
        }

        Ok(self.base_path.join(file_name))
    }
}
