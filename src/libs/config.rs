//! Persisted configuration for the aperture application.
//!
//! Holds the defaults applied when a CLI flag is omitted (album, target
//! directory, requested sizes, worker count, unicode-filename policy) plus
//! the stable per-installation client id sent with every provider request.
//! Stored as JSON in the platform-specific application data directory
//! managed by [`DataStorage`].

use super::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_print};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, MultiSelect};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use uuid::Uuid;

pub const CONFIG_FILE_NAME: &str = "config.json";

const AVAILABLE_SIZES: &[&str] = &["original", "medium", "thumb", "adjusted", "alternative"];

/// Root configuration object, persisted as `config.json`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Album name used when `--album` is not passed on the command line.
    pub default_album: String,
    /// Local directory used when `--directory` is not passed.
    pub default_directory: String,
    /// Sizes requested when `--size` is not passed.
    pub default_sizes: Vec<String>,
    /// Worker thread count used when `--threads-num` is not passed.
    pub default_threads_num: u32,
    /// Whether filenames keep non-ASCII characters by default.
    pub keep_unicode_in_filenames: bool,
    /// Stable per-installation id, generated once and persisted.
    ///
    /// Overridable per-invocation via the `CLIENT_ID` environment variable;
    /// the stored value is only used as the fallback.
    pub client_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_album: "All Photos".to_string(),
            default_directory: ".".to_string(),
            default_sizes: vec!["original".to_string()],
            default_threads_num: 4,
            keep_unicode_in_filenames: false,
            client_id: Uuid::new_v4().to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from disk, falling back to [`Config::default`]
    /// (and persisting it) if no file exists yet.
    pub fn read() -> Result<Config> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        if !config_file_path.exists() {
            let config = Config::default();
            msg_debug!(Message::ClientIdGenerated(config.client_id.clone()));
            config.save()?;
            return Ok(config);
        }

        let config_str = fs::read_to_string(config_file_path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        msg_debug!(Message::ConfigLoaded);
        Ok(config)
    }

    /// Writes the configuration to disk as pretty-printed JSON.
    pub fn save(&self) -> Result<()> {
        let config_file_path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;

        let config_file = File::create(config_file_path)?;
        serde_json::to_writer_pretty(&config_file, &self)?;
        Ok(())
    }

    /// Resolves the effective client id: the `CLIENT_ID` environment
    /// variable if set, otherwise the persisted value.
    pub fn resolve_client_id(&self) -> String {
        env::var("CLIENT_ID").unwrap_or_else(|_| self.client_id.clone())
    }

    /// Runs an interactive setup wizard and returns the resulting config,
    /// without saving it (the caller decides whether/when to persist).
    pub fn init() -> Result<Config> {
        let existing = Config::read().unwrap_or_default();

        msg_print!(Message::ConfigInitHeader, true);

        let default_album: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptDefaultAlbum.to_string())
            .default(existing.default_album.clone())
            .interact_text()?;

        let default_directory: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptDefaultDirectory.to_string())
            .default(existing.default_directory.clone())
            .interact_text()?;

        let preselected: Vec<bool> = AVAILABLE_SIZES.iter().map(|s| existing.default_sizes.iter().any(|d| d == s)).collect();
        let selected = MultiSelect::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptDefaultSizes.to_string())
            .items(AVAILABLE_SIZES)
            .defaults(&preselected)
            .interact()?;
        let default_sizes = if selected.is_empty() {
            vec!["original".to_string()]
        } else {
            selected.into_iter().map(|i| AVAILABLE_SIZES[i].to_string()).collect()
        };

        let default_threads_num: u32 = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptThreadsNum.to_string())
            .default(existing.default_threads_num)
            .interact_text()?;

        let keep_unicode_in_filenames: bool = Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptKeepUnicode.to_string())
            .default(existing.keep_unicode_in_filenames)
            .interact_text()?;

        Ok(Config {
            default_album,
            default_directory,
            default_sizes,
            default_threads_num,
            keep_unicode_in_filenames,
            client_id: existing.client_id,
        })
    }
}
