//! The main mirror command: authenticate, enumerate an album, and download
//! assets into a date-organized local directory tree.
//!
//! This is the CLI's composition root for the sync engine (§4 of the
//! design): it resolves configuration layers (CLI flags, the persisted
//! [`Config`], environment variables), builds the production collaborators
//! (HTTP transport, auth controller, asset service, downloader, EXIF
//! writer, clock), and hands them to [`RunOrchestrator`].

use crate::core::assets::{AssetService, RemoteAssetService};
use crate::core::auth::{AppleAuthController, AuthController, Credentials, DEFAULT_WAIT_SECONDS};
use crate::core::cookie_jar::CookieJar;
use crate::core::download::{DownloadOptions, Downloader, HttpDownloader};
use crate::core::exif::{ExifWriter, NoopExifWriter};
use crate::core::filename::{FilenamePolicyOptions, SizeTag};
use crate::core::keyring::{FileKeyringStore, KeyringStore};
use crate::core::orchestrator::{RunOptions, RunOrchestrator};
use crate::libs::clock::{Clock, SystemClock};
use crate::libs::config::Config;
use crate::libs::data_storage::DataStorage;
use crate::libs::messages::Message;
use crate::libs::secret::Secret;
use crate::msg_info;
use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Input};
use reqwest::Url;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Production API host. Captured VCR cassettes and the wire formats in
/// §6 are tied to this endpoint; it is not user-configurable.
const DEFAULT_BASE_URL: &str = "https://setup.icloud.com";

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Apple ID (email) used to authenticate.
    #[arg(long, short = 'u')]
    username: Option<String>,

    /// Apple ID password. Omit to use a cached or interactively-prompted password.
    #[arg(long)]
    password: Option<String>,

    /// Local directory the library is mirrored into.
    #[arg(long, short = 'd')]
    directory: Option<PathBuf>,

    /// Directory holding the persistent session cookie jar.
    #[arg(long)]
    cookie_directory: Option<PathBuf>,

    /// Size to download: original, medium, thumb, adjusted, or alternative. Repeatable.
    #[arg(long = "size", value_parser = parse_still_size)]
    sizes: Vec<SizeTag>,

    /// Still size whose video counterpart is preferred for a live photo's
    /// companion clip: original or medium.
    #[arg(long, value_parser = parse_still_size)]
    live_photo_size: Option<SizeTag>,

    /// Only download the N most recent assets.
    #[arg(long)]
    recent: Option<u64>,

    /// Stop after this many consecutive assets are already downloaded.
    #[arg(long)]
    until_found: Option<u64>,

    /// Album to sync (default: the configured default album).
    #[arg(long)]
    album: Option<String>,

    /// Don't download videos.
    #[arg(long)]
    skip_videos: bool,

    /// Don't download the video half of a live photo.
    #[arg(long)]
    skip_live_photos: bool,

    /// Only consider photo assets; skip videos entirely (stricter than `--skip-videos`).
    #[arg(long)]
    only_photos: bool,

    /// Fail an asset rather than falling back to `original` when the requested size is absent.
    #[arg(long)]
    force_size: bool,

    /// Delete the asset from the provider after a successful local download (legacy name).
    #[arg(long)]
    auto_delete: bool,

    /// Delete the asset from the provider after a successful local download.
    #[arg(long)]
    delete_after_download: bool,

    /// Log mutating actions (download write, EXIF write, provider delete) without performing them.
    #[arg(long)]
    dry_run: bool,

    /// Stamp the asset's capture date into the downloaded JPEG's EXIF data.
    #[arg(long)]
    set_exif_datetime: bool,

    /// Accepted for compatibility; this crate has no progress-bar renderer.
    #[arg(long)]
    no_progress_bar: bool,

    /// Number of concurrent download workers (clamped to [1, 16]).
    #[arg(long)]
    threads_num: Option<usize>,

    /// Re-run the sync every S seconds instead of exiting after one pass.
    #[arg(long)]
    watch_with_interval: Option<u64>,

    /// Preserve non-ASCII characters in filenames instead of transliterating them.
    #[arg(long)]
    keep_unicode_in_filenames: Option<bool>,

    /// Cache the password in the local keyring store, keyed by username.
    #[arg(long)]
    store_in_keyring: bool,

    #[command(flatten)]
    #[allow(dead_code)]
    smtp: SmtpArgs,
}

/// Notification plumbing named in §6's CLI surface but out of this crate's
/// core scope (§1): accepted so the CLI signature matches the original
/// tool's, never read by the sync engine.
#[derive(Debug, Args, Default)]
struct SmtpArgs {
    #[arg(long)]
    smtp_username: Option<String>,
    #[arg(long)]
    smtp_password: Option<String>,
    #[arg(long)]
    smtp_host: Option<String>,
    #[arg(long)]
    smtp_port: Option<u16>,
    #[arg(long)]
    notification_email: Option<String>,
}

fn parse_still_size(s: &str) -> Result<SizeTag, String> {
    match SizeTag::parse(s) {
        Some(tag) if !tag.is_video() => Ok(tag),
        _ => Err(format!("invalid size '{s}': expected original, medium, thumb, adjusted, or alternative")),
    }
}

/// Resolves the account password: an explicit `--password`, then the
/// keyring store (if `--store-in-keyring` is set and an entry exists),
/// then the plain local password cache, prompting (and caching) only as a
/// last resort.
fn resolve_password(explicit: Option<&str>, username: &str, store_in_keyring: bool, keyring: &dyn KeyringStore) -> Result<String> {
    if let Some(password) = explicit {
        if store_in_keyring {
            keyring.set(username, password)?;
        }
        return Ok(password.to_string());
    }

    if store_in_keyring {
        if let Some(password) = keyring.get(username)? {
            return Ok(password);
        }
    }

    let password = Secret::new("password", &Message::PromptPassword.to_string()).get_or_prompt()?;
    if store_in_keyring {
        keyring.set(username, &password)?;
    }
    Ok(password)
}

fn spawn_interrupt_handler(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            msg_info!(Message::InterruptReceived);
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

pub async fn cmd(args: SyncArgs) -> Result<()> {
    // No progress-bar renderer in this crate; accepted for CLI compatibility only.
    let _ = args.no_progress_bar;

    let config = Config::read()?;

    let directory = args.directory.unwrap_or_else(|| PathBuf::from(&config.default_directory));
    let album = args.album.unwrap_or_else(|| config.default_album.clone());
    let threads_num = args.threads_num.unwrap_or(config.default_threads_num as usize).clamp(1, 16);
    let keep_unicode_in_filenames = args.keep_unicode_in_filenames.unwrap_or(config.keep_unicode_in_filenames);
    let live_photo_size = args.live_photo_size.unwrap_or(SizeTag::Original);

    let sizes: Vec<SizeTag> = if args.sizes.is_empty() {
        config.default_sizes.iter().filter_map(|s| SizeTag::parse(s)).collect()
    } else {
        args.sizes
    };
    let sizes = if sizes.is_empty() { vec![SizeTag::Original] } else { sizes };

    let username = match args.username {
        Some(username) => username,
        None => Input::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptUsername.to_string())
            .interact_text()?,
    };

    let keyring = FileKeyringStore;
    let password = resolve_password(args.password.as_deref(), &username, args.store_in_keyring, &keyring)?;
    let client_id = config.resolve_client_id();
    let credentials = Credentials { username: username.clone(), password, client_id };

    let cookie_directory = args
        .cookie_directory
        .or_else(|| DataStorage::new().get_path("cookies").ok())
        .unwrap_or_else(|| PathBuf::from("cookies"));

    let base_url = Url::parse(DEFAULT_BASE_URL).context("invalid base url")?;
    let cookie_jar = Arc::new(CookieJar::load(&cookie_directory, &username, base_url)?);

    let transport = Arc::new(crate::core::transport::HttpTransport::new(cookie_jar.clone())?);
    let interactive = std::io::stdin().is_terminal();
    let auth: Arc<dyn AuthController> = Arc::new(AppleAuthController::new(
        transport.clone(),
        cookie_jar.clone(),
        DEFAULT_BASE_URL.to_string(),
        interactive,
    ));
    let asset_service: Arc<dyn AssetService> = Arc::new(RemoteAssetService::new(transport.clone(), DEFAULT_BASE_URL.to_string()));
    let downloader: Arc<dyn Downloader> = Arc::new(HttpDownloader::new(reqwest::Client::new()));
    let exif: Arc<dyn ExifWriter> = Arc::new(NoopExifWriter);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(cancel.clone());

    let orchestrator = RunOrchestrator {
        auth,
        asset_service,
        downloader,
        exif,
        clock,
        credentials,
        cancel,
    };

    let delete_after_download = args.auto_delete || args.delete_after_download;

    let run_options = RunOptions {
        album,
        directory,
        sizes,
        recent: args.recent,
        until_found: args.until_found,
        skip_videos: args.skip_videos,
        skip_live_photos: args.skip_live_photos,
        only_photos: args.only_photos,
        live_photo_size,
        threads_num,
        watch_interval: args.watch_with_interval,
        wait_seconds: DEFAULT_WAIT_SECONDS,
        download: DownloadOptions {
            force_size: args.force_size,
            set_exif_datetime: args.set_exif_datetime,
            delete_after_download,
            dry_run: args.dry_run,
            skip_live_photos: args.skip_live_photos,
            wait_seconds: DEFAULT_WAIT_SECONDS,
            filename_policy: FilenamePolicyOptions { keep_unicode_in_filenames },
        },
    };

    orchestrator.run(run_options).await?;

    Ok(())
}
