//! Download Engine (C4): per-asset fetch+persist, dedup/skip policy,
//! mtime restoration, the EXIF hook, live-photo pairing, and the
//! per-asset retry state machine.

use crate::core::assets::{Asset, AssetService};
use crate::core::auth::{reauthenticate_with_retry, AuthController, Credentials, SharedSession};
use crate::core::error::{ErrorClass, SessionError};
use crate::core::exif::ExifWriter;
use crate::core::filename::{dedup_filename, extension_for_size, policy_filename, FilenamePolicyOptions, SizeTag};
use crate::libs::clock::Clock;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info};
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use filetime::{set_file_times, FileTime};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Maximum download attempts per asset before giving up. Shared in spirit
/// with [`crate::core::auth::MAX_RETRIES`] but tracked independently —
/// this counts transport/internal-error retries, not re-auth attempts.
pub const MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone)]
pub struct WorkItem {
    pub asset: Asset,
    pub size: SizeTag,
    /// Root of the local mirror; the final path is derived from this plus
    /// the asset's created date and the filename policy.
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded,
    Skipped,
    Deduped,
    MissingUrl,
    Failed,
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub force_size: bool,
    pub set_exif_datetime: bool,
    pub delete_after_download: bool,
    pub dry_run: bool,
    pub skip_live_photos: bool,
    pub wait_seconds: u64,
    pub filename_policy: FilenamePolicyOptions,
}

/// Collaborator interface for streaming media bytes to a local file.
/// Kept separate from [`crate::core::transport::Transport`] because tests
/// fake byte-level fetch independently of JSON request/response traffic.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch_to_file(&self, url: &str, target: &Path) -> Result<(), SessionError>;
}

/// Production downloader: streams the response body in 64 KiB chunks.
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn fetch_to_file(&self, url: &str, target: &Path) -> Result<(), SessionError> {
        use futures_util::StreamExt;
        use tokio::io::AsyncWriteExt;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(crate::core::error::TransportError)?;

        let mut file = tokio::fs::File::create(target).await.map_err(|e| {
            SessionError::Api(crate::core::error::ApiError {
                reason: format!("io error: {e}"),
                code: None,
            })
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(crate::core::error::TransportError)?;
            file.write_all(&chunk).await.map_err(|e| {
                SessionError::Api(crate::core::error::ApiError {
                    reason: format!("io error: {e}"),
                    code: None,
                })
            })?;
        }
        file.flush().await.ok();
        Ok(())
    }
}

/// Tracks (filename, size) pairs already logged as "missing URL", so P8's
/// dedup-per-run rule holds even across multiple workers.
#[derive(Default)]
pub struct MissingUrlLog(Mutex<HashSet<(String, String)>>);

impl MissingUrlLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true the first time this (filename, size) pair is seen.
    fn should_log(&self, filename: &str, size: &str) -> bool {
        self.0.lock().unwrap().insert((filename.to_string(), size.to_string()))
    }
}

/// Resolves the local directory + filename for an asset version. Falls
/// back to the asset-date-derived path when the created-timestamp cannot
/// be converted to local time (e.g. a pre-1970 year).
pub fn resolve_target_path(asset: &Asset, size: SizeTag, root: &Path, policy: &FilenamePolicyOptions) -> (PathBuf, DateTime<Local>) {
    let local_date = match to_local_checked(asset.created_timestamp) {
        Some(local) => local,
        None => {
            msg_error!(Message::CouldNotConvertCreatedDate(asset.created_timestamp.naive_utc().to_string()));
            Utc.from_utc_datetime(&asset.asset_date.naive_utc()).with_timezone(&Local)
        }
    };

    let extension = source_extension(&asset.filename);
    let extension = extension_for_size(&extension, size);
    let filename = policy_filename(&asset.filename, &extension, policy);

    // Year is rendered without zero-padding: the S6 fallback case (an
    // implausible pre-1970 created year) is expected to land under a bare
    // "5/01/01/..." style path rather than "0005/01/01/...".
    use chrono::Datelike;
    let dir = root
        .join(local_date.year().to_string())
        .join(local_date.format("%m").to_string())
        .join(local_date.format("%d").to_string());

    (dir.join(filename), local_date)
}

fn to_local_checked(timestamp: DateTime<Utc>) -> Option<DateTime<Local>> {
    if timestamp.naive_utc().year_is_plausible() {
        Some(timestamp.with_timezone(&Local))
    } else {
        None
    }
}

trait PlausibleYear {
    fn year_is_plausible(&self) -> bool;
}

impl PlausibleYear for chrono::NaiveDateTime {
    /// A year before the Unix epoch is treated as implausible: on the
    /// provider's supported platforms, converting such a timestamp to local
    /// time is exactly where the conversion raises, so this is the
    /// threshold the fallback path needs to trigger on.
    fn year_is_plausible(&self) -> bool {
        use chrono::Datelike;
        self.year() >= 1970
    }
}

fn source_extension(filename: &str) -> String {
    filename.rsplit_once('.').map(|(_, ext)| ext.to_string()).unwrap_or_else(|| "JPG".to_string())
}

/// Chooses which version of `asset` to use for the requested `size`,
/// applying the fallback-to-original rule.
fn select_version<'a>(
    asset: &'a Asset,
    size: SizeTag,
    force_size: bool,
    missing_url_log: &MissingUrlLog,
) -> Option<(&'a crate::core::assets::AssetVersion, SizeTag)> {
    if let Some(version) = asset.versions.get(&size) {
        return Some((version, size));
    }

    if force_size {
        if missing_url_log.should_log(&asset.filename, size.as_str()) {
            msg_error!(Message::SizeNotAvailableForceSize(size.as_str().to_string(), asset.filename.clone()));
        }
        return None;
    }

    if let Some(original) = asset.versions.get(&SizeTag::Original) {
        return Some((original, SizeTag::Original));
    }

    if missing_url_log.should_log(&asset.filename, size.as_str()) {
        msg_error!(Message::CouldNotFindUrlForSize(asset.filename.clone(), size.as_str().to_string()));
    }
    None
}

/// A single attempt at downloading one asset version, with no retry logic —
/// the caller ([`download_with_retry`]) owns retries and re-auth.
#[allow(clippy::too_many_arguments)]
async fn download_once(
    downloader: &dyn Downloader,
    asset_service: &dyn AssetService,
    asset: &Asset,
    target_path: &Path,
    version_size_bytes: u64,
    exif: &dyn ExifWriter,
    options: &DownloadOptions,
    created_local: DateTime<Local>,
    url: &str,
) -> Result<DownloadOutcome, SessionError> {
    if let Some(parent) = target_path.parent() {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            msg_error!(Message::CouldNotCreateFolder(parent.display().to_string()));
            let _ = e;
            return Ok(DownloadOutcome::Failed);
        }
    }

    let mut final_path = target_path.to_path_buf();
    if final_path.exists() {
        let on_disk_size = tokio::fs::metadata(&final_path).await.map(|m| m.len()).unwrap_or(0);
        if on_disk_size == version_size_bytes {
            msg_debug!(Message::FileAlreadyExists(final_path.display().to_string()));
            return Ok(DownloadOutcome::Skipped);
        }

        let deduped = dedup_filename(final_path.file_name().and_then(|f| f.to_str()).unwrap_or_default(), version_size_bytes);
        let deduped_path = final_path.with_file_name(deduped);
        if deduped_path.exists() {
            let deduped_size = tokio::fs::metadata(&deduped_path).await.map(|m| m.len()).unwrap_or(0);
            if deduped_size == version_size_bytes {
                msg_debug!(Message::FileDeduplicated(deduped_path.display().to_string()));
                return Ok(DownloadOutcome::Deduped);
            }
        }
        final_path = deduped_path;
    }

    if let Err(e) = downloader.fetch_to_file(url, &final_path).await {
        msg_error!(Message::IoErrorWritingFile(final_path.display().to_string()));
        return Err(e);
    }

    let mtime = FileTime::from_unix_time(created_local.timestamp(), 0);
    let _ = set_file_times(&final_path, FileTime::now(), mtime);

    if options.set_exif_datetime && final_path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("jpg")).unwrap_or(false) {
        match exif.get_photo_exif(&final_path).await {
            Ok(Some(_)) => {}
            _ => {
                msg_debug!(Message::SettingExifTimestamp(final_path.display().to_string(), created_local.to_string()));
                if exif.set_photo_exif(&final_path, created_local).await.is_err() {
                    msg_debug!(Message::ExifError(final_path.display().to_string()));
                }
            }
        }
    }

    if options.delete_after_download {
        if options.dry_run {
            msg_info!(Message::DryRunWouldDelete(asset.filename.clone()));
        } else if let Err(e) = asset_service.delete(asset).await {
            msg_error!(Message::DeleteFailed(asset.filename.clone(), e.to_string()));
        }
    }

    Ok(DownloadOutcome::Downloaded)
}

/// Runs the full per-asset retry state machine described by the download
/// engine design: transport/internal-server errors retry with sleep up to
/// [`MAX_RETRIES`]; a `SessionInvalid` error re-authenticates and retries the
/// download, each cycle counting against the same [`MAX_RETRIES`] budget
/// (sleeping on attempts 2 through 5, same as the other error classes) so a
/// provider that keeps rejecting the session cannot loop forever even when
/// re-authentication itself keeps succeeding.
#[allow(clippy::too_many_arguments)]
pub async fn download_with_retry(
    downloader: &dyn Downloader,
    asset_service: &dyn AssetService,
    auth: &dyn AuthController,
    credentials: &Credentials,
    clock: &dyn Clock,
    exif: &dyn ExifWriter,
    item: &WorkItem,
    options: &DownloadOptions,
    missing_url_log: &MissingUrlLog,
    _session: &SharedSession,
) -> DownloadOutcome {
    let Some((version, resolved_size)) = select_version(&item.asset, item.size, options.force_size, missing_url_log) else {
        return DownloadOutcome::MissingUrl;
    };
    let url = version.url.clone();
    let size_bytes = version.size_bytes;
    let asset = &item.asset;

    let (target_path, created_local) = resolve_target_path(asset, resolved_size, &item.root_dir, &options.filename_policy);

    let mut attempts = 0u32;
    loop {
        let result = download_once(downloader, asset_service, asset, &target_path, size_bytes, exif, options, created_local, &url).await;

        match result {
            Ok(outcome) => return outcome,
            Err(SessionError::Transport(_)) => {
                msg_info!(Message::ErrorDownloadingRetrying(asset.filename.clone(), options.wait_seconds));
                clock.sleep(Duration::from_secs(options.wait_seconds)).await;
                attempts += 1;
                if attempts >= MAX_RETRIES {
                    msg_error!(Message::CouldNotDownload(asset.filename.clone()));
                    return DownloadOutcome::Failed;
                }
            }
            Err(SessionError::Api(api)) => match api.classify() {
                ErrorClass::SessionInvalid => {
                    attempts += 1;
                    if attempts >= MAX_RETRIES {
                        msg_error!(Message::CouldNotDownload(asset.filename.clone()));
                        return DownloadOutcome::Failed;
                    }
                    if attempts > 1 {
                        clock.sleep(Duration::from_secs(options.wait_seconds)).await;
                    }
                    msg_info!(Message::SessionErrorReauthenticating);
                    match reauthenticate_with_retry(auth, credentials, clock, options.wait_seconds).await {
                        Ok(_) => continue,
                        Err(_) => {
                            msg_error!(Message::CouldNotDownload(asset.filename.clone()));
                            return DownloadOutcome::Failed;
                        }
                    }
                }
                ErrorClass::InternalServerError | ErrorClass::Other => {
                    msg_info!(Message::ErrorDownloadingRetrying(asset.filename.clone(), options.wait_seconds));
                    clock.sleep(Duration::from_secs(options.wait_seconds)).await;
                    attempts += 1;
                    if attempts >= MAX_RETRIES {
                        msg_error!(Message::CouldNotDownload(item.asset.filename.clone()));
                        return DownloadOutcome::Failed;
                    }
                }
            },
        }
    }
}
