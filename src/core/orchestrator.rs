//! Run Orchestrator (C5): combines auth, asset listing, and the download
//! engine into one run — album resolution, the producer/worker-pool
//! pipeline, the until-found stop heuristic, and the optional
//! watch-interval loop.

use crate::core::assets::{Asset, AssetService, ItemType};
use crate::core::auth::{reauthenticate_with_retry, AuthController, Credentials};
use crate::core::download::{download_with_retry, DownloadOptions, DownloadOutcome, Downloader, MissingUrlLog, WorkItem};
use crate::core::error::{ErrorClass, RunError, SessionError};
use crate::core::exif::ExifWriter;
use crate::core::filename::SizeTag;
use crate::libs::clock::Clock;
use crate::libs::messages::Message;
use crate::{msg_debug, msg_error, msg_info};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub album: String,
    pub directory: PathBuf,
    pub sizes: Vec<SizeTag>,
    pub recent: Option<u64>,
    pub until_found: Option<u64>,
    pub skip_videos: bool,
    pub skip_live_photos: bool,
    pub only_photos: bool,
    /// Still size whose video-tag counterpart is preferred when pairing a
    /// live photo's companion video (`--live-photo-size`).
    pub live_photo_size: SizeTag,
    pub threads_num: usize,
    pub watch_interval: Option<u64>,
    pub wait_seconds: u64,
    pub download: DownloadOptions,
}

struct Job {
    item: WorkItem,
    reply: oneshot::Sender<DownloadOutcome>,
}

pub struct RunOrchestrator {
    pub auth: Arc<dyn AuthController>,
    pub asset_service: Arc<dyn AssetService>,
    pub downloader: Arc<dyn Downloader>,
    pub exif: Arc<dyn ExifWriter>,
    pub clock: Arc<dyn Clock>,
    pub credentials: Credentials,
    /// Set by the caller's signal handler (SIGINT/Ctrl-C). Checked by the
    /// producer between enqueues and by workers between job dequeues — not
    /// mid-byte-stream, so an in-flight file is left with partial bytes and
    /// overwritten on the next run per §5's size-mismatch rule.
    pub cancel: Arc<AtomicBool>,
}

impl RunOrchestrator {
    /// Runs the sync pipeline once. With `watch_interval` set, loops
    /// forever, sleeping between runs and reusing the existing session.
    pub async fn run(&self, options: RunOptions) -> Result<(), RunError> {
        loop {
            self.run_once(&options).await?;

            if self.cancel.load(Ordering::SeqCst) {
                return Ok(());
            }

            match options.watch_interval {
                Some(seconds) => {
                    msg_info!(Message::WatchSleeping(seconds));
                    self.clock.sleep(Duration::from_secs(seconds)).await;
                }
                None => return Ok(()),
            }
        }
    }

    async fn run_once(&self, options: &RunOptions) -> Result<(), RunError> {
        let session = self.auth.authenticate(&self.credentials, false).await?;

        // Only the "download everything" form needs the album's total count;
        // `--recent`/`--until-found` already know (or deliberately don't
        // know) how many assets they'll touch.
        let total_count = if options.recent.is_none() && options.until_found.is_none() {
            self.resolve_album_total(&options.album).await
        } else {
            None
        };

        let summary = build_summary_message(options, total_count);
        msg_info!(Message::DownloadingSummary(summary));
        msg_info!(Message::StartingSync);

        let missing_url_log = Arc::new(MissingUrlLog::new());
        let consecutive = Arc::new(AtomicU64::new(0));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let (job_tx, job_rx) = mpsc::channel::<Job>(options.threads_num.max(1) * 2);
        let job_rx = Arc::new(tokio::sync::Mutex::new(job_rx));

        let mut worker_handles = Vec::new();
        for _ in 0..options.threads_num.max(1) {
            let job_rx = job_rx.clone();
            let downloader = self.downloader.clone();
            let asset_service = self.asset_service.clone();
            let auth = self.auth.clone();
            let credentials = self.credentials.clone();
            let clock = self.clock.clone();
            let exif = self.exif.clone();
            let download_options = options.download.clone();
            let missing_url_log = missing_url_log.clone();
            let session = session.clone();
            let cancel = self.cancel.clone();

            worker_handles.push(tokio::spawn(async move {
                loop {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }

                    let job = {
                        let mut rx = job_rx.lock().await;
                        rx.recv().await
                    };
                    let Some(job) = job else { break };

                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }

                    let outcome = download_with_retry(
                        downloader.as_ref(),
                        asset_service.as_ref(),
                        auth.as_ref(),
                        &credentials,
                        clock.as_ref(),
                        exif.as_ref(),
                        &job.item,
                        &download_options,
                        missing_url_log.as_ref(),
                        &session,
                    )
                    .await;
                    let _ = job.reply.send(outcome);
                }
            }));
        }

        let producer_result = self
            .produce(options, job_tx, consecutive.clone(), stop_flag.clone())
            .await;

        for handle in worker_handles {
            let _ = handle.await;
        }

        producer_result?;

        if stop_flag.load(Ordering::SeqCst) {
            msg_info!(Message::FoundConsecutivePreviouslyDownloaded(consecutive.load(Ordering::SeqCst)));
        } else {
            msg_info!(Message::AllAssetsDownloaded);
        }

        Ok(())
    }

    async fn produce(
        &self,
        options: &RunOptions,
        job_tx: mpsc::Sender<Job>,
        consecutive: Arc<AtomicU64>,
        stop_flag: Arc<AtomicBool>,
    ) -> Result<(), RunError> {
        let asset_semaphore = Arc::new(Semaphore::new(options.threads_num.max(1) * 2));
        let mut asset_tasks = Vec::new();

        let mut offset = 0usize;
        let mut seen = 0u64;

        'paging: loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }

            let page = match self.fetch_page_with_retry(&options.album, offset, options.wait_seconds).await {
                Ok(page) => page,
                Err(e) => {
                    for task in asset_tasks {
                        let _: Result<(), _> = task.await.unwrap_or(Ok(()));
                    }
                    return Err(e);
                }
            };

            if page.assets.is_empty() {
                break;
            }

            for asset in page.assets {
                if let Some(recent) = options.recent {
                    if seen >= recent {
                        break 'paging;
                    }
                }
                seen += 1;

                if stop_flag.load(Ordering::SeqCst) || self.cancel.load(Ordering::SeqCst) {
                    break 'paging;
                }

                let Some(work_items) = filter_and_build_items(&asset, options) else {
                    continue;
                };
                if work_items.is_empty() {
                    continue;
                }

                let permit = asset_semaphore.clone().acquire_owned().await.ok();
                let job_tx = job_tx.clone();
                let consecutive = consecutive.clone();
                let stop_flag = stop_flag.clone();
                let until_found = options.until_found;

                asset_tasks.push(tokio::spawn(async move {
                    let _permit = permit;
                    let mut outcomes = Vec::with_capacity(work_items.len());

                    for item in work_items {
                        let (reply_tx, reply_rx) = oneshot::channel();
                        if job_tx.send(Job { item, reply: reply_tx }).await.is_err() {
                            break;
                        }
                        if let Ok(outcome) = reply_rx.await {
                            outcomes.push(outcome);
                        }
                    }

                    let all_skip_or_dedup = !outcomes.is_empty()
                        && outcomes.iter().all(|o| matches!(o, DownloadOutcome::Skipped | DownloadOutcome::Deduped));

                    if all_skip_or_dedup {
                        let count = consecutive.fetch_add(1, Ordering::SeqCst) + 1;
                        if let Some(k) = until_found {
                            if count >= k {
                                stop_flag.store(true, Ordering::SeqCst);
                            }
                        }
                    } else {
                        consecutive.store(0, Ordering::SeqCst);
                    }

                    Ok::<(), RunError>(())
                }));
            }

            match page.next_offset {
                Some(next) if !stop_flag.load(Ordering::SeqCst) && !self.cancel.load(Ordering::SeqCst) => offset = next,
                _ => break,
            }
        }

        drop(job_tx);

        for task in asset_tasks {
            let _ = task.await;
        }

        Ok(())
    }

    /// Looks up the requested album's reported asset count, used only to
    /// phrase the starting summary line. A lookup failure or a provider
    /// that doesn't report a count is not fatal to the run: the summary
    /// just falls back to its generic wording.
    async fn resolve_album_total(&self, album: &str) -> Option<u64> {
        match self.asset_service.list_albums().await {
            Ok(albums) => albums.into_iter().find(|a| a.name == album).and_then(|a| a.asset_count),
            Err(_) => None,
        }
    }

    /// Fetches one listing page, retrying per the orchestrator's own
    /// policy: `SessionInvalid` triggers the shared re-auth subroutine;
    /// `InternalServerError`/transport failures retry the same offset up
    /// to [`crate::core::auth::MAX_RETRIES`] with sleep. Exhaustion is
    /// fatal for the run.
    async fn fetch_page_with_retry(&self, album: &str, offset: usize, wait_seconds: u64) -> Result<crate::core::assets::AssetPage, RunError> {
        let mut attempts = 0u32;
        loop {
            match self.asset_service.photos_request(album, offset).await {
                Ok(page) => return Ok(page),
                Err(SessionError::Api(api)) if api.classify() == ErrorClass::SessionInvalid => {
                    match reauthenticate_with_retry(self.auth.as_ref(), &self.credentials, self.clock.as_ref(), wait_seconds).await {
                        Ok(_) => continue,
                        Err(_) => {
                            msg_error!(Message::ReauthenticationFailedDuringListing);
                            return Err(RunError::ReauthExhausted);
                        }
                    }
                }
                Err(e) => {
                    let is_internal = matches!(&e, SessionError::Api(api) if api.classify() == ErrorClass::InternalServerError) || matches!(&e, SessionError::Transport(_));
                    if !is_internal {
                        return Err(RunError::Other(anyhow::anyhow!(e.to_string())));
                    }

                    msg_info!(Message::InternalErrorRetrying);
                    attempts += 1;
                    if attempts >= crate::core::auth::MAX_RETRIES {
                        msg_error!(Message::InternalErrorFatal);
                        return Err(RunError::InternalErrorExhausted);
                    }
                    self.clock.sleep(Duration::from_secs(wait_seconds)).await;
                }
            }
        }
    }
}

/// Applies `--skip-videos` / `--skip-live-photos` / `--only-photos`
/// filtering and builds the work item(s) for an asset: the primary size
/// request, plus a paired video item when the asset is a live photo and
/// pairing is not suppressed. Returns `None` when the whole asset is
/// filtered out (an unknown item type, or a video under `--only-photos`).
fn filter_and_build_items(asset: &Asset, options: &RunOptions) -> Option<Vec<WorkItem>> {
    match &asset.item_type {
        ItemType::Photo => {}
        ItemType::Video => {
            if options.only_photos {
                msg_debug!(Message::SkippingOnlyPhotos(asset.filename.clone()));
                return None;
            }
            if options.skip_videos {
                return None;
            }
        }
        ItemType::Unknown(kind) => {
            msg_debug!(Message::SkippingUnknownItemType(asset.filename.clone(), kind.clone()));
            return None;
        }
    }

    let mut items = Vec::new();
    for &size in &options.sizes {
        items.push(WorkItem {
            asset: asset.clone(),
            size,
            root_dir: options.directory.clone(),
        });
    }

    if !options.skip_live_photos && !options.only_photos {
        if let Some(video_size) = asset.video_companion(options.live_photo_size) {
            items.push(WorkItem {
                asset: asset.clone(),
                size: video_size,
                root_dir: options.directory.clone(),
            });
        }
    }

    Some(items)
}

/// Builds the "Downloading N original photos and videos to ..." line.
/// `total_count` is the album's reported asset count, resolved by the
/// caller only for the "download everything" case (no `--recent`, no
/// `--until-found`); it is ignored otherwise. A resolved count of exactly
/// one, or an explicit `--recent 1`, renders as "the first photo" (or
/// "the first photo or video") rather than "1 photos".
fn build_summary_message(options: &RunOptions, total_count: Option<u64>) -> String {
    let until_found_only = options.recent.is_none() && options.until_found.is_some();

    let effective_count = match (options.recent, options.until_found) {
        (Some(n), _) => Some(n),
        (None, Some(_)) => None,
        (None, None) => total_count,
    };

    let singular = effective_count == Some(1);

    let count_desc = match effective_count {
        Some(1) => "the first".to_string(),
        Some(n) => n.to_string(),
        None if until_found_only => "???".to_string(),
        None => "the first".to_string(),
    };

    let photos_only = options.only_photos || (options.skip_videos && options.skip_live_photos);
    let kind_desc = if photos_only {
        if singular { "photo" } else { "photos" }
    } else if singular {
        "photo or video"
    } else {
        "photos and videos"
    };

    let size_desc = options.sizes.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(",");

    format!(
        "Downloading {} {} {} to {} ...",
        count_desc,
        size_desc,
        kind_desc,
        options.directory.display()
    )
}
