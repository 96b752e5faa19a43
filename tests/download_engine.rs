//! Download Engine (C4) integration tests: dedup/skip decisions (P1, P2),
//! the EXIF suppression rule (P6), missing-URL handling (P8), the dry-run
//! delete hook (S4), and the per-asset retry state machine's auth-exhaustion
//! path (P4).

use aperture::core::assets::{Asset, AssetService, AssetVersion, Album, AssetPage, ItemType};
use aperture::core::auth::{AuthController, Credentials, Session, SharedSession};
use aperture::core::download::{download_with_retry, resolve_target_path, DownloadOptions, DownloadOutcome, Downloader, MissingUrlLog, WorkItem};
use aperture::core::error::{ApiError, RunError, SessionError};
use aperture::core::exif::ExifWriter;
use aperture::core::filename::{FilenamePolicyOptions, SizeTag};
use aperture::libs::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct FakeDownloader {
    bytes: Vec<u8>,
    calls: AtomicUsize,
}

impl FakeDownloader {
    fn new(bytes: Vec<u8>) -> Self {
        Self { bytes, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Downloader for FakeDownloader {
    async fn fetch_to_file(&self, _url: &str, target: &Path) -> Result<(), SessionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(target, &self.bytes).await.unwrap();
        Ok(())
    }
}

/// A downloader that always fails with a classified session error —
/// used to drive the retry state machine's re-auth path.
struct AlwaysSessionInvalid;

#[async_trait]
impl Downloader for AlwaysSessionInvalid {
    async fn fetch_to_file(&self, _url: &str, _target: &Path) -> Result<(), SessionError> {
        Err(SessionError::Api(ApiError {
            reason: "Invalid global session".to_string(),
            code: None,
        }))
    }
}

#[derive(Default)]
struct NoopAssetService {
    deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl AssetService for NoopAssetService {
    async fn list_albums(&self) -> Result<Vec<Album>, SessionError> {
        Ok(vec![])
    }

    async fn photos_request(&self, _album: &str, _offset: usize) -> Result<AssetPage, SessionError> {
        Ok(AssetPage { assets: vec![], next_offset: None })
    }

    async fn delete(&self, asset: &Asset) -> Result<(), SessionError> {
        self.deleted.lock().unwrap().push(asset.id.clone());
        Ok(())
    }
}

/// Always succeeds, regardless of `force_refresh` — used where re-auth
/// should not be exercised.
struct AlwaysAuth;

#[async_trait]
impl AuthController for AlwaysAuth {
    async fn authenticate(&self, _credentials: &Credentials, _force_refresh: bool) -> Result<SharedSession, RunError> {
        Ok(Arc::new(parking_lot::RwLock::new(Session::default())))
    }

    fn invalidate(&self) {}
}

/// Always fails `authenticate`, so the re-auth subroutine exhausts its cap.
struct NeverAuth;

#[async_trait]
impl AuthController for NeverAuth {
    async fn authenticate(&self, _credentials: &Credentials, _force_refresh: bool) -> Result<SharedSession, RunError> {
        Err(RunError::LoginRejected)
    }

    fn invalidate(&self) {}
}

#[derive(Default)]
struct FakeClock {
    sleeps: AtomicUsize,
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, _duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

struct TrackingExif {
    existing: Option<&'static str>,
    set_calls: AtomicUsize,
}

#[async_trait]
impl ExifWriter for TrackingExif {
    async fn get_photo_exif(&self, _path: &Path) -> anyhow::Result<Option<String>> {
        Ok(self.existing.map(str::to_string))
    }

    async fn set_photo_exif(&self, _path: &Path, _created_local: DateTime<Local>) -> anyhow::Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn make_asset(id: &str, filename: &str, size_bytes: u64, created: DateTime<Utc>) -> Asset {
    let mut versions = HashMap::new();
    versions.insert(
        SizeTag::Original,
        AssetVersion {
            url: "https://example.test/asset".to_string(),
            size_bytes,
            type_hint: None,
        },
    );
    Asset {
        id: id.to_string(),
        filename: filename.to_string(),
        created_timestamp: created,
        asset_date: created,
        item_type: ItemType::Photo,
        versions,
    }
}

fn default_options(wait_seconds: u64) -> DownloadOptions {
    DownloadOptions {
        force_size: false,
        set_exif_datetime: false,
        delete_after_download: false,
        dry_run: false,
        skip_live_photos: false,
        wait_seconds,
        filename_policy: FilenamePolicyOptions::default(),
    }
}

fn shared_session() -> SharedSession {
    Arc::new(parking_lot::RwLock::new(Session::default()))
}

#[tokio::test]
async fn repeated_download_is_skipped_without_a_second_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let options = default_options(0);
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let first = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(first, DownloadOutcome::Downloaded);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1);

    let (target_path, created_local) = resolve_target_path(&item.asset, SizeTag::Original, &item.root_dir, &options.filename_policy);
    let mtime = filetime::FileTime::from_last_modification_time(&std::fs::metadata(&target_path).unwrap());
    assert_eq!(mtime.unix_seconds(), created_local.timestamp());

    let second = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(second, DownloadOutcome::Skipped);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 1, "skip must not re-fetch");
}

#[tokio::test]
async fn size_mismatch_dedups_to_a_sibling_path_preserving_the_original() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 1_884_695, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };
    let options = default_options(0);

    let (target_path, _) = resolve_target_path(&item.asset, SizeTag::Original, &item.root_dir, &options.filename_policy);
    std::fs::create_dir_all(target_path.parent().unwrap()).unwrap();
    std::fs::write(&target_path, b"x").unwrap();

    let downloader = FakeDownloader::new(vec![0u8; 1_884_695]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);

    assert!(target_path.exists());
    assert_eq!(std::fs::metadata(&target_path).unwrap().len(), 1, "pre-existing file must survive");

    let deduped_path = target_path.with_file_name("IMG_7409-1884695.JPG");
    assert!(deduped_path.exists());
    assert_eq!(std::fs::metadata(&deduped_path).unwrap().len(), 1_884_695);
}

#[tokio::test]
async fn exif_set_is_suppressed_when_a_timestamp_is_already_present() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: Some("2018:07:31 07:22:24"), set_calls: AtomicUsize::new(0) };
    let mut options = default_options(0);
    options.set_exif_datetime = true;
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);
    assert_eq!(exif.set_calls.load(Ordering::SeqCst), 0, "a pre-existing EXIF timestamp must not be overwritten");
}

#[tokio::test]
async fn exif_set_runs_when_no_timestamp_is_present() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let mut options = default_options(0);
    options.set_exif_datetime = true;
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);
    assert_eq!(exif.set_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_size_without_force_falls_back_to_original() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    // Only "original" is present; "thumb" is requested.
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Thumb, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let options = default_options(0);
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);
}

#[tokio::test]
async fn missing_size_with_force_size_is_reported_missing() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Thumb, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let mut options = default_options(0);
    options.force_size = true;
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::MissingUrl);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dry_run_logs_would_delete_but_never_calls_delete() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let mut options = default_options(0);
    options.delete_after_download = true;
    options.dry_run = true;
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);
    assert!(asset_service.deleted.lock().unwrap().is_empty(), "dry-run must not invoke the provider delete endpoint");
}

#[tokio::test]
async fn delete_after_download_invokes_delete_when_not_dry_run() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![0u8; 5]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let mut options = default_options(0);
    options.delete_after_download = true;
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Downloaded);
    assert_eq!(asset_service.deleted.lock().unwrap().as_slice(), ["1"]);
}

#[tokio::test]
async fn auth_retry_cap_during_download_exhausts_after_five_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    let downloader = AlwaysSessionInvalid;
    let asset_service = NoopAssetService::default();
    let auth = NeverAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let options = default_options(0);
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Failed);
    // MAX_RETRIES (5) authenticate() attempts, no sleep before the first.
    assert_eq!(clock.sleeps.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn session_invalid_on_every_download_attempt_terminates_even_when_reauth_keeps_succeeding() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    let asset = make_asset("1", "IMG_7409.JPG", 5, created);
    let item = WorkItem { asset, size: SizeTag::Original, root_dir: dir.path().to_path_buf() };

    // Re-authentication always succeeds, but the provider keeps rejecting the
    // session on every download attempt. Without counting these cycles
    // against MAX_RETRIES, this would loop forever.
    let downloader = AlwaysSessionInvalid;
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let options = default_options(0);
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let outcome = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(outcome, DownloadOutcome::Failed);
    // MAX_RETRIES (5) download attempts, no sleep before the first.
    assert_eq!(clock.sleeps.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_url_for_both_requested_and_original_size_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let created = Utc.with_ymd_and_hms(2018, 7, 31, 7, 22, 24).unwrap();
    // No versions at all: neither the requested size nor the "original" fallback exist.
    let asset = Asset {
        id: "1".to_string(),
        filename: "IMG_7409.JPG".to_string(),
        created_timestamp: created,
        asset_date: created,
        item_type: ItemType::Photo,
        versions: HashMap::new(),
    };
    let item = WorkItem { asset, size: SizeTag::Thumb, root_dir: dir.path().to_path_buf() };

    let downloader = FakeDownloader::new(vec![]);
    let asset_service = NoopAssetService::default();
    let auth = AlwaysAuth;
    let creds = Credentials { username: "u".into(), password: "p".into(), client_id: "c".into() };
    let clock = FakeClock::default();
    let exif = TrackingExif { existing: None, set_calls: AtomicUsize::new(0) };
    let options = default_options(0);
    let missing = MissingUrlLog::new();
    let session = shared_session();

    let first = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    let second = download_with_retry(&downloader, &asset_service, &auth, &creds, &clock, &exif, &item, &options, &missing, &session).await;
    assert_eq!(first, DownloadOutcome::MissingUrl);
    assert_eq!(second, DownloadOutcome::MissingUrl);
    assert_eq!(downloader.calls.load(Ordering::SeqCst), 0);
}
