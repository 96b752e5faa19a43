//! `Display` implementation for aperture application messages.
//!
//! Converts each [`Message`] variant into the exact user-facing text the
//! design calls for. Kept as one big match so that every literal string in
//! the system has a single point of truth.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === AUTH / SESSION MESSAGES ===
            Message::PromptUsername => "Apple ID".to_string(),
            Message::PromptPassword => "Password".to_string(),
            Message::Prompt2faCode => "Please enter two-factor authentication code".to_string(),
            Message::PromptTrustedDeviceCode => "Please enter the code sent to your trusted device".to_string(),
            Message::RequiresInteractiveLogin => {
                "No stored session and no password available; a terminal is required to authenticate interactively".to_string()
            }
            Message::LoginRejected => "Invalid username or password".to_string(),
            Message::AuthenticationSucceeded => "Authenticated successfully".to_string(),
            Message::SessionValidated => "Session is valid, skipping login".to_string(),
            Message::SessionInvalidProbe => "Stored session is no longer valid, logging in again".to_string(),
            Message::TrustDeviceFailed(reason) => format!("Failed to trust this device: {}", reason),
            Message::CookieJarSaved => "Session cookies saved".to_string(),

            // === RUN / ORCHESTRATOR MESSAGES ===
            Message::DownloadingSummary(summary) => summary.clone(),
            Message::StartingSync => "Starting sync".to_string(),
            Message::AllAssetsDownloaded => "All photos have been downloaded".to_string(),
            Message::FoundConsecutivePreviouslyDownloaded(count) => {
                format!("Found {} consecutive previously downloaded photos. Exiting", count)
            }
            Message::SkippingOnlyPhotos(filename) => format!("Skipping {}, only downloading photos.", filename),
            Message::SkippingUnknownItemType(filename, item_type) => {
                format!("Skipping {}, only downloading photos and videos. (Item type was: {})", filename, item_type)
            }
            Message::WatchSleeping(seconds) => format!("Waiting {} seconds before next sync...", seconds),
            Message::InterruptReceived => "Interrupted, finishing in-flight downloads and stopping...".to_string(),

            // === LISTING MESSAGES ===
            Message::InternalErrorRetrying => "Internal Error at Apple, retrying...".to_string(),
            Message::InternalErrorFatal => "Internal Error at Apple.".to_string(),
            Message::ReauthenticationFailedDuringListing => "iCloud re-authentication failed. Please try again later.".to_string(),

            // === DOWNLOAD ENGINE MESSAGES ===
            Message::CouldNotConvertCreatedDate(iso) => format!("Could not convert photo created date to local timezone ({})", iso),
            Message::SizeNotAvailableForceSize(size, filename) => format!("{} size does not exist for {}. Skipping...", size, filename),
            Message::CouldNotFindUrlForSize(filename, size) => format!("Could not find URL to download {} for size {}", filename, size),
            Message::FileAlreadyExists(path) => format!("{} already exists", path),
            Message::FileDeduplicated(path) => format!("{} deduplicated", path),
            Message::CouldNotCreateFolder(dir) => format!("Could not create folder {}", dir),
            Message::IoErrorWritingFile(path) => {
                format!("IOError while writing file to {}. You might have run out of disk space.", path)
            }
            Message::SettingExifTimestamp(path, datetime) => format!("Setting EXIF timestamp for {}: {}", path, datetime),
            Message::ExifError(path) => format!("Error fetching/setting EXIF data for {}", path),
            Message::DryRunWouldDelete(filename) => format!("[DRY RUN] Would delete {} in iCloud", filename),
            Message::ErrorDownloadingRetrying(filename, wait_seconds) => {
                format!("Error downloading {}, retrying after {} seconds...", filename, wait_seconds)
            }
            Message::CouldNotDownload(filename) => format!("Could not download {}. Please try again later.", filename),
            Message::SessionErrorReauthenticating => "Session error, re-authenticating...".to_string(),
            Message::DeleteFailed(filename, reason) => format!("Could not delete {} in iCloud: {}", filename, reason),

            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigLoaded => "Configuration loaded successfully".to_string(),
            Message::ConfigInitHeader => "Aperture configuration".to_string(),
            Message::PromptDefaultAlbum => "Default album".to_string(),
            Message::PromptDefaultDirectory => "Default local directory".to_string(),
            Message::PromptDefaultSizes => "Default size(s), comma separated".to_string(),
            Message::PromptThreadsNum => "Number of download worker threads".to_string(),
            Message::PromptKeepUnicode => "Keep unicode characters in filenames".to_string(),
            Message::ClientIdGenerated(id) => format!("Generated new client id: {}", id),
        };
        write!(f, "{}", text)
    }
}
