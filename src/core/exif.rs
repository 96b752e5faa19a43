//! EXIF metadata writer collaborator.
//!
//! Treated as an opaque dependency per the scope this sync engine owns:
//! the download engine only needs to know whether a timestamp is already
//! present, and how to set one. The concrete JPEG/EXIF encoding is not
//! this crate's concern; [`NoopExifWriter`] is the default until a real
//! EXIF-writing backend is wired in.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::path::Path;

#[async_trait]
pub trait ExifWriter: Send + Sync {
    /// Returns the capture date already embedded in `path`'s EXIF data, if any.
    async fn get_photo_exif(&self, path: &Path) -> Result<Option<String>>;

    /// Embeds `created_local` as the capture date in `path`'s EXIF data.
    async fn set_photo_exif(&self, path: &Path, created_local: DateTime<Local>) -> Result<()>;
}

/// Default writer: reports no existing timestamp and performs no write.
/// Download Engine still emits its DEBUG "Setting EXIF timestamp" line
/// around this call, matching the behavior a real backend would have.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExifWriter;

#[async_trait]
impl ExifWriter for NoopExifWriter {
    async fn get_photo_exif(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set_photo_exif(&self, _path: &Path, _created_local: DateTime<Local>) -> Result<()> {
        Ok(())
    }
}
