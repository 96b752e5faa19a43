//! Asset Service (C3): album enumeration, paginated asset listing, and
//! per-asset version/URL resolution.

use crate::core::error::SessionError;
use crate::core::filename::SizeTag;
use crate::core::transport::{Transport, TransportRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub const PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumKind {
    AllPhotos,
    Shared,
    UserAlbum,
}

#[derive(Debug, Clone)]
pub struct Album {
    pub name: String,
    pub kind: AlbumKind,
    /// Total asset count as reported by the provider, when available.
    /// Used to phrase the run summary when downloading an entire album.
    pub asset_count: Option<u64>,
}

/// A single version of an asset: the URL to fetch it from, its reported
/// size in bytes (used for the dedup decision), and an optional MIME hint.
#[derive(Debug, Clone)]
pub struct AssetVersion {
    pub url: String,
    pub size_bytes: u64,
    pub type_hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemType {
    Photo,
    Video,
    Unknown(String),
}

impl ItemType {
    pub fn from_provider_str(raw: &str) -> Self {
        match raw {
            "image" => ItemType::Photo,
            "movie" => ItemType::Video,
            other => ItemType::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Asset {
    pub id: String,
    /// Raw, provider-supplied filename — not yet run through the filename policy.
    pub filename: String,
    pub created_timestamp: DateTime<Utc>,
    pub asset_date: DateTime<Utc>,
    pub item_type: ItemType,
    pub versions: HashMap<SizeTag, AssetVersion>,
}

impl Asset {
    /// The asset's live-photo video companion size, if it has one.
    /// `preferred` is the `--live-photo-size` still-size selection
    /// (original/medium); its video-tag counterpart is tried first, with
    /// the other video tag as a fallback when the preferred one is absent.
    pub fn video_companion(&self, preferred: SizeTag) -> Option<SizeTag> {
        let (first, second) = if preferred == SizeTag::Medium {
            (SizeTag::MediumVideo, SizeTag::OriginalVideo)
        } else {
            (SizeTag::OriginalVideo, SizeTag::MediumVideo)
        };

        if self.versions.contains_key(&first) {
            Some(first)
        } else if self.versions.contains_key(&second) {
            Some(second)
        } else {
            None
        }
    }
}

/// One page of assets plus the offset to request next.
pub struct AssetPage {
    pub assets: Vec<Asset>,
    pub next_offset: Option<usize>,
}

/// Collaborator interface for album enumeration and paginated listing.
///
/// Pagination retry is owned by the orchestrator, not this trait: a page
/// fetch either succeeds or returns a [`SessionError`] the orchestrator
/// classifies and reacts to (re-auth, retry-with-sleep, or fatal).
#[async_trait]
pub trait AssetService: Send + Sync {
    async fn list_albums(&self) -> Result<Vec<Album>, SessionError>;

    /// Fetches one page of assets (most-recent-first) starting at `offset`.
    async fn photos_request(&self, album: &str, offset: usize) -> Result<AssetPage, SessionError>;

    async fn delete(&self, asset: &Asset) -> Result<(), SessionError>;
}

/// Production asset service backed by a [`Transport`].
pub struct RemoteAssetService {
    transport: Arc<dyn Transport>,
    base_url: String,
}

impl RemoteAssetService {
    pub fn new(transport: Arc<dyn Transport>, base_url: String) -> Self {
        Self { transport, base_url }
    }

    fn parse_asset(record: &serde_json::Value) -> Option<Asset> {
        let id = record.get("recordName")?.as_str()?.to_string();
        let fields = record.get("fields")?;

        let filename = fields.get("filename")?.get("value")?.as_str()?.to_string();
        let created_timestamp = fields
            .get("dateCreated")
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_i64())
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
            .unwrap_or_else(Utc::now);
        let asset_date = fields
            .get("assetDate")
            .and_then(|v| v.get("value"))
            .and_then(|v| v.as_i64())
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms))
            .unwrap_or(created_timestamp);
        let item_type_raw = fields.get("itemType").and_then(|v| v.get("value")).and_then(|v| v.as_str()).unwrap_or("unknown");

        let mut versions = HashMap::new();
        if let Some(resources) = fields.get("resJSON").and_then(|v| v.get("value")) {
            if let Some(map) = resources.as_object() {
                for (key, value) in map {
                    if let Some(tag) = SizeTag::parse(key) {
                        let url = value.get("url").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                        let size_bytes = value.get("size").and_then(|v| v.as_u64()).unwrap_or(0);
                        let type_hint = value.get("type").and_then(|v| v.as_str()).map(str::to_string);
                        versions.insert(tag, AssetVersion { url, size_bytes, type_hint });
                    }
                }
            }
        }

        Some(Asset {
            id,
            filename,
            created_timestamp,
            asset_date,
            item_type: ItemType::from_provider_str(item_type_raw),
            versions,
        })
    }
}

#[async_trait]
impl AssetService for RemoteAssetService {
    async fn list_albums(&self) -> Result<Vec<Album>, SessionError> {
        let request = TransportRequest::get(format!("{}/records/query", self.base_url));
        let response = self.transport.send(request).await?;

        let albums = response
            .json
            .as_ref()
            .and_then(|v| v.get("albums"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|a| {
                        let name = a.get("name")?.as_str()?.to_string();
                        let kind = match name.as_str() {
                            "All Photos" => AlbumKind::AllPhotos,
                            "Shared" => AlbumKind::Shared,
                            _ => AlbumKind::UserAlbum,
                        };
                        let asset_count = a.get("count").and_then(|v| v.as_u64());
                        Some(Album { name, kind, asset_count })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(albums)
    }

    async fn photos_request(&self, album: &str, offset: usize) -> Result<AssetPage, SessionError> {
        let body = serde_json::json!({
            "album": album,
            "offset": offset,
            "limit": PAGE_SIZE,
        });
        let request = TransportRequest::post(format!("{}/records/query", self.base_url), body);
        let response = self.transport.send(request).await?;

        let records = response.json.as_ref().and_then(|v| v.get("records")).and_then(|v| v.as_array());

        let assets: Vec<Asset> = records.map(|arr| arr.iter().filter_map(Self::parse_asset).collect()).unwrap_or_default();

        let next_offset = if assets.len() == PAGE_SIZE { Some(offset + PAGE_SIZE) } else { None };

        Ok(AssetPage { assets, next_offset })
    }

    async fn delete(&self, asset: &Asset) -> Result<(), SessionError> {
        let body = serde_json::json!({ "recordName": asset.id });
        let request = TransportRequest::post(format!("{}/records/modify", self.base_url), body);
        self.transport.send(request).await?;
        Ok(())
    }
}
