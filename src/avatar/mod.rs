//! Room avatar thumbnails
//!
//! Avatars referenced as `mxc://host/id` are downloaded once through the
//! cache, shrunk to a fixed-size PNG and stored under the media directory.
//! A thumbnail file never expires: its existence alone is enough to skip the
//! download on later runs. Media the `image` crate cannot decode is stored
//! as fetched so the browser can still try to render it.

use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::header::HeaderMap;
use std::collections::BTreeSet;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, trace, warn};

use crate::cache::DiskCache;
use crate::config::Config;
use crate::errors::{AppResult, CrawlerError};
use crate::models::{AvatarRef, RoomRecord, ServerName};
use crate::utils::fs::save_file_atomic;
use crate::utils::url::UrlUtils;

/// Edge length of generated thumbnails, in pixels
pub const THUMBNAIL_SIZE: u32 = 64;

/// What happened to one room's avatar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarOutcome {
    /// No avatar, or a reference that is not `mxc://host/id`
    Missing,
    /// Host is on the ignore list
    Ignored,
    /// Thumbnail already on disk
    Existing,
    /// Fetched, resized and written as PNG
    Thumbnail,
    /// Fetched but undecodable; written verbatim
    Raw,
    /// Fetch or local write failed
    Failed,
}

impl AvatarOutcome {
    /// Whether the room now points at a local thumbnail
    pub fn is_available(self) -> bool {
        matches!(self, Self::Existing | Self::Thumbnail | Self::Raw)
    }
}

pub struct AvatarNormalizer {
    cache: Arc<DiskCache>,
    media_prefix: String,
    media_dir: PathBuf,
    ignore_servers: BTreeSet<ServerName>,
}

impl AvatarNormalizer {
    pub fn new(
        cache: Arc<DiskCache>,
        media_prefix: impl Into<String>,
        media_dir: PathBuf,
        ignore_servers: BTreeSet<ServerName>,
    ) -> Self {
        Self {
            cache,
            media_prefix: media_prefix.into(),
            media_dir,
            ignore_servers,
        }
    }

    pub fn from_config(cache: Arc<DiskCache>, config: &Config) -> Self {
        Self::new(
            cache,
            config.matrix.media_prefix.clone(),
            config.media_dir(),
            config.crawl.ignore_servers.clone(),
        )
    }

    /// Ensure a local thumbnail exists for the room's avatar and point
    /// `avatarUrlHttp` at it. Failures are logged, never returned.
    pub async fn normalize(&self, room: &mut RoomRecord) -> AvatarOutcome {
        let Some(avatar) = room.avatar_url.as_deref().and_then(AvatarRef::parse) else {
            return AvatarOutcome::Missing;
        };

        if self.ignore_servers.contains(&avatar.host) {
            trace!("avatar host ignored: {}", avatar.host);
            return AvatarOutcome::Ignored;
        }

        let destination = avatar.destination(&self.media_dir);
        let outcome = if fs::try_exists(&destination).await.unwrap_or(false) {
            AvatarOutcome::Existing
        } else {
            match self.download(&avatar).await {
                Ok(outcome) => outcome,
                Err(e @ CrawlerError::AvatarFetch { .. }) => {
                    debug!("{}", e);
                    AvatarOutcome::Failed
                }
                Err(e) => {
                    warn!("avatar not stored for {}: {}", room.room_id, e);
                    AvatarOutcome::Failed
                }
            }
        };

        if outcome.is_available() {
            room.avatar_url_http = Some(avatar.local_url());
        }
        outcome
    }

    async fn download(&self, avatar: &AvatarRef) -> AppResult<AvatarOutcome> {
        let url = avatar.download_url(&self.media_prefix);
        let bytes = self
            .cache
            .get(&url, &HeaderMap::new(), true)
            .await
            .map_err(|e| CrawlerError::AvatarFetch {
                url: UrlUtils::redact(&url),
                message: e.to_string(),
            })?;

        let destination = avatar.destination(&self.media_dir);
        match make_thumbnail(&bytes) {
            Ok(png) => {
                save_file_atomic(&destination, &png).await?;
                Ok(AvatarOutcome::Thumbnail)
            }
            Err(e) => {
                debug!("{}: storing undecodable media as-is ({})", url, e);
                save_file_atomic(&destination, &bytes).await?;
                Ok(AvatarOutcome::Raw)
            }
        }
    }
}

/// Decode any supported raster format and re-encode it as a square PNG
pub fn make_thumbnail(bytes: &[u8]) -> AppResult<Vec<u8>> {
    let image = image::load_from_memory(bytes)?;
    let resized = image.resize_exact(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Lanczos3);

    let mut png = Vec::new();
    resized.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(png)
}
