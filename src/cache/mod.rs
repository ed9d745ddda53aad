//! Disk-backed TTL cache fronting every outbound GET
//!
//! Each URL maps to one file under the cache directory. The key is the URL
//! with credentials redacted and filesystem-unsafe characters collapsed to
//! `-`, so the directory doubles as a readable log of what was fetched. A
//! file is fresh while its modification time is within the TTL.

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, trace, warn};

use crate::errors::{AppResult, CrawlerError};
use crate::utils::fs::{remove_if_exists, save_file_atomic};
use crate::utils::http_client::network_error;
use crate::utils::url::UrlUtils;

/// Longest cache file name used verbatim; longer keys are shortened with a digest
pub const MAX_CACHE_KEY_LEN: usize = 200;

/// Counters describing how the cache was used during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub network_requests: u64,
    pub failures: u64,
}

pub struct DiskCache {
    client: Client,
    cache_dir: PathBuf,
    ttl: Duration,
    hits: AtomicU64,
    network_requests: AtomicU64,
    failures: AtomicU64,
}

impl DiskCache {
    pub fn new(client: Client, cache_dir: PathBuf, ttl: Duration) -> Self {
        Self {
            client,
            cache_dir,
            ttl,
            hits: AtomicU64::new(0),
            network_requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// File name under which the response for `url` is stored
    pub fn cache_key(url: &str) -> String {
        let key = UrlUtils::sanitize_file_chars(&UrlUtils::redact(url));
        if key.len() <= MAX_CACHE_KEY_LEN {
            return key;
        }

        let digest = Sha256::digest(key.as_bytes());
        // prefix + '-' + 64 hex chars stays within MAX_CACHE_KEY_LEN
        let mut cut = MAX_CACHE_KEY_LEN - 65;
        while !key.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}-{:x}", &key[..cut], digest)
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(Self::cache_key(url))
    }

    /// GET `url`, serving from disk while the cached copy is fresh.
    ///
    /// In `silent` mode per-request lines drop to `trace` level; avatar
    /// fetches use this because many media hosts are expected to fail.
    pub async fn get(&self, url: &str, headers: &HeaderMap, silent: bool) -> AppResult<Vec<u8>> {
        let cache_path = self.cache_path(url);
        let display_url = UrlUtils::redact(url);

        if let Some(bytes) = self.read_fresh(&cache_path).await? {
            self.hits.fetch_add(1, Ordering::Relaxed);
            if silent {
                trace!("GET(cached) {}", display_url);
            } else {
                debug!("GET(cached) {}", display_url);
            }
            return Ok(bytes);
        }

        if silent {
            trace!("GET {}", display_url);
        } else {
            debug!("GET {}", display_url);
        }
        self.network_requests.fetch_add(1, Ordering::Relaxed);

        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(|e| {
                self.failures.fetch_add(1, Ordering::Relaxed);
                network_error(url, e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            self.failures.fetch_add(1, Ordering::Relaxed);
            remove_if_exists(&cache_path).await?;
            return Err(CrawlerError::Fetch {
                status: status.as_u16(),
                url: display_url,
            });
        }

        let bytes = response.bytes().await.map_err(|e| {
            self.failures.fetch_add(1, Ordering::Relaxed);
            network_error(url, e)
        })?;
        save_file_atomic(&cache_path, &bytes).await?;
        Ok(bytes.to_vec())
    }

    /// Same as [`DiskCache::get`], decoding the body as UTF-8
    pub async fn get_string(&self, url: &str, headers: &HeaderMap) -> AppResult<String> {
        let bytes = self.get(url, headers, false).await?;
        String::from_utf8(bytes).map_err(|e| {
            let lossy = String::from_utf8_lossy(e.as_bytes()).into_owned();
            CrawlerError::parse(
                format!("GET {}", UrlUtils::redact(url)),
                format!("response is not valid UTF-8: {}", e.utf8_error()),
                &lossy,
            )
        })
    }

    /// Forget the cached response for `url`; the next `get` goes to the network
    pub async fn invalidate(&self, url: &str) -> AppResult<()> {
        debug!("Invalidating cached {}", UrlUtils::redact(url));
        remove_if_exists(&self.cache_path(url)).await
    }

    /// Remove every cached response. Returns the number of files deleted.
    pub async fn clear(&self) -> AppResult<usize> {
        let mut entries = match fs::read_dir(&self.cache_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CrawlerError::filesystem(&self.cache_dir, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CrawlerError::filesystem(&self.cache_dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            if is_file {
                let path = entry.path();
                fs::remove_file(&path)
                    .await
                    .map_err(|e| CrawlerError::filesystem(&path, e))?;
                removed += 1;
            }
        }

        info!("Cleared {} cached responses from {}", removed, self.cache_dir.display());
        Ok(removed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            network_requests: self.network_requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    async fn read_fresh(&self, path: &Path) -> AppResult<Option<Vec<u8>>> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Ok(None),
        };

        let modified = match metadata.modified() {
            Ok(modified) => modified,
            Err(e) => {
                warn!("Cannot read mtime of {}: {}", path.display(), e);
                return Ok(None);
            }
        };

        // A modification time in the future counts as age zero
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.ttl {
            return Ok(None);
        }

        fs::read(path)
            .await
            .map(Some)
            .map_err(|e| CrawlerError::filesystem(path, e))
    }
}
