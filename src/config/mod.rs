//! Crawler configuration
//!
//! A [`Config`] is loaded once at startup and then passed by reference into the
//! constructors of the cache, API client, crawler and output assembler. Two
//! file formats are accepted: TOML (any `*.toml` path) and the line-oriented
//! `name value` format handled by [`line_format`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::errors::{AppResult, CrawlerError};
use crate::models::{RoomAlias, ServerName};

pub mod defaults;
pub mod line_format;

use defaults::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log every request, cached or not
    pub verbose: bool,
    pub matrix: MatrixConfig,
    pub crawl: CrawlConfig,
    pub storage: StorageConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    pub user_agent: String,
    /// Client API prefix, e.g. `https://matrix.org/_matrix/client/v3`
    pub api_prefix: String,
    /// Media download prefix, `host/id` is appended verbatim
    pub media_prefix: String,
    pub username: String,
    pub password: String,
    /// Pre-issued token; when empty the crawler logs in with username/password
    pub access_token: String,
    pub http_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Servers whose public room directory is listed
    pub servers: BTreeSet<ServerName>,
    /// Room aliases resolved individually, `#localpart:domain`
    pub rooms: Vec<String>,
    pub page_limit: u32,
    /// Media hosts never contacted for avatars
    pub ignore_servers: BTreeSet<ServerName>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_expire_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub fallback_web_ui: String,
    pub resolve_web_ui: bool,
    pub time_zone: String,
    pub dump_rooms: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            media_prefix: DEFAULT_MEDIA_PREFIX.to_string(),
            username: String::new(),
            password: String::new(),
            access_token: String::new(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            servers: BTreeSet::new(),
            rooms: Vec::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            ignore_servers: DEFAULT_IGNORE_SERVERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cache_expire_hours: DEFAULT_CACHE_EXPIRE_HOURS,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fallback_web_ui: DEFAULT_FALLBACK_WEB_UI.to_string(),
            resolve_web_ui: DEFAULT_RESOLVE_WEB_UI,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            dump_rooms: DEFAULT_DUMP_ROOMS,
        }
    }
}

impl Config {
    /// Load and validate a configuration file.
    ///
    /// `*.toml` files are parsed as TOML, anything else as the line format.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CrawlerError::config(format!("{}: cannot read config file: {e}", path.display()))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        let config = if is_toml {
            toml::from_str::<Config>(&contents)
                .map_err(|e| CrawlerError::config(format!("{}: {e}", path.display())))?
        } else {
            line_format::parse(&path.display().to_string(), &contents)?
        };

        config.validate()?;
        debug!(
            "Configuration loaded from {}: {} servers, {} rooms",
            path.display(),
            config.crawl.servers.len(),
            config.crawl.rooms.len()
        );
        Ok(config)
    }

    /// Check cross-field constraints; every problem is reported at once
    pub fn validate(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        if self.matrix.access_token.is_empty()
            && (self.matrix.username.is_empty() || self.matrix.password.is_empty())
        {
            problems.push(
                "either an access token or both username and password must be configured"
                    .to_string(),
            );
        }

        for (name, value) in [
            ("api_prefix", &self.matrix.api_prefix),
            ("media_prefix", &self.matrix.media_prefix),
        ] {
            if let Err(e) = url::Url::parse(value) {
                problems.push(format!("{name} is not a valid URL ({value}): {e}"));
            }
        }

        for alias in &self.crawl.rooms {
            if RoomAlias::parse(alias).is_none() {
                problems.push(format!("room is not a '#localpart:domain' alias: {alias}"));
            }
        }

        if self.crawl.page_limit == 0 {
            problems.push("page_limit must be greater than zero".to_string());
        }

        if self.matrix.http_timeout_ms == 0 {
            problems.push("http_timeout_ms must be greater than zero".to_string());
        }

        if self.output.time_zone.parse::<chrono_tz::Tz>().is_err() {
            problems.push(format!("unknown time zone: {}", self.output.time_zone));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(CrawlerError::config(problems.join("; ")))
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.storage.cache_expire_hours.saturating_mul(3600))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.matrix.http_timeout_ms)
    }

    /// Directory holding avatar thumbnails
    pub fn media_dir(&self) -> PathBuf {
        self.storage.output_dir.join(AVATAR_DIR_NAME)
    }

    /// Output document location
    pub fn data_file(&self) -> PathBuf {
        self.storage.output_dir.join(DATA_FILE_NAME)
    }

    pub fn time_zone(&self) -> chrono_tz::Tz {
        self.output.time_zone.parse().unwrap_or(chrono_tz::Asia::Tokyo)
    }
}
