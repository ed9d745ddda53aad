//! Data model shared by the crawler, aggregator and output assembler

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Loosely typed JSON object as returned by the client API
pub type JsonObject = Map<String, Value>;

/// Federation domain name; ordered lexicographically
pub type ServerName = String;

/// One room as listed in a public room directory.
///
/// Fields the directory API documents are typed; anything else the server
/// sends is preserved in `extra` and written back out unchanged. The derived
/// fields are filled in while the output document is assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoomRecord {
    #[serde(default)]
    pub room_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_joined_members: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_readable: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_can_join: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Local thumbnail path, set by the avatar normalizer
    #[serde(
        rename = "avatarUrlHttp",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url_http: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_readable_int: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_can_join_int: Option<u8>,

    #[serde(rename = "linkWebUI", default, skip_serializing_if = "Option::is_none")]
    pub link_web_ui: Option<String>,

    /// Directory fields not modelled above
    #[serde(flatten)]
    pub extra: JsonObject,
}

impl RoomRecord {
    /// Joined member count, with an absent count ranking as zero
    pub fn member_count(&self) -> u64 {
        self.num_joined_members.unwrap_or(0)
    }

    /// Canonical alias if present and non-empty, else the room id
    pub fn display_alias(&self) -> &str {
        match self.canonical_alias.as_deref() {
            Some(alias) if !alias.is_empty() => alias,
            _ => &self.room_id,
        }
    }
}

fn mxc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\Amxc://([^/]+)/([^/?&#]+)").expect("valid mxc regex"))
}

fn room_alias_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\A#[^#:!@]+:([^:]+)").expect("valid room alias regex"))
}

/// Media reference parsed from an `mxc://host/id` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarRef {
    pub host: String,
    pub media_id: String,
}

impl AvatarRef {
    /// Parse an mxc URI.
    ///
    /// Returns `None` for anything that is not `mxc://host/id`, and for host
    /// or id components of `.` or `..` which would escape the media directory.
    pub fn parse(uri: &str) -> Option<Self> {
        let caps = mxc_re().captures(uri)?;
        let host = caps.get(1)?.as_str();
        let media_id = caps.get(2)?.as_str();
        if [host, media_id].iter().any(|c| *c == "." || *c == ".." || c.contains('\\')) {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            media_id: media_id.to_string(),
        })
    }

    /// Thumbnail location below the media directory
    pub fn destination(&self, media_dir: &Path) -> PathBuf {
        media_dir.join(&self.host).join(&self.media_id)
    }

    /// Path under which the output document refers to the thumbnail
    pub fn local_url(&self) -> String {
        format!("/avatar/{}/{}", self.host, self.media_id)
    }

    /// Download URL on the configured media endpoint
    pub fn download_url(&self, media_prefix: &str) -> String {
        format!("{}{}/{}", media_prefix, self.host, self.media_id)
    }
}

/// Room alias of the form `#localpart:domain`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAlias {
    pub alias: String,
    pub server: ServerName,
}

impl RoomAlias {
    pub fn parse(alias: &str) -> Option<Self> {
        let caps = room_alias_re().captures(alias)?;
        Some(Self {
            alias: alias.to_string(),
            server: caps.get(1)?.as_str().to_string(),
        })
    }
}

/// Document written once per run for the web front end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDocument {
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    pub rooms: Vec<RoomRecord>,
    pub servers: Vec<ServerName>,
    #[serde(rename = "extraServers")]
    pub extra_servers: Vec<ServerName>,
    #[serde(rename = "serverWebUi", default)]
    pub server_web_ui: BTreeMap<ServerName, String>,
}
