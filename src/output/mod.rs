//! Output document assembly
//!
//! Ranked rooms gain their display fields here, each room's server is mapped
//! to a web client URL, and the whole result is written to `data.json` in a
//! single atomic replace.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::errors::AppResult;
use crate::models::{OutputDocument, RoomRecord, ServerName};
use crate::utils::fs::save_file_atomic;
use crate::utils::url::UrlUtils;

pub mod web_ui;

pub use web_ui::WebUiResolver;

pub struct OutputAssembler {
    web_ui: WebUiResolver,
    data_file: PathBuf,
    time_zone: Tz,
}

impl OutputAssembler {
    pub fn new(web_ui: WebUiResolver, data_file: PathBuf, time_zone: Tz) -> Self {
        Self {
            web_ui,
            data_file,
            time_zone,
        }
    }

    pub fn from_config(web_ui: WebUiResolver, config: &Config) -> Self {
        Self::new(web_ui, config.data_file(), config.time_zone())
    }

    pub fn data_file(&self) -> &PathBuf {
        &self.data_file
    }

    /// Fill in the derived display fields of every room
    pub async fn decorate(&mut self, rooms: &mut [RoomRecord]) {
        for room in rooms.iter_mut() {
            room.world_readable_int = Some(u8::from(room.world_readable.unwrap_or(false)));
            room.guest_can_join_int = Some(u8::from(room.guest_can_join.unwrap_or(false)));

            let alias = room.display_alias().to_string();
            room.canonical_alias = Some(alias.clone());

            let web_ui = match UrlUtils::server_suffix(&alias) {
                Some(server) => self.web_ui.resolve(server).await,
                None => self.web_ui.fallback().to_string(),
            };
            room.link_web_ui = Some(format!("{web_ui}#/room/{alias}"));
        }
    }

    pub fn build_document(
        &self,
        rooms: Vec<RoomRecord>,
        servers: Vec<ServerName>,
        extra_servers: Vec<ServerName>,
        now: DateTime<Utc>,
    ) -> OutputDocument {
        OutputDocument {
            updated_at: now.with_timezone(&self.time_zone).to_rfc3339(),
            rooms,
            servers,
            extra_servers,
            server_web_ui: self.web_ui.resolved().clone(),
        }
    }

    /// Serialize and atomically replace the data file
    pub async fn write(&self, document: &OutputDocument) -> AppResult<()> {
        let bytes = serde_json::to_vec(document)?;
        save_file_atomic(&self.data_file, &bytes).await?;
        info!(
            "Wrote {} rooms to {}",
            document.rooms.len(),
            self.data_file.display()
        );
        Ok(())
    }
}

/// Print one line per ranked room with the fields a maintainer checks first
pub fn dump_rooms<W: Write>(rooms: &[RoomRecord], out: &mut W) -> std::io::Result<()> {
    fn or_dash<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| "-".to_string(), |v| v.to_string())
    }

    for room in rooms {
        let avatar = room.avatar_url_http.as_deref().or(room.avatar_url.as_deref());
        writeln!(
            out,
            "jm={} wr={} gj={} na={} ca={} id={} to={} av={}",
            or_dash(room.num_joined_members),
            or_dash(room.world_readable),
            or_dash(room.guest_can_join),
            or_dash(room.name.as_deref()),
            room.display_alias(),
            room.room_id,
            or_dash(room.topic.as_deref()),
            or_dash(avatar),
        )?;
    }
    Ok(())
}
