//! Cross-server deduplication of directory observations
//!
//! The same room is usually visible through several servers' directories.
//! Observations are folded by room id and then by the server that reported
//! them; [`RoomAggregator::reduce`] picks one record per room and ranks the
//! result.

use std::collections::BTreeMap;

use crate::models::{RoomRecord, ServerName};
use crate::utils::url::UrlUtils;

#[derive(Debug, Default)]
pub struct RoomAggregator {
    entries: BTreeMap<String, BTreeMap<ServerName, RoomRecord>>,
}

impl RoomAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `server` listed `room`. Returns false when the record
    /// has no room id and was ignored.
    pub fn add(&mut self, server: &str, room: RoomRecord) -> bool {
        if room.room_id.is_empty() {
            return false;
        }
        self.entries
            .entry(room.room_id.clone())
            .or_default()
            .insert(server.to_string(), room);
        true
    }

    pub fn add_all<'a, I>(&mut self, server: &str, rooms: I) -> usize
    where
        I: IntoIterator<Item = &'a RoomRecord>,
    {
        rooms
            .into_iter()
            .filter(|room| self.add(server, (*room).clone()))
            .count()
    }

    /// Number of distinct rooms observed
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One record per room, by member count descending then room id
    pub fn reduce(self) -> Vec<RoomRecord> {
        let mut rooms: Vec<RoomRecord> = self
            .entries
            .into_iter()
            .filter_map(|(room_id, by_server)| choose(&room_id, by_server))
            .collect();

        rooms.sort_by(|a, b| {
            b.member_count()
                .cmp(&a.member_count())
                .then_with(|| a.room_id.cmp(&b.room_id))
        });
        rooms
    }
}

/// Pick the record reported by the room's home server, else the one from
/// the smallest server name
fn choose(room_id: &str, mut by_server: BTreeMap<ServerName, RoomRecord>) -> Option<RoomRecord> {
    if by_server.len() > 1 {
        if let Some(home) = UrlUtils::server_suffix(room_id) {
            if let Some(room) = by_server.remove(home) {
                return Some(room);
            }
        }
    }
    by_server.into_values().next()
}
