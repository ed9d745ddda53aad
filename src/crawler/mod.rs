//! Public room directory crawling
//!
//! Each server's directory is paged through `/publicRooms` following
//! `next_batch` tokens until the chain ends. Listings are memoized for the
//! lifetime of the crawler, so a server is only ever paged once per run.

use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::client::MatrixApiClient;
use crate::errors::{AppResult, CrawlerError};
use crate::models::{JsonObject, RoomAlias, RoomRecord, ServerName};

/// Result size requested when searching for one alias
pub const EXPLICIT_LOOKUP_LIMIT: u32 = 20;

pub struct RoomDirectoryCrawler {
    client: MatrixApiClient,
    page_limit: u32,
    listings: HashMap<ServerName, Vec<RoomRecord>>,
}

impl RoomDirectoryCrawler {
    pub fn new(client: MatrixApiClient, page_limit: u32) -> Self {
        Self {
            client,
            page_limit,
            listings: HashMap::new(),
        }
    }

    pub fn set_access_token(&mut self, token: &str) {
        self.client.set_access_token(token);
    }

    /// Password login; the returned token is used for every later call
    pub async fn login(&mut self, user: &str, password: &str) -> AppResult<()> {
        let mut params = JsonObject::new();
        params.insert("type".to_string(), json!("m.login.password"));
        params.insert("user".to_string(), json!(user));
        params.insert("password".to_string(), json!(password));

        let response = self
            .client
            .call(Method::POST, "/login", Some(&params))
            .await
            .map_err(|e| CrawlerError::auth(format!("login as {user} failed: {e}")))?;

        let token = response
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                CrawlerError::auth(format!("login as {user} returned no access_token"))
            })?;

        self.client.set_access_token(token);
        info!("Logged in as {}", user);
        Ok(())
    }

    /// Full directory listing of `server`, fetched on first use
    pub async fn public_rooms(&mut self, server: &str) -> AppResult<&[RoomRecord]> {
        if !self.listings.contains_key(server) {
            let rooms = self.fetch_listing(server).await?;
            info!("{}: {} public rooms", server, rooms.len());
            self.listings.insert(server.to_string(), rooms);
        }
        Ok(self.listings.get(server).map(Vec::as_slice).unwrap_or(&[]))
    }

    async fn fetch_listing(&self, server: &str) -> AppResult<Vec<RoomRecord>> {
        let mut rooms = Vec::new();
        let mut since: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut page = 0usize;

        loop {
            let mut params = JsonObject::new();
            params.insert("server".to_string(), json!(server));
            params.insert("limit".to_string(), json!(self.page_limit));
            if let Some(token) = &since {
                params.insert("since".to_string(), json!(token));
            }

            let response = match self
                .client
                .call(Method::GET, "/publicRooms", Some(&params))
                .await
            {
                Ok(response) => response,
                Err(e) if e.is_request_failure() => {
                    warn!("{}: listing ended after {} pages: {}", server, page, e);
                    break;
                }
                Err(e) => return Err(e),
            };
            page += 1;

            if page == 1 {
                if let Some(total) = response.get("total_room_count_estimate") {
                    info!("{}: total_room_count_estimate={}", server, total);
                }
            }

            let chunk = chunk_of(&response, &format!("GET /publicRooms server={server}"))?;
            rooms.extend(decode_chunk(server, chunk));

            match response.get("next_batch").and_then(Value::as_str) {
                Some(token) if !token.is_empty() => {
                    if !seen_tokens.insert(token.to_string()) {
                        warn!("{}: next_batch {} repeated, stopping", server, token);
                        break;
                    }
                    debug!("{}: page {} next_batch={}", server, page, token);
                    since = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(rooms)
    }

    /// Search `alias`'s own server for the room carrying that exact
    /// canonical alias.
    ///
    /// A missing or unusable match is logged and yields `None`. A failed
    /// lookup request is returned as an error.
    pub async fn find_room(&self, alias: &RoomAlias) -> AppResult<Option<RoomRecord>> {
        let path = format!("/publicRooms?server={}", urlencoding::encode(&alias.server));
        let mut params = JsonObject::new();
        params.insert("limit".to_string(), json!(EXPLICIT_LOOKUP_LIMIT));
        params.insert(
            "filter".to_string(),
            json!({ "generic_search_term": alias.alias }),
        );

        let response = self.client.call(Method::POST, &path, Some(&params)).await?;

        let chunk = chunk_of(&response, &format!("POST {path}"))?;
        let found = chunk
            .iter()
            .find(|entry| {
                entry.get("canonical_alias").and_then(Value::as_str) == Some(alias.alias.as_str())
            })
            .cloned();

        match found {
            Some(entry) => match serde_json::from_value::<RoomRecord>(entry) {
                Ok(room) => Ok(Some(room)),
                Err(e) => {
                    warn!("room not usable. {}: {}", alias.alias, e);
                    Ok(None)
                }
            },
            None => {
                warn!("room not found. {}", alias.alias);
                Ok(None)
            }
        }
    }
}

fn chunk_of<'a>(response: &'a JsonObject, context: &str) -> AppResult<&'a Vec<Value>> {
    response
        .get("chunk")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let body = Value::Object(response.clone()).to_string();
            CrawlerError::parse(context, "response has no 'chunk' array", &body)
        })
}

/// Deserialize chunk entries, skipping the ones that do not fit a room
pub fn decode_chunk(server: &str, chunk: &[Value]) -> Vec<RoomRecord> {
    chunk
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RoomRecord>(entry.clone()) {
            Ok(room) => Some(room),
            Err(e) => {
                warn!("{}: skipping malformed room entry: {}", server, e);
                None
            }
        })
        .collect()
}
