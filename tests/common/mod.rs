//! Fake homeserver shared by the integration tests
//!
//! Serves the client-server and media endpoints the crawler uses on an
//! ephemeral loopback port and records every request it receives.

#![allow(dead_code)]

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use matrix_room_crawler::Config;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::Path as FsPath;
use std::sync::{Arc, Mutex};

pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
pub struct FakeHomeserver {
    /// server name -> pages of directory chunks, chained with `t1`, `t2`, ...
    pub directories: HashMap<String, Vec<Vec<Value>>>,
    /// server name -> (page index, status) at which listing starts failing
    pub failing_pages: HashMap<String, (usize, u16)>,
    /// server name -> body served with 200 in place of the first listing page
    pub raw_listings: HashMap<String, String>,
    /// server name -> rooms returned by filtered POST lookups
    pub lookups: HashMap<String, Vec<Value>>,
    /// server name -> status every filtered POST lookup fails with
    pub failing_lookups: HashMap<String, u16>,
    /// `host/id` -> media bytes
    pub media: HashMap<String, Vec<u8>>,
    pub login: Option<(String, String)>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeHomeserver {
    pub fn with_directory(mut self, server: &str, pages: Vec<Vec<Value>>) -> Self {
        self.directories.insert(server.to_string(), pages);
        self
    }

    pub fn with_failing_page(mut self, server: &str, page: usize, status: u16) -> Self {
        self.failing_pages.insert(server.to_string(), (page, status));
        self
    }

    pub fn with_raw_listing(mut self, server: &str, body: &str) -> Self {
        self.raw_listings.insert(server.to_string(), body.to_string());
        self
    }

    pub fn with_lookup(mut self, server: &str, rooms: Vec<Value>) -> Self {
        self.lookups.insert(server.to_string(), rooms);
        self
    }

    pub fn with_failing_lookup(mut self, server: &str, status: u16) -> Self {
        self.failing_lookups.insert(server.to_string(), status);
        self
    }

    pub fn with_media(mut self, host: &str, id: &str, bytes: Vec<u8>) -> Self {
        self.media.insert(format!("{host}/{id}"), bytes);
        self
    }

    pub fn with_login(mut self, user: &str, password: &str) -> Self {
        self.login = Some((user.to_string(), password.to_string()));
        self
    }

    fn record(
        &self,
        method: &str,
        path: String,
        query: HashMap<String, String>,
        headers: &HeaderMap,
        body: Option<Value>,
    ) {
        let authorization = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path,
            query,
            authorization,
            body,
        });
    }

    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.recorded()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn media_requests(&self) -> Vec<RecordedRequest> {
        self.recorded()
            .into_iter()
            .filter(|r| r.path.starts_with("/_matrix/media/"))
            .collect()
    }
}

async fn list_public_rooms(
    State(state): State<Arc<FakeHomeserver>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.record(
        "GET",
        "/_matrix/client/v3/publicRooms".to_string(),
        query.clone(),
        &headers,
        None,
    );

    let server = query.get("server").cloned().unwrap_or_default();
    let page = match query.get("since") {
        None => 0,
        Some(token) => match token.strip_prefix('t').and_then(|n| n.parse::<usize>().ok()) {
            Some(page) => page,
            None => return (StatusCode::BAD_REQUEST, "bad since token").into_response(),
        },
    };

    if let Some(body) = state.raw_listings.get(&server) {
        return (StatusCode::OK, body.clone()).into_response();
    }

    if let Some((failing_page, status)) = state.failing_pages.get(&server) {
        if page >= *failing_page {
            let status = StatusCode::from_u16(*status).unwrap();
            return (status, Json(json!({"errcode": "M_UNKNOWN", "error": "boom"}))).into_response();
        }
    }

    let Some(pages) = state.directories.get(&server) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"errcode": "M_NOT_FOUND", "error": "unknown server"})),
        )
            .into_response();
    };
    let chunk = pages.get(page).cloned().unwrap_or_default();

    let mut body = json!({ "chunk": chunk });
    if page == 0 {
        let total: usize = pages.iter().map(Vec::len).sum();
        body["total_room_count_estimate"] = json!(total);
    }
    if page + 1 < pages.len() {
        body["next_batch"] = json!(format!("t{}", page + 1));
    }
    Json(body).into_response()
}

async fn search_public_rooms(
    State(state): State<Arc<FakeHomeserver>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(
        "POST",
        "/_matrix/client/v3/publicRooms".to_string(),
        query.clone(),
        &headers,
        Some(body.clone()),
    );

    let server = query.get("server").cloned().unwrap_or_default();
    if let Some(status) = state.failing_lookups.get(&server) {
        let status = StatusCode::from_u16(*status).unwrap();
        return (status, Json(json!({"errcode": "M_UNKNOWN", "error": "lookup broke"})))
            .into_response();
    }
    let chunk = state.lookups.get(&server).cloned().unwrap_or_default();
    Json(json!({ "chunk": chunk })).into_response()
}

async fn login(
    State(state): State<Arc<FakeHomeserver>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(
        "POST",
        "/_matrix/client/v3/login".to_string(),
        HashMap::new(),
        &headers,
        Some(body.clone()),
    );

    let accepted = state.login.as_ref().is_some_and(|(user, password)| {
        body["type"] == "m.login.password" && body["user"] == *user && body["password"] == *password
    });
    if accepted {
        Json(json!({"access_token": TEST_TOKEN, "user_id": "@bot:fake"})).into_response()
    } else {
        (
            StatusCode::FORBIDDEN,
            Json(json!({"errcode": "M_FORBIDDEN", "error": "Invalid password"})),
        )
            .into_response()
    }
}

async fn download_media(
    State(state): State<Arc<FakeHomeserver>>,
    Path((host, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    state.record(
        "GET",
        format!("/_matrix/media/v3/download/{host}/{id}"),
        HashMap::new(),
        &headers,
        None,
    );
    match state.media.get(&format!("{host}/{id}")) {
        Some(bytes) => bytes.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Start serving `homeserver`; returns it shared with the base URL
pub async fn spawn(homeserver: FakeHomeserver) -> (Arc<FakeHomeserver>, String) {
    let state = Arc::new(homeserver);
    let app = Router::new()
        .route(
            "/_matrix/client/v3/publicRooms",
            get(list_public_rooms).post(search_public_rooms),
        )
        .route("/_matrix/client/v3/login", post(login))
        .route("/_matrix/media/v3/download/:host/:id", get(download_media))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("http://{addr}"))
}

/// Serve a single root response for web UI probing; returns `host:port`
pub async fn spawn_root(status: StatusCode, location: Option<&'static str>) -> String {
    let app = Router::new().route(
        "/",
        get(move || async move {
            let mut headers = HeaderMap::new();
            if let Some(location) = location {
                headers.insert(axum::http::header::LOCATION, location.parse().unwrap());
            }
            (status, headers, "root")
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

/// Configuration pointing every endpoint at the fake homeserver
pub fn test_config(base_url: &str, dir: &FsPath) -> Config {
    let mut config = Config::default();
    config.matrix.api_prefix = format!("{base_url}/_matrix/client/v3");
    config.matrix.media_prefix = format!("{base_url}/_matrix/media/v3/download/");
    config.matrix.access_token = TEST_TOKEN.to_string();
    config.matrix.http_timeout_ms = 5_000;
    config.storage.cache_dir = dir.join("cache");
    config.storage.output_dir = dir.join("out");
    config.crawl.ignore_servers = BTreeSet::new();
    config.output.resolve_web_ui = false;
    config.output.fallback_web_ui = "https://fallback.example/".to_string();
    config
}

pub fn room(room_id: &str, members: u64) -> Value {
    json!({
        "room_id": room_id,
        "num_joined_members": members,
        "world_readable": false,
        "guest_can_join": true,
    })
}

pub fn read_output(config: &Config) -> Value {
    let bytes = std::fs::read(config.data_file()).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
