use reqwest::header::LOCATION;
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::Config;
use crate::errors::AppResult;
use crate::models::ServerName;
use crate::utils::http_client::build_http_client;

/// Server whose web client lives on a different host
const MATRIX_ORG: &str = "matrix.org";
const MATRIX_ORG_WEB_UI: &str = "https://app.element.io/";

/// Maps a server name to the web client its users would open.
///
/// The server root is probed once per run without following redirects; a
/// `200` means the root serves a client, a redirect points at one, anything
/// else falls back to the configured default.
pub struct WebUiResolver {
    client: Option<Client>,
    scheme: String,
    fallback: String,
    resolved: BTreeMap<ServerName, String>,
}

impl WebUiResolver {
    pub fn new(client: Client, fallback: &str) -> Self {
        Self {
            client: Some(client),
            scheme: "https".to_string(),
            fallback: with_trailing_slash(fallback),
            resolved: BTreeMap::new(),
        }
    }

    /// Resolver that never probes; every server maps to `fallback`
    pub fn disabled(fallback: &str) -> Self {
        Self {
            client: None,
            scheme: "https".to_string(),
            fallback: with_trailing_slash(fallback),
            resolved: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        if !config.output.resolve_web_ui {
            return Ok(Self::disabled(&config.output.fallback_web_ui));
        }
        let client = build_http_client(&config.matrix.user_agent, config.http_timeout(), false)?;
        Ok(Self::new(client, &config.output.fallback_web_ui))
    }

    /// Probe with a scheme other than `https`
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Every resolution made so far
    pub fn resolved(&self) -> &BTreeMap<ServerName, String> {
        &self.resolved
    }

    pub async fn resolve(&mut self, server: &str) -> String {
        if let Some(url) = self.resolved.get(server) {
            return url.clone();
        }

        let url = if server == MATRIX_ORG {
            MATRIX_ORG_WEB_UI.to_string()
        } else {
            match self.probe(server).await {
                Some(url) => with_trailing_slash(&url),
                None => self.fallback.clone(),
            }
        };

        debug!("web UI for {}: {}", server, url);
        self.resolved.insert(server.to_string(), url.clone());
        url
    }

    async fn probe(&self, server: &str) -> Option<String> {
        let client = self.client.as_ref()?;
        let root = format!("{}://{}/", self.scheme, server);

        let response = match client.get(&root).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("web UI probe failed for {}: {}", server, e.without_url());
                return None;
            }
        };

        if response.status() == StatusCode::OK {
            return Some(root);
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|location| !location.is_empty())?;

        if location.starts_with('/') {
            Some(format!("{}://{}{}", self.scheme, server, location))
        } else {
            Some(location.to_string())
        }
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
