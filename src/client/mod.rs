//! Authenticated client for a homeserver's client-server API
//!
//! GET calls go through the [`DiskCache`]; POST calls always hit the network.
//! Credentials travel in the `Authorization` header so cache keys and logged
//! URLs never contain the token.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::cache::DiskCache;
use crate::errors::{AppResult, CrawlerError};
use crate::models::JsonObject;
use crate::utils::http_client::network_error;
use crate::utils::url::UrlUtils;

pub struct MatrixApiClient {
    http: Client,
    cache: Arc<DiskCache>,
    api_prefix: String,
    access_token: Option<String>,
}

impl MatrixApiClient {
    pub fn new(http: Client, cache: Arc<DiskCache>, api_prefix: impl Into<String>) -> Self {
        Self {
            http,
            cache,
            api_prefix: api_prefix.into(),
            access_token: None,
        }
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        let token = token.into();
        self.access_token = if token.is_empty() { None } else { Some(token) };
    }

    /// Issue an API call and decode the response as a JSON object.
    ///
    /// For GET the parameters become a sorted, percent-encoded query string;
    /// for POST they are sent as the JSON body (an empty object when `None`).
    /// A cached GET body that fails to decode is evicted before the error
    /// is returned.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        params: Option<&JsonObject>,
    ) -> AppResult<JsonObject> {
        let url = format!("{}{}", self.api_prefix, path);
        let headers = self.auth_headers()?;

        if method == Method::GET {
            let url = match params {
                Some(params) => UrlUtils::append_query(&url, &UrlUtils::encode_query(params)),
                None => url,
            };
            let decoded = match self.cache.get_string(&url, &headers).await {
                Ok(body) => parse_json_object(&format!("GET {}", UrlUtils::redact(&url)), &body),
                Err(e) => Err(e),
            };
            if matches!(decoded, Err(CrawlerError::Parse { .. })) {
                self.cache.invalidate(&url).await?;
            }
            return decoded;
        }

        let display_url = UrlUtils::redact(&url);
        debug!("{} {}", method, display_url);

        let empty = JsonObject::new();
        let response = self
            .http
            .request(method.clone(), &url)
            .headers(headers)
            .json(params.unwrap_or(&empty))
            .send()
            .await
            .map_err(|e| network_error(&url, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| network_error(&url, e))?;

        if !status.is_success() {
            return Err(CrawlerError::Request {
                status: status.as_u16(),
                method: method.to_string(),
                url: display_url,
                message: error_message(&body),
            });
        }

        parse_json_object(&format!("{method} {display_url}"), &body)
    }

    fn auth_headers(&self) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                CrawlerError::auth("access token contains invalid header characters")
            })?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

/// Parse a response body that must be a JSON object
pub fn parse_json_object(context: &str, body: &str) -> AppResult<JsonObject> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CrawlerError::parse(context, "response is not a JSON object", body)),
        Err(e) => Err(CrawlerError::parse(context, e.to_string(), body)),
    }
}

/// The server's `error` string when the body carries one, else the raw body
fn error_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(error)) = map.get("error") {
            if !error.is_empty() {
                return error.clone();
            }
        }
    }
    body.to_string()
}
