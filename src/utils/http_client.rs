use reqwest::{redirect, Client};
use std::time::Duration;

use crate::errors::{AppResult, CrawlerError};
use crate::utils::url::UrlUtils;

/// Build the shared HTTP client.
///
/// Connect and total request time are both bound to `timeout`. With
/// `follow_redirects` false the client returns 3xx responses as-is, which the
/// web UI probe relies on to read `Location`.
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
    follow_redirects: bool,
) -> AppResult<Client> {
    let policy = if follow_redirects {
        redirect::Policy::default()
    } else {
        redirect::Policy::none()
    };

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(timeout)
        .timeout(timeout)
        .redirect(policy)
        .build()
        .map_err(|e| CrawlerError::config(format!("Failed to create HTTP client: {e}")))
}

/// Convert a transport failure into a network error with a redacted URL
pub fn network_error(url: &str, error: reqwest::Error) -> CrawlerError {
    let kind = if error.is_timeout() {
        "timeout"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "transport error"
    };
    CrawlerError::Network {
        url: UrlUtils::redact(url),
        message: format!("{kind}: {}", error.without_url()),
    }
}
