//! Error type definitions for the room crawler

use std::path::PathBuf;
use thiserror::Error;

/// Maximum number of characters of a response body kept in a parse diagnostic
pub const MAX_DIAGNOSTIC_BODY_CHARS: usize = 512;

/// Top-level error type for the crawler library
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Configuration could not be loaded or failed validation
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Login failed or returned no access token
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Non-success HTTP status from an API call
    #[error("request failed. {status} {method} {url} {message}")]
    Request {
        status: u16,
        method: String,
        url: String,
        message: String,
    },

    /// Non-success HTTP status on a cache-miss GET
    #[error("get failed. {url} {status}")]
    Fetch { status: u16, url: String },

    /// Transport-level failure: timeout, refused connection, broken body
    #[error("network error: {url} - {message}")]
    Network { url: String, message: String },

    /// Malformed response from a trusted endpoint
    #[error("Parse error: {context} - {message}. content={body}")]
    Parse {
        context: String,
        message: String,
        body: String,
    },

    /// Fetched media could not be decoded as a raster image
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Avatar media could not be fetched
    #[error("Avatar fetch failed: {url} - {message}")]
    AvatarFetch { url: String, message: String },

    /// Local storage failure
    #[error("Filesystem error: {} - {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Output document serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrawlerError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a parse error, truncating the offending body for the diagnostic
    pub fn parse<C: Into<String>, M: Into<String>>(context: C, message: M, body: &str) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.into(),
            body: truncate_chars(body, MAX_DIAGNOSTIC_BODY_CHARS),
        }
    }

    /// Create a filesystem error for the given path
    pub fn filesystem<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether this error reports a failed request rather than bad data.
    ///
    /// The crawler treats these as the end of a server's listing.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            Self::Request { .. } | Self::Fetch { .. } | Self::Network { .. }
        )
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
