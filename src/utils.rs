//! Utility functions for the room crawler
//!
//! - `utils::url` for URL redaction, cache-key sanitizing and query encoding
//! - `utils::fs` for the atomic write discipline shared by cache and output
//! - `utils::http_client` for building the configured `reqwest` clients

pub mod fs;
pub mod http_client;
pub mod url;

pub use self::fs::save_file_atomic;
pub use self::http_client::build_http_client;
pub use self::url::UrlUtils;

/// Interpret a loosely written boolean flag.
///
/// Empty, `0` and anything starting with `f`/`F` are false; everything else,
/// including `on` and `t...`, is true.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return false;
    }
    !value.to_ascii_lowercase().starts_with('f')
}
