//! URL utilities for consistent URL handling
//!
//! Redaction, cache-key sanitizing and query-string encoding all live here so
//! the cache, the API client and the error messages agree on one rendering of
//! a request URL.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use url::Url;

/// URL utilities for consistent URL handling
pub struct UrlUtils;

fn access_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"access_token=[^&]+").expect("valid access_token regex"))
}

fn sensitive_params_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)([?&](?:password|passwd|pwd|pass)=)[^&]*")
            .expect("valid sensitive params regex")
    })
}

fn file_name_bad_chars_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[\\/:*?"<>|-]+"#).expect("valid file name regex"))
}

fn trailing_server_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":([^:]+)\z").expect("valid server suffix regex"))
}

impl UrlUtils {
    /// Hide credentials embedded in a URL.
    ///
    /// `access_token` query values become `xxx`, password-like query values
    /// become `****`, and URL userinfo is masked.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use matrix_room_crawler::utils::url::UrlUtils;
    ///
    /// let url = "https://example.org/_matrix/client/r0/publicRooms?access_token=secret&limit=5";
    /// assert_eq!(
    ///     UrlUtils::redact(url),
    ///     "https://example.org/_matrix/client/r0/publicRooms?access_token=xxx&limit=5"
    /// );
    /// ```
    pub fn redact(url: &str) -> String {
        let mut redacted = url.to_string();

        if let Ok(parsed) = Url::parse(url) {
            if !parsed.username().is_empty() || parsed.password().is_some() {
                let mut masked = parsed.clone();
                let _ = masked.set_username("****");
                let _ = masked.set_password(Some("****"));
                redacted = masked.to_string();
            }
        }

        let redacted = access_token_re().replace_all(&redacted, "access_token=xxx");
        sensitive_params_re()
            .replace_all(&redacted, "${1}****")
            .into_owned()
    }

    /// Replace each run of filesystem-unsafe characters with a single `-`
    pub fn sanitize_file_chars(text: &str) -> String {
        file_name_bad_chars_re().replace_all(text, "-").into_owned()
    }

    /// Encode parameters as a query string.
    ///
    /// Keys are sorted lexicographically; keys and values are percent-encoded.
    /// String values are used verbatim, anything else via its JSON rendering.
    pub fn encode_query(params: &Map<String, Value>) -> String {
        let mut entries: Vec<(&String, &Value)> = params.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(&value)
                )
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append an encoded query to a URL, respecting an existing query
    pub fn append_query(url: &str, query: &str) -> String {
        if query.is_empty() {
            return url.to_string();
        }
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{url}{separator}{query}")
    }

    /// Server name suffix of a Matrix identifier: the text after the final `:`
    ///
    /// # Examples
    ///
    /// ```rust
    /// use matrix_room_crawler::utils::url::UrlUtils;
    ///
    /// assert_eq!(UrlUtils::server_suffix("!abc:example.org"), Some("example.org"));
    /// assert_eq!(UrlUtils::server_suffix("no-server"), None);
    /// ```
    pub fn server_suffix(id: &str) -> Option<&str> {
        trailing_server_re()
            .captures(id)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}
