//! Line-oriented `name value` configuration format
//!
//! ```text
//! ;; comments start with two semicolons
//! botServerPrefix https://matrix.example/_matrix/client/v3
//! botAccessToken  syt_xxx
//! server matrix.org
//! server mozilla.org
//! room   #rust:matrix.org
//! ```
//!
//! Every malformed line is reported as `<file> <line> : <message>` and the
//! whole load fails once, after all lines have been examined.

use regex::Regex;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;

use super::Config;
use crate::errors::{AppResult, CrawlerError};
use crate::utils::is_truthy;

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(";;.*").expect("valid comment regex"))
}

fn name_value_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\A(\S+)\s+(.*)").expect("valid name/value regex"))
}

/// Parse a line-format configuration. `source` names the file in diagnostics.
pub fn parse(source: &str, contents: &str) -> AppResult<Config> {
    let mut builder = LineConfigBuilder::default();
    let mut errors = Vec::new();

    for (index, raw_line) in contents.split('\n').enumerate() {
        let line_num = index + 1;
        let line = comment_re().replace_all(raw_line, "");
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(message) = builder.apply_line(line) {
            errors.push(format!("{source} {line_num} : {message}"));
        }
    }

    if errors.is_empty() {
        Ok(builder.config)
    } else {
        Err(CrawlerError::config(format!(
            "{source} parse failed.\n{}",
            errors.join("\n")
        )))
    }
}

#[derive(Default)]
struct LineConfigBuilder {
    config: Config,
    ignore_servers_overridden: bool,
}

impl LineConfigBuilder {
    fn apply_line(&mut self, line: &str) -> Result<(), String> {
        let caps = name_value_re()
            .captures(line)
            .ok_or_else(|| format!("not 'name value' format. {line}"))?;
        let name = caps.get(1).map_or("", |m| m.as_str());
        let value = caps.get(2).map_or("", |m| m.as_str()).trim();

        let config = &mut self.config;
        match name {
            "verbose" => config.verbose = is_truthy(value),
            "userAgent" => config.matrix.user_agent = value.to_string(),
            "botServerPrefix" => config.matrix.api_prefix = value.to_string(),
            "mediaPrefix" => config.matrix.media_prefix = value.to_string(),
            "botUser" => config.matrix.username = value.to_string(),
            "botPassword" => config.matrix.password = value.to_string(),
            "botAccessToken" => config.matrix.access_token = value.to_string(),
            "httpTimeoutMs" => config.matrix.http_timeout_ms = parse_number(name, value)?,
            "cacheExpireHours" => config.storage.cache_expire_hours = parse_number(name, value)?,
            "cacheDir" => config.storage.cache_dir = PathBuf::from(value),
            "outputDir" => config.storage.output_dir = PathBuf::from(value),
            "server" => {
                config.crawl.servers.insert(value.to_string());
            }
            "room" => config.crawl.rooms.push(value.to_string()),
            "ignoreServer" => {
                if !self.ignore_servers_overridden {
                    config.crawl.ignore_servers.clear();
                    self.ignore_servers_overridden = true;
                }
                config.crawl.ignore_servers.insert(value.to_string());
            }
            "pageLimit" => config.crawl.page_limit = parse_number(name, value)?,
            "dumpRooms" => config.output.dump_rooms = is_truthy(value),
            "fallbackWebUi" => config.output.fallback_web_ui = value.to_string(),
            "resolveWebUi" => config.output.resolve_web_ui = is_truthy(value),
            "timeZone" => config.output.time_zone = value.to_string(),
            _ => return Err(format!("unsupported config name: {name}")),
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T, String>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| format!("invalid number for {name}: {value} ({e})"))
}
