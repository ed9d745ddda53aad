/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Matrix client defaults
pub const DEFAULT_USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_API_PREFIX: &str = "https://matrix.org/_matrix/client/v3";
pub const DEFAULT_MEDIA_PREFIX: &str = "https://matrix.org/_matrix/media/v3/download/";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

// Storage defaults
pub const DEFAULT_CACHE_DIR: &str = "cache";
pub const DEFAULT_OUTPUT_DIR: &str = "web/public";
pub const DEFAULT_CACHE_EXPIRE_HOURS: u64 = 1;

// Crawl defaults
pub const DEFAULT_PAGE_LIMIT: u32 = 3000;

// Servers whose media is never fetched: dead, blocking, or otherwise excluded
pub const DEFAULT_IGNORE_SERVERS: &[&str] = &[
    "bousse.fr",
    "chat.cryptochat.io",
    "disroot.org",
    "dorfbrunnen.eu",
    "hispagatos.org",
    "horsein.space",
    "ldbco.de",
    "librezale.eus",
    "matrix.intelsway.info",
    "mux.re",
    "privy.ws",
    "synapse.keyvan.pw",
    "synapse.travnewmatic.com",
    "ubports.chat",
];

// Output defaults
pub const DEFAULT_FALLBACK_WEB_UI: &str = "https://app.element.io/";
pub const DEFAULT_RESOLVE_WEB_UI: bool = true;
pub const DEFAULT_TIME_ZONE: &str = "Asia/Tokyo";
pub const DEFAULT_DUMP_ROOMS: bool = false;

// Output layout inside output_dir
pub const DATA_FILE_NAME: &str = "data.json";
pub const AVATAR_DIR_NAME: &str = "avatar";
