//! Matrix public room directory crawler
//!
//! Collects the public room directories of a configured set of homeservers,
//! merges rooms seen through several servers into one record each, stores
//! avatar thumbnails locally and writes a single ranked `data.json` for a
//! static web front end.

pub mod aggregator;
pub mod avatar;
pub mod cache;
pub mod client;
pub mod config;
pub mod crawler;
pub mod errors;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod utils;

pub use config::Config;
pub use errors::{AppResult, CrawlerError};
pub use pipeline::{CrawlPipeline, RunSummary};
