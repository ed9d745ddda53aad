//! Run-once crawl driver
//!
//! login → list configured servers → resolve explicit rooms → reduce →
//! decorate → avatars → optional dump → write `data.json`

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::aggregator::RoomAggregator;
use crate::avatar::{AvatarNormalizer, AvatarOutcome};
use crate::cache::{CacheStats, DiskCache};
use crate::client::MatrixApiClient;
use crate::config::Config;
use crate::crawler::RoomDirectoryCrawler;
use crate::errors::AppResult;
use crate::models::{RoomAlias, ServerName};
use crate::output::{dump_rooms, OutputAssembler, WebUiResolver};
use crate::utils::http_client::build_http_client;

/// Counts reported at the end of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub rooms: usize,
    pub servers: Vec<ServerName>,
    pub extra_servers: Vec<ServerName>,
    pub avatars_available: usize,
    pub avatars_failed: usize,
    pub cache: CacheStats,
    pub data_file: PathBuf,
}

pub struct CrawlPipeline {
    config: Config,
}

impl CrawlPipeline {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn disk_cache(config: &Config) -> AppResult<DiskCache> {
        let http = build_http_client(&config.matrix.user_agent, config.http_timeout(), true)?;
        Ok(DiskCache::new(
            http,
            config.storage.cache_dir.clone(),
            config.cache_ttl(),
        ))
    }

    /// Delete every cached response of the configured cache directory
    pub async fn clear_cache(config: &Config) -> AppResult<usize> {
        Self::disk_cache(config)?.clear().await
    }

    pub async fn run(self) -> AppResult<RunSummary> {
        let config = self.config;
        let http = build_http_client(&config.matrix.user_agent, config.http_timeout(), true)?;
        let cache = Arc::new(DiskCache::new(
            http.clone(),
            config.storage.cache_dir.clone(),
            config.cache_ttl(),
        ));

        let client =
            MatrixApiClient::new(http, Arc::clone(&cache), config.matrix.api_prefix.clone());
        let mut crawler = RoomDirectoryCrawler::new(client, config.crawl.page_limit);

        if config.matrix.access_token.is_empty() {
            crawler
                .login(&config.matrix.username, &config.matrix.password)
                .await?;
        } else {
            crawler.set_access_token(&config.matrix.access_token);
        }

        let mut aggregator = RoomAggregator::new();
        let mut servers = BTreeSet::new();
        for server in &config.crawl.servers {
            let rooms = crawler.public_rooms(server).await?;
            if aggregator.add_all(server, rooms) > 0 {
                servers.insert(server.clone());
            }
        }

        let mut extra_servers = BTreeSet::new();
        for entry in &config.crawl.rooms {
            let Some(alias) = RoomAlias::parse(entry) else {
                warn!("not a room alias, skipped: {}", entry);
                continue;
            };
            if let Some(room) = crawler.find_room(&alias).await? {
                info!("room {} found", alias.alias);
                if aggregator.add(&alias.server, room) {
                    extra_servers.insert(alias.server.clone());
                }
            }
        }

        if aggregator.is_empty() {
            warn!("no rooms collected; writing an empty directory");
        }
        info!(
            "{} distinct rooms from {} servers and {} extra servers",
            aggregator.len(),
            servers.len(),
            extra_servers.len()
        );
        let mut rooms = aggregator.reduce();

        let web_ui = WebUiResolver::from_config(&config)?;
        let mut assembler = OutputAssembler::from_config(web_ui, &config);
        assembler.decorate(&mut rooms).await;

        let normalizer = AvatarNormalizer::from_config(Arc::clone(&cache), &config);
        let mut avatars_available = 0;
        let mut avatars_failed = 0;
        for room in rooms.iter_mut() {
            match normalizer.normalize(room).await {
                AvatarOutcome::Failed => avatars_failed += 1,
                outcome if outcome.is_available() => avatars_available += 1,
                _ => {}
            }
        }
        info!(
            "avatars: {} available, {} failed",
            avatars_available, avatars_failed
        );

        if config.output.dump_rooms {
            if let Err(e) = dump_rooms(&rooms, &mut std::io::stdout().lock()) {
                warn!("room dump interrupted: {}", e);
            }
        }

        let summary_rooms = rooms.len();
        let servers: Vec<ServerName> = servers.into_iter().collect();
        let extra_servers: Vec<ServerName> = extra_servers.into_iter().collect();
        let document =
            assembler.build_document(rooms, servers.clone(), extra_servers.clone(), Utc::now());
        assembler.write(&document).await?;

        let cache_stats = cache.stats();
        info!(
            "cache: {} hits, {} network requests, {} failures",
            cache_stats.hits, cache_stats.network_requests, cache_stats.failures
        );

        Ok(RunSummary {
            rooms: summary_rooms,
            servers,
            extra_servers,
            avatars_available,
            avatars_failed,
            cache: cache_stats,
            data_file: assembler.data_file().clone(),
        })
    }
}
