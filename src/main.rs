use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matrix_room_crawler::{Config, CrawlPipeline};

#[derive(Parser)]
#[command(name = "matrix-room-crawler")]
#[command(version)]
#[command(about = "Aggregates Matrix public room directories into one ranked data.json")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (`*.toml`, or the `name value` line format)
    #[arg(default_value = "config.toml")]
    config: String,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    /// Delete all cached responses and exit
    #[arg(long)]
    clear_cache: bool,

    /// Print every ranked room to stdout
    #[arg(long)]
    dump_rooms: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from_file(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if cli.dump_rooms {
        config.output.dump_rooms = true;
    }

    // `verbose` in the config file raises the default level to debug
    let level = if config.verbose && cli.log_level == "info" {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("matrix_room_crawler={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting matrix-room-crawler v{} with {}",
        env!("CARGO_PKG_VERSION"),
        cli.config
    );

    if cli.clear_cache {
        let removed = CrawlPipeline::clear_cache(&config)
            .await
            .context("failed to clear cache")?;
        info!("Removed {} cache files", removed);
        return Ok(());
    }

    let summary = CrawlPipeline::new(config)
        .run()
        .await
        .context("crawl failed")?;

    info!(
        "Done: {} rooms from {} servers (+{} extra) written to {}",
        summary.rooms,
        summary.servers.len(),
        summary.extra_servers.len(),
        summary.data_file.display()
    );
    Ok(())
}
