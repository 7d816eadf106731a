use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

use feedmerge::config::Config;
use feedmerge::server;
use feedmerge::service::MergeService;

#[derive(Parser, Debug)]
#[command(
    name = "feedmerge",
    about = "Serve a public and a personalized podcast feed as one merged feed"
)]
struct Args {
    /// TOML config file (defaults apply when absent)
    #[arg(long, value_name = "FILE", default_value = "feedmerge.toml")]
    config: PathBuf,

    /// Address to listen on, overrides `bind_addr` from the config file
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let service = MergeService::from_config(&config).context("Invalid configuration")?;
    tracing::info!(
        public = %config.public_feed_url,
        cache_ttl_secs = config.cache_ttl_secs,
        "Starting feed merger"
    );

    server::serve(config.bind_addr, service)
        .await
        .with_context(|| format!("Server on {} failed", config.bind_addr))
}
