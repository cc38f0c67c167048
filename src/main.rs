use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use webpush_dispatch::config;
use webpush_dispatch::dispatch::Dispatcher;
use webpush_dispatch::http::{self, ApiState};
use webpush_dispatch::transport::WebPushTransport;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    // VAPID credentials are fixed for the life of the process.
    let transport = WebPushTransport::new(cfg.vapid.clone(), &cfg.push)?;
    let state = ApiState {
        dispatcher: Dispatcher::new(Arc::new(transport)),
    };

    let addr = cfg.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!(public_key = %cfg.vapid.public_key, "starting push dispatch service");
    http::serve(listener, state).await?;
    Ok(())
}
