use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::AsyncReadExt;
use webpush_dispatch::renderer::{LogPresenter, NotificationRenderer, PushEvent};

#[derive(Parser, Debug)]
#[command(about = "Preview how a push payload is rendered on the receiving device")]
struct Args {
    /// File with the push event data; reads stdin when omitted
    #[arg(long)]
    file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let data = match args.file {
        Some(path) => tokio::fs::read(&path).await?,
        None => {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        }
    };

    let renderer = NotificationRenderer::new(LogPresenter);
    renderer.handle(&PushEvent::new(data)).await?;
    Ok(())
}
