use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::Parser;
use url::Url;
use webpush_dispatch::model::{SubscriptionKeys, SubscriptionRecord};
use webpush_dispatch::token::{decode_token, encode_token};

#[derive(Parser, Debug)]
#[command(about = "Build a subscriber token from a browser push subscription")]
struct Args {
    /// JSON file holding `PushSubscription.toJSON()` output
    #[arg(long, conflicts_with_all = ["endpoint", "p256dh", "auth"])]
    file: Option<PathBuf>,

    /// Push service endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Subscriber P-256 public key (base64url)
    #[arg(long)]
    p256dh: Option<String>,

    /// Subscriber auth secret (base64url)
    #[arg(long)]
    auth: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let record = match (args.file, args.endpoint, args.p256dh, args.auth) {
        (Some(path), _, _, _) => {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            decode_token(&STANDARD.encode(raw.trim()))?
        }
        (None, Some(endpoint), Some(p256dh), Some(auth)) => SubscriptionRecord {
            endpoint: Url::parse(&endpoint).context("invalid --endpoint")?,
            keys: SubscriptionKeys { p256dh, auth },
        },
        _ => bail!("pass either --file or all of --endpoint, --p256dh and --auth"),
    };

    println!("{}", encode_token(&record));
    Ok(())
}
