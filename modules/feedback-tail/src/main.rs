use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use feedback_client::{ClientConfig, FeedbackClient, FeedbackItem, FeedbackList, PER_PAGE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("feedback=info".parse()?))
        .init();

    let args = Args::parse(std::env::args().skip(1))?;

    let config = ClientConfig::from_env()?;
    config.log_redacted();

    let client = Arc::new(FeedbackClient::from_config(&config)?);
    let list = FeedbackList::open(
        client,
        config.organization.clone(),
        config.query_view(),
        Utc::now(),
    )
    .await?;

    info!(
        loaded = list.count_loaded_rows(),
        total_hits = list.total_hits().unwrap_or(0),
        "Initial page loaded"
    );

    for _ in 0..args.pages {
        let before = list.count_loaded_rows();
        list.load_more_rows(before, before + PER_PAGE as usize).await?;
        if list.count_loaded_rows() == before {
            info!("No older feedback");
            break;
        }
    }

    if args.newer {
        list.load_newer(PER_PAGE).await?;
        list.loader().reset_initial_timestamp();
    }

    let snapshot = list.snapshot();
    println!(
        "\n=== {} feedback ({} of {}) ===",
        config.organization,
        snapshot.count_loaded_rows(),
        snapshot.total_hits.unwrap_or(0)
    );
    for item in &snapshot.items {
        println!("{}", format_row(item));
    }

    Ok(())
}

struct Args {
    /// Older pages to load after the first.
    pages: usize,
    /// Fetch one page of newer feedback at the end.
    newer: bool,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = Args {
            pages: 1,
            newer: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--pages" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--pages requires a number"))?;
                    parsed.pages = value.parse()?;
                }
                "--newer" => parsed.newer = true,
                other => anyhow::bail!("Unknown argument {other}"),
            }
        }
        Ok(parsed)
    }
}

fn format_row(item: &FeedbackItem) -> String {
    let message = item.message.as_deref().unwrap_or("").replace('\n', " ");
    let message: String = message.chars().take(80).collect();
    format!(
        "{}  {:<10}  {:<32}  {}",
        item.timestamp.format("%Y-%m-%d %H:%M:%S"),
        item.status.as_deref().unwrap_or("-"),
        item.contact_email.as_deref().unwrap_or("anonymous"),
        message
    )
}
