//! workshop-watch: track Steam Workshop items and report when they update.
//!
//! Tracked IDs and their last-seen update times live in a small JSON store.
//! Each check asks the Steam Web API for current details, baselines new
//! items silently, and reports items whose update time moved forward.

#![warn(clippy::all)]

mod cli;
mod config;
mod notify;
mod reconcile;
pub mod retry;
mod shutdown;
mod steam;
mod store;
mod tracker;
mod types;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Command;
use config::Config;
use notify::{LogNotifier, Notifier, WebhookNotifier};
use steam::SteamClient;
use store::{Marker, TrackedItem};
use tracker::{CommandReply, Tracker};

fn format_marker(marker: &Marker) -> String {
    match marker.timestamp() {
        None => "not checked yet".to_string(),
        Some(ts) => match chrono::DateTime::from_timestamp(ts, 0) {
            Some(dt) => format!("updated {}", dt.format("%Y-%m-%d %H:%M:%S UTC")),
            None => format!("updated at {}", ts),
        },
    }
}

fn print_items(items: &[TrackedItem]) {
    if items.is_empty() {
        println!("No Workshop IDs are tracked.");
        return;
    }
    for item in items {
        println!("{}\t{}", item.id, format_marker(&item.marker));
    }
}

fn finish(reply: CommandReply) -> anyhow::Result<()> {
    if reply.success {
        println!("{}", reply.message);
        Ok(())
    } else {
        anyhow::bail!("{}", reply.message)
    }
}

fn build_notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.webhook_url {
        Some(url) => Ok(Arc::new(WebhookNotifier::new(
            url.clone(),
            config.notify_retry.clone(),
        )?)),
        None => Ok(Arc::new(LogNotifier)),
    }
}

async fn run_check(tracker: &Tracker, config: &Config) -> anyhow::Result<()> {
    let changed = tracker.check_for_updates().await?;
    if changed.is_empty() {
        println!("No updates found! Smooth sailing!");
        return Ok(());
    }

    println!("{}", notify::format_update_message(&changed));
    if config.webhook_url.is_some() {
        build_notifier(config)?.notify(&changed).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_cli(&cli)?;
    tracing::debug!(?config, "Resolved configuration");

    let source = Arc::new(SteamClient::new(
        &config.api_base,
        config.request_timeout,
        config.batch_size,
    )?);
    let tracker = Tracker::open(&config.store_path, source).await?;

    match &cli.command {
        Command::Add(args) => finish(tracker.add_tracked(&args.raw()).await),
        Command::Remove(args) => finish(tracker.remove_tracked(&args.raw()).await),
        Command::List(args) if args.verbose => {
            print_items(&tracker.tracked_items().await?);
            Ok(())
        }
        Command::List(_) => {
            let ids = tracker.list_tracked().await?;
            if ids.is_empty() {
                println!("No Workshop IDs are tracked.");
            }
            for id in ids {
                println!("{}", id);
            }
            Ok(())
        }
        Command::Check => run_check(&tracker, &config).await,
        Command::Watch(args) => {
            let shutdown = shutdown::install_signal_handler()?;
            let notifier = build_notifier(&config)?;
            watch::run_watch(
                &tracker,
                notifier.as_ref(),
                Duration::from_secs(args.interval),
                shutdown,
            )
            .await;
            Ok(())
        }
    }
}
