use clap::{Args, Parser, Subcommand};

use crate::steam::{DEFAULT_API_BASE, DEFAULT_BATCH_SIZE, DEFAULT_TIMEOUT};
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "workshop-watch",
    version,
    about = "Watch Steam Workshop items for updates"
)]
pub struct Cli {
    /// JSON file holding tracked Workshop IDs and their last update times
    #[arg(
        long,
        global = true,
        env = "WORKSHOP_WATCH_STORE",
        default_value = "~/.workshop-watch/workshop_items.json"
    )]
    pub store: String,

    /// Discord-compatible webhook that receives update reports.
    /// Prefer the environment variable: the URL contains a secret token.
    #[arg(long, global = true, env = "WORKSHOP_WATCH_WEBHOOK_URL", hide_env_values = true)]
    pub webhook_url: Option<String>,

    /// Steam Web API base URL
    #[arg(long, global = true, default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Timeout for each Steam request, in milliseconds
    #[arg(long, global = true, default_value_t = DEFAULT_TIMEOUT.as_millis() as u64)]
    pub timeout_ms: u64,

    /// Maximum number of IDs per Steam request
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Attempts to retry a failed webhook delivery
    #[arg(long, global = true, default_value_t = 3)]
    pub notify_retries: u32,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start tracking Workshop IDs
    Add(IdsArgs),

    /// Stop tracking Workshop IDs
    Remove(IdsArgs),

    /// List tracked Workshop IDs
    List(ListArgs),

    /// Check tracked items for updates once
    Check,

    /// Check for updates periodically until interrupted
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IdsArgs {
    /// Workshop IDs, space-separated
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<String>,
}

impl IdsArgs {
    /// The IDs as one space-separated string, as a chat user would type it.
    pub fn raw(&self) -> String {
        self.ids.join(" ")
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Also show when each item was last updated
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Seconds between checks
    #[arg(long, default_value_t = 3600, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,
}
