use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Resolved runtime configuration.
pub struct Config {
    pub store_path: PathBuf,
    pub api_base: String,
    pub webhook_url: Option<String>,
    pub request_timeout: Duration,
    pub batch_size: usize,
    pub notify_retry: RetryConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("store_path", &self.store_path)
            .field("api_base", &self.api_base)
            .field(
                "webhook_url",
                &self.webhook_url.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout", &self.request_timeout)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: &crate::cli::Cli) -> anyhow::Result<Self> {
        if cli.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        if cli.batch_size == 0 {
            anyhow::bail!("--batch-size must be greater than zero");
        }
        reqwest::Url::parse(&cli.api_base)
            .map_err(|e| anyhow::anyhow!("Invalid --api-base '{}': {}", cli.api_base, e))?;

        // An empty variable means "not configured", not a broken URL.
        let webhook_url = cli
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);
        if let Some(url) = &webhook_url {
            reqwest::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid webhook URL: {}", e))?;
        }

        Ok(Self {
            store_path: expand_tilde(&cli.store),
            api_base: cli.api_base.clone(),
            webhook_url,
            request_timeout: Duration::from_millis(cli.timeout_ms),
            batch_size: cli.batch_size,
            notify_retry: RetryConfig {
                max_retries: cli.notify_retries,
                ..RetryConfig::default()
            },
        })
    }
}
