//! CLI entry point for the record search client.
//!
//! Logs in, fetches every record the server yields, submits the aggregated
//! summary and prints it as JSON on stdout.
//!
//! # Usage
//!
//! ```bash
//! # Single-record mode, default type only
//! recap
//!
//! # Batch mode: 30 records total, 5 per call, ItemB and ItemC only
//! recap 30 5 ItemB ItemC
//!
//! # Against another server
//! recap --url 10.0.0.7:5000 --log-level debug
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod logging;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use recap_client::config::DEFAULT_CONFIG_PATH;
use recap_client::session::{DEFAULT_BATCH_SIZE, DEFAULT_SEARCH_LIMIT};
use recap_client::{GrpcTransport, PollFetcher, RecapConfig, RecordKind, Session, SessionPlan};

use crate::logging::TracingConfig;

#[derive(Parser, Debug)]
#[command(name = "recap")]
#[command(about = "Fetch records from the search service and submit their summary", long_about = None)]
#[command(allow_negative_numbers = true)]
struct Cli {
    /// Maximum number of records the server emits in batch mode
    search_limit: Option<i32>,

    /// Records per batch call; must be less than the search limit
    batch_size: Option<i32>,

    /// Record types to request (ItemA, ItemB, ItemC). Defaults to ItemA only.
    allowed_types: Vec<String>,

    /// Configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server address, overrides the configured one
    #[arg(long)]
    url: Option<String>,

    /// Login name
    #[arg(long)]
    name: Option<String>,

    /// Initial login key
    #[arg(long)]
    key: Option<i32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Validate the positional arguments into a session plan.
    fn plan(&self) -> Result<SessionPlan> {
        let search_limit = match self.search_limit {
            Some(limit) if limit <= 0 => bail!("searchLimit needs to be a positive number"),
            Some(limit) => limit,
            None => DEFAULT_SEARCH_LIMIT,
        };

        let batch_size = match self.batch_size {
            Some(size) if size <= 0 || size >= search_limit => {
                bail!("batchSize needs to be a positive number less than searchLimit ({search_limit})")
            }
            Some(size) => size,
            None => DEFAULT_BATCH_SIZE,
        };

        let kinds = self
            .allowed_types
            .iter()
            .map(|name| {
                name.parse::<RecordKind>().with_context(|| {
                    format!("expected allowed type (ItemA, ItemB, ItemC), got {name} instead")
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SessionPlan::new(kinds, search_limit, batch_size))
    }

    /// Load the configuration file and apply command-line overrides.
    fn load_config(&self) -> Result<RecapConfig> {
        let path = self
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = RecapConfig::load_from(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;

        if let Some(url) = &self.url {
            config.server.url.clone_from(url);
        }
        if let Some(name) = &self.name {
            config.credentials.name.clone_from(name);
        }
        if let Some(key) = self.key {
            config.credentials.key = key;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Both steps fail before any network activity.
    let plan = cli.plan()?;
    let config = cli.load_config()?;

    let tracing_config =
        TracingConfig::from_logging_config(&config.logging).map_err(anyhow::Error::msg)?;
    logging::init(&tracing_config).map_err(anyhow::Error::msg)?;

    let address = config.server_address()?;
    tracing::info!(
        %address,
        types = ?plan.accepted_types,
        mode = ?plan.mode(),
        "starting session"
    );

    let transport = GrpcTransport::connect_with_config(&address, config.channel_config())
        .await
        .with_context(|| format!("failed to connect to {address}"))?;

    let report = Session::new(transport, config.credentials(), plan)
        .with_fetcher(PollFetcher::new(config.poll_config()))
        .run()
        .await?;

    if let Some(error) = &report.logout_error {
        tracing::warn!(%error, "summary was accepted but logout failed");
    }

    println!("{}", serde_json::to_string_pretty(&report.summary)?);
    Ok(())
}
