//! `scribe` binary: argument parsing, logging setup, and wiring the Slack
//! transport to the event pipeline.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use scribe_core::{ChannelLogSet, EventLogger};
use scribe_slack::{RtmRuntime, SlackApiClient, DEFAULT_API_BASE};

const REQUEST_TIMEOUT_MS: u64 = 30_000;
const RETRY_MAX_ATTEMPTS: usize = 3;
const RETRY_BASE_DELAY_MS: u64 = 500;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[command(
    name = "scribe",
    about = "Archiving bot for Slack. Appends every subscribed event to a per-channel JSON Lines file.",
    version
)]
struct Cli {
    /// Be verbose (debug-level logging).
    #[arg(short, long)]
    verbose: bool,

    /// React to every archived plain message with an emoji.
    #[arg(short, long)]
    react: bool,

    /// Destination directory to write events to (created if missing).
    destination: PathBuf,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let token =
        std::env::var("TOKEN").context("TOKEN environment variable is required to start")?;

    let logs = ChannelLogSet::open(&cli.destination)?;
    let logger = EventLogger::new(logs, cli.react);
    let client = SlackApiClient::new(
        DEFAULT_API_BASE.to_string(),
        token,
        REQUEST_TIMEOUT_MS,
        RETRY_MAX_ATTEMPTS,
        RETRY_BASE_DELAY_MS,
    )?;
    let runtime = RtmRuntime::new(client, logger, RECONNECT_DELAY);

    info!("starting");
    runtime.run().await?;

    // run() only returns cleanly when the user interrupts the process.
    info!("interrupted by user");
    std::process::exit(1);
}
