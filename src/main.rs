mod config;
mod report;
mod reporter;
mod source;
mod state;
mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::{mpsc, watch};

use crate::config::Config;
use crate::report::{HttpTransport, ReportClient};
use crate::reporter::NowPlayingReporter;
use crate::source::MediaSource;
use crate::types::ReportPayload;

/// Pending source events before the reader thread blocks
const EVENT_QUEUE_SIZE: usize = 64;

#[derive(Parser, Debug)]
#[command(version, about = "Reports now-playing tracks to a remote endpoint")]
struct Args {
    /// Path to config.toml (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Watch the media source and report track changes (default)
    Run,
    /// Send a test report and check the endpoint answers 200
    Check,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = config::load_config(args.config.as_deref()).context("Failed to load config")?;
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    match args.command.unwrap_or(Cmd::Run) {
        Cmd::Run => runtime.block_on(run(config)),
        Cmd::Check => runtime.block_on(check(config)),
    }
}

async fn run(config: Config) -> Result<()> {
    log::info!("Starting SongTracker, reporting to {}", config.endpoint);

    let client = ReportClient::new(&config.endpoint, &config.api_key, HttpTransport::new());
    let mut reporter = NowPlayingReporter::new(client);

    let (tx, rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let source = MediaSource::new();
    source
        .spawn(&config.source.command, tx)
        .context("Failed to start media source")?;

    // Ctrl+C and SIGTERM: stop the helper first, then leave the event loop
    let source_for_signal = source.clone();
    ctrlc::set_handler(move || {
        log::info!("Received termination signal, stopping media source...");
        if let Err(e) = source_for_signal.stop() {
            log::error!("Error stopping media source on interrupt: {}", e);
        }
        let _ = shutdown_tx.send(true);
    })
    .context("Failed to set signal handler")?;

    reporter::run(rx, &mut reporter, shutdown_rx).await;
    reporter.drain().await;

    if !config.source.command.is_empty() && !source.is_running() {
        log::info!("Media source is no longer running");
    }
    log::info!("Final state: {}", reporter.display());
    match reporter.current_track() {
        Some(track) => log::info!("Last reported track: {} - {}", track.title, track.artist),
        None => log::info!("No track was reported"),
    }

    source.stop()?;
    Ok(())
}

async fn check(config: Config) -> Result<()> {
    let client = ReportClient::new(&config.endpoint, &config.api_key, HttpTransport::new());
    let response = client
        .send_and_wait(&ReportPayload::new("Test Song", "Test Artist"))
        .await
        .context("Test report failed")?;

    log::info!("API response status: {}", response.status);
    if !response.body.is_empty() {
        log::info!("API response body: {}", response.body);
    }

    if response.status != 200 {
        anyhow::bail!("Expected 200 OK response, got {}", response.status);
    }

    println!("Endpoint {} accepted the test report", config.endpoint);
    Ok(())
}
