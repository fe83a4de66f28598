//! # Digest Courier
//!
//! Captures social timelines and market news, hands them to Gemini for
//! summarization, and mails the resulting digests.
//!
//! ## Features
//!
//! - Timeline capture through public Nitter mirrors, with mirror fallback
//! - Built-in profiles for the Groww daily digest, Zerodha Pulse, a local
//!   stock-news file and per-subject capture analysis
//! - Bounded retry around every model call
//! - Failure notices by email whenever a run cannot produce an analysis
//!
//! ## Usage
//!
//! ```sh
//! digest_courier capture
//! digest_courier run screenshot-analysis
//! digest_courier --dry-run run pulse-news
//! ```
//!
//! ## Architecture
//!
//! Each run is a strictly sequential pipeline:
//! 1. **Fetch**: HTTP source, local file, or capture directory
//! 2. **Normalize**: HTML to text, first JSON record, or raw binary
//! 3. **Summarize**: Gemini `generateContent` with bounded retry
//! 4. **Format**: section conversion or pass-through envelope
//! 5. **Notify**: SMTP over TLS, or stdout with `--dry-run`

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod normalize;
mod notify;
mod outputs;
mod pipeline;
mod profiles;
mod sources;
mod utils;

use api::{GeminiClient, RetrySummarizer};
use cli::{Cli, Command};
use config::AppConfig;
use error::PipelineError;
use notify::{DryRunNotifier, Mailer, SmtpNotifier};
use pipeline::Pipeline;
use profiles::ProfileTable;
use sources::{http, nitter};
use utils::today;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "digest_courier starting up");

    let cli = Cli::parse();
    debug!(command = ?cli.command, dry_run = cli.dry_run, "Parsed CLI arguments");
    let config = AppConfig::from_cli(&cli);

    match dispatch(&cli.command, &config).await {
        Err(e @ PipelineError::Config { .. }) => {
            error!(error = %e, "Configuration error");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "Run aborted");
            return Err(e.into());
        }
        Ok(()) => {}
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn dispatch(command: &Command, config: &AppConfig) -> Result<(), PipelineError> {
    match command {
        Command::Profiles => list_profiles(config).await,
        Command::Capture {
            throttle_secs,
            mirrors,
        } => capture(config, *throttle_secs, mirrors).await,
        Command::Run { profile } => run_profile(config, profile).await,
    }
}

async fn list_profiles(config: &AppConfig) -> Result<(), PipelineError> {
    let table = ProfileTable::load(&config.paths, config.profiles_file.as_deref()).await?;
    for profile in table.iter() {
        println!(
            "{:<22} {:<32} {}",
            profile.name,
            profile.model,
            profile.source.describe()
        );
    }
    Ok(())
}

#[instrument(level = "info", skip(config, mirrors))]
async fn capture(
    config: &AppConfig,
    throttle_secs: u64,
    mirrors: &[String],
) -> Result<(), PipelineError> {
    let mirrors = if mirrors.is_empty() {
        nitter::DEFAULT_MIRRORS
            .iter()
            .map(|m| m.to_string())
            .collect()
    } else {
        mirrors.to_vec()
    };
    let since = Utc::now() - ChronoDuration::days(1);
    let client = http::build_client()?;

    let report = pipeline::run_capture(
        &client,
        &config.paths.subjects_file,
        &config.paths.capture_dir,
        &mirrors,
        Duration::from_secs(throttle_secs),
        since,
    )
    .await?;

    if !report.failed.is_empty() {
        error!(subjects = ?report.failed, "Some subjects could not be captured");
    }
    Ok(())
}

#[instrument(level = "info", skip(config))]
async fn run_profile(config: &AppConfig, name: &str) -> Result<(), PipelineError> {
    let table = ProfileTable::load(&config.paths, config.profiles_file.as_deref()).await?;
    let profile = table.get(name)?;

    let gemini = config.require_gemini()?;
    let mailer = if config.dry_run {
        Mailer::DryRun(DryRunNotifier)
    } else {
        Mailer::Smtp(SmtpNotifier::new(&config.require_email()?)?)
    };

    let client = http::build_client()?;
    let summarizer = RetrySummarizer::new(GeminiClient::new(
        client.clone(),
        gemini.api_key,
        gemini.base_url,
    ));
    let pipeline = Pipeline::new(&client, &summarizer, &mailer, today());

    let report = pipeline.run(profile).await;
    info!(
        profile = %profile.name,
        succeeded = report.succeeded,
        failed = report.failed,
        delivered = report.delivered,
        failed_deliveries = report.failed_deliveries,
        "Run complete"
    );
    Ok(())
}
