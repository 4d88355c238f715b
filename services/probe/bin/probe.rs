//! Entrypoint for the Live probe.
//!
//! 1. Parses the command line.
//! 2. Loads configuration from the environment.
//! 3. Initializes logging.
//! 4. Runs the selected scenario and prints a summary.

use anyhow::Context;
use clap::Parser;
use gemini_live_probe::{cli::Cli, config::ProbeConfig, execute};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ProbeConfig::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_filter))
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(
        scenario = cli.scenario.name(),
        model = cli.model.as_deref().unwrap_or(&config.model),
        endpoint = %config.endpoint,
        "Configuration loaded."
    );

    let summary = execute(&cli, &config).await?;

    info!(
        events = summary.events,
        text_chars = summary.text.chars().count(),
        audio_bytes = summary.audio_bytes,
        turn_complete = summary.turn_complete,
        timed_out = summary.timed_out,
        "Scenario finished."
    );
    if !summary.text.is_empty() {
        println!("{}", summary.text);
    }
    for error in &summary.errors {
        eprintln!("remote error: {error}");
    }
    Ok(())
}
