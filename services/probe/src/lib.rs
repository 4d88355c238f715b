//! Exploratory client for the Gemini Live API.
//!
//! Each scenario opens one session through `gemini-realtime`, pushes a fixed
//! kind of input (text, synthetic tones, paced silence, a PCM file) and logs
//! the event stream that comes back. The `probe` binary is a thin wrapper
//! around [`execute`].

pub mod audio_utils;
pub mod cli;
pub mod config;
pub mod recorder;
pub mod scenario;

use anyhow::Context;
use cli::Cli;
use config::ProbeConfig;
use gemini_realtime::{Session, transport::websocket::WebSocketConnector};
use recorder::AudioRecorder;
use scenario::Summary;
use tracing::info;

/// Opens a session, runs the selected scenario and closes the session,
/// whether or not the scenario succeeded.
pub async fn execute(cli: &Cli, config: &ProbeConfig) -> anyhow::Result<Summary> {
    let mut recorder = AudioRecorder::create(cli.save_audio.as_deref()).await?;
    let session = Session::open(
        cli.session_config(config),
        &WebSocketConnector,
        &config.endpoint,
        &config.credential(),
    )
    .await
    .context("Failed to open Live session")?;

    let result = scenario::run(&session, &cli.scenario, &mut recorder).await;
    session.close().await;

    if let Some(path) = recorder.path() {
        info!(
            path = %path.display(),
            bytes = recorder.bytes_written(),
            "Saved reply audio."
        );
    }
    result
}
