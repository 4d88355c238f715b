//! Drives one scenario through a session and reports what came back.

use crate::{
    audio_utils::{
        convert_f32_to_i16, convert_i16_to_f32, pcm_bytes_to_samples, resample,
        samples_to_pcm_bytes, silence, tone,
    },
    cli::{Scenario, ToneArgs},
    recorder::AudioRecorder,
};
use anyhow::Context;
use futures_util::StreamExt;
use gemini_realtime::{InboundEvent, InputMultiplexer, Received, Session};
use tracing::{debug, error, info, warn};

/// What the model sent back during one scenario.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub events: usize,
    pub text: String,
    pub audio_bytes: usize,
    pub input_transcript: String,
    pub output_transcript: String,
    pub tool_calls: Vec<String>,
    pub errors: Vec<String>,
    pub interrupted: bool,
    pub turn_complete: bool,
    pub timed_out: bool,
}

impl Summary {
    fn record(&mut self, event: &InboundEvent) {
        self.events += 1;
        match event {
            InboundEvent::TextFragment { text } => self.text.push_str(text),
            InboundEvent::AudioFragment { pcm, .. } => self.audio_bytes += pcm.len(),
            InboundEvent::InputTranscription { text } => self.input_transcript.push_str(text),
            InboundEvent::OutputTranscription { text } => self.output_transcript.push_str(text),
            InboundEvent::ToolCallRequest { name, .. } => self.tool_calls.push(name.clone()),
            InboundEvent::ProtocolError { code, message } => {
                self.errors.push(format!("{code:?}: {message}"))
            }
            InboundEvent::Interrupted => self.interrupted = true,
            InboundEvent::TurnComplete { .. } => self.turn_complete = true,
            InboundEvent::SetupAck
            | InboundEvent::ToolCallCancelled { .. }
            | InboundEvent::GenerationComplete => {}
        }
    }
}

/// Sends the scenario's input while collecting events until the model turn
/// completes or the read timeout elapses.
pub async fn run(
    session: &Session,
    scenario: &Scenario,
    recorder: &mut AudioRecorder,
) -> anyhow::Result<Summary> {
    info!(scenario = scenario.name(), "Running scenario.");
    let (_, summary) = tokio::try_join!(drive(session, scenario), watch(session, recorder))?;
    recorder.finish().await?;
    Ok(summary)
}

async fn drive(session: &Session, scenario: &Scenario) -> anyhow::Result<()> {
    let rate = session.config().input_audio.sample_rate;
    let chunk = session.config().audio_chunk;
    let mut mux = InputMultiplexer::new(session.clone());

    match scenario {
        Scenario::Text { prompt } => {
            mux.send_text(prompt.as_str(), true).await?;
        }
        Scenario::Tone(args) => {
            mux.send_audio(&tone_bytes(args, rate)).await?;
            mux.end_audio_stream().await?;
        }
        Scenario::Activity(args) => {
            mux.start_activity().await?;
            mux.send_audio(&tone_bytes(args, rate)).await?;
            mux.end_activity().await?;
        }
        Scenario::Stream {
            chunks,
            turn_complete,
            tone,
        } => {
            let quiet = samples_to_pcm_bytes(&silence(chunk, rate));
            let mut pace = tokio::time::interval(chunk);
            for n in 0..*chunks {
                pace.tick().await;
                mux.stream_audio(&quiet).await?;
                debug!(chunk = n + 1, of = chunks, "Sent silence.");
            }
            mux.send_audio(&tone_bytes(tone, rate)).await?;
            if *turn_complete {
                mux.send_text("", true).await?;
            } else {
                mux.end_audio_stream().await?;
            }
        }
        Scenario::AudioThenText { tone, question } => {
            mux.send_audio(&tone_bytes(tone, rate)).await?;
            mux.send_text(question.as_str(), true).await?;
        }
        Scenario::File { path, rate: file_rate } => {
            let raw = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let samples = convert_i16_to_f32(&pcm_bytes_to_samples(&raw));
            let resampled = resample(&samples, *file_rate, rate)
                .with_context(|| format!("Failed to resample {file_rate} Hz audio to {rate} Hz"))?;
            let pcm = samples_to_pcm_bytes(&convert_f32_to_i16(&resampled));
            info!(bytes = pcm.len(), file_rate, rate, "Sending audio file.");
            mux.send_audio(&pcm).await?;
            mux.end_audio_stream().await?;
        }
    }
    debug!("Input finished.");
    Ok(())
}

fn tone_bytes(args: &ToneArgs, rate: u32) -> Vec<u8> {
    samples_to_pcm_bytes(&tone(args.frequency, args.duration(), rate, args.amplitude))
}

async fn watch(session: &Session, recorder: &mut AudioRecorder) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    let mut events = session.events();

    while let Some(item) = events.next().await {
        let event = match item? {
            Received::Event(event) => event,
            Received::Timeout => {
                warn!("No frame within the read timeout.");
                summary.timed_out = true;
                break;
            }
        };
        summary.record(&event);

        match &event {
            InboundEvent::TextFragment { text } => info!(text = %preview(text), "Text."),
            InboundEvent::AudioFragment { pcm, mime } => {
                debug!(bytes = pcm.len(), %mime, "Audio.");
                recorder.write(pcm).await?;
            }
            InboundEvent::InputTranscription { text } => info!(%text, "Heard."),
            InboundEvent::OutputTranscription { text } => info!(%text, "Said."),
            InboundEvent::ToolCallRequest { call_id, name, args } => {
                info!(%call_id, %name, %args, "Tool call (no tools are served by the probe).")
            }
            InboundEvent::ToolCallCancelled { call_ids } => {
                info!(?call_ids, "Tool calls cancelled.")
            }
            InboundEvent::ProtocolError { code, message } => {
                error!(?code, %message, "Remote error.")
            }
            InboundEvent::Interrupted => info!("Interrupted."),
            InboundEvent::GenerationComplete => debug!("Generation complete."),
            InboundEvent::SetupAck => {}
            InboundEvent::TurnComplete { turn } => {
                info!(
                    fragments = turn.fragments,
                    text = %preview(&turn.text),
                    audio_bytes = turn.audio.len(),
                    "Turn complete."
                );
                break;
            }
        }
    }
    Ok(summary)
}

fn preview(text: &str) -> String {
    const LIMIT: usize = 100;
    match text.char_indices().nth(LIMIT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
