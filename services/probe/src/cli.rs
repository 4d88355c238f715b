//! Command line surface of the probe.

use crate::config::ProbeConfig;
use clap::{Args, Parser, Subcommand};
use gemini_realtime::{ActivityDetection, SessionConfig, types::ResponseModality};
use std::{path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "probe", version, about = "Exercise a Gemini Live session from the command line")]
pub struct Cli {
    /// Model to use instead of GEMINI_LIVE_MODEL.
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Prebuilt voice instead of GEMINI_LIVE_VOICE.
    #[arg(long, global = true)]
    pub voice: Option<String>,

    #[arg(long, global = true)]
    pub system_instruction: Option<String>,

    /// Ask for text replies instead of audio.
    #[arg(long, global = true)]
    pub text_output: bool,

    /// Request transcriptions of both the input and the reply audio.
    #[arg(long, global = true)]
    pub transcribe: bool,

    /// Append received audio (raw PCM16, 24 kHz mono) to this file.
    #[arg(long, global = true)]
    pub save_audio: Option<PathBuf>,

    #[command(subcommand)]
    pub scenario: Scenario,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Scenario {
    /// One user text turn.
    Text {
        #[arg(default_value = "Hello! Please say hi back in one short sentence.")]
        prompt: String,
    },
    /// A sine tone followed by audioStreamEnd.
    Tone(ToneArgs),
    /// A tone bracketed by activityStart/activityEnd (manual detection).
    Activity(ToneArgs),
    /// Silence paced in real time, then a tone and audioStreamEnd.
    Stream {
        /// Number of silent chunks sent before the tone.
        #[arg(long, default_value_t = 20)]
        chunks: u32,
        /// End with a bare clientContent turnComplete instead of audioStreamEnd.
        #[arg(long)]
        turn_complete: bool,
        #[command(flatten)]
        tone: ToneArgs,
    },
    /// A tone, then a text turn asking about it.
    AudioThenText {
        #[command(flatten)]
        tone: ToneArgs,
        #[arg(long, default_value = "What sound did you just hear?")]
        question: String,
    },
    /// Raw PCM16 LE mono from a file, resampled to the session rate.
    File {
        path: PathBuf,
        /// Sample rate of the file.
        #[arg(long, default_value_t = 16_000)]
        rate: u32,
    },
}

#[derive(Args, Debug, Clone, Copy, PartialEq)]
pub struct ToneArgs {
    #[arg(long, default_value_t = 440.0)]
    pub frequency: f32,
    #[arg(long, default_value_t = 500)]
    pub duration_ms: u64,
    #[arg(long, default_value_t = 0.5)]
    pub amplitude: f32,
}

impl ToneArgs {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for ToneArgs {
    fn default() -> Self {
        Self {
            frequency: 440.0,
            duration_ms: 500,
            amplitude: 0.5,
        }
    }
}

impl Scenario {
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Text { .. } => "text",
            Scenario::Tone(_) => "tone",
            Scenario::Activity(_) => "activity",
            Scenario::Stream { .. } => "stream",
            Scenario::AudioThenText { .. } => "audio-then-text",
            Scenario::File { .. } => "file",
        }
    }

    pub fn activity_detection(&self) -> ActivityDetection {
        match self {
            Scenario::Activity(_) => ActivityDetection::Manual,
            _ => ActivityDetection::Automatic,
        }
    }
}

impl Cli {
    /// Session settings from the environment, overridden by flags.
    pub fn session_config(&self, probe: &ProbeConfig) -> SessionConfig {
        let model = self.model.clone().unwrap_or_else(|| probe.model.clone());
        let mut config = SessionConfig::new(model)
            .with_activity_detection(self.scenario.activity_detection())
            .with_handshake_timeout(probe.handshake_timeout)
            .with_read_timeout(Some(probe.read_timeout))
            .with_transcription(self.transcribe, self.transcribe);

        if self.text_output {
            config = config.with_response_modalities(vec![ResponseModality::Text]);
        } else {
            let voice = self.voice.clone().unwrap_or_else(|| probe.voice.clone());
            config = config.with_voice(voice);
        }
        if let Some(instruction) = &self.system_instruction {
            config = config.with_system_instruction(instruction.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use secrecy::SecretString;

    fn probe_config() -> ProbeConfig {
        ProbeConfig {
            api_key: SecretString::from("test-key".to_string()),
            endpoint: "ws://127.0.0.1:9/live".into(),
            model: "env-model".into(),
            voice: "Puck".into(),
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(15),
            log_filter: "info".into(),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_stream_with_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "probe",
            "stream",
            "--chunks",
            "5",
            "--frequency",
            "880",
            "--save-audio",
            "out.pcm",
        ])
        .unwrap();
        assert_eq!(cli.save_audio, Some(PathBuf::from("out.pcm")));
        assert_eq!(
            cli.scenario,
            Scenario::Stream {
                chunks: 5,
                turn_complete: false,
                tone: ToneArgs {
                    frequency: 880.0,
                    ..ToneArgs::default()
                },
            }
        );
    }

    #[test]
    fn stream_can_end_with_turn_complete() {
        let cli = Cli::try_parse_from(["probe", "stream", "--turn-complete"]).unwrap();
        assert!(matches!(
            cli.scenario,
            Scenario::Stream {
                chunks: 20,
                turn_complete: true,
                ..
            }
        ));
    }

    #[test]
    fn text_prompt_has_a_default() {
        let cli = Cli::try_parse_from(["probe", "text"]).unwrap();
        assert!(matches!(cli.scenario, Scenario::Text { ref prompt } if !prompt.is_empty()));
    }

    #[test]
    fn activity_scenario_uses_manual_detection() {
        let cli = Cli::try_parse_from(["probe", "activity"]).unwrap();
        let config = cli.session_config(&probe_config());
        assert_eq!(config.activity_detection, ActivityDetection::Manual);
        assert_eq!(config.model, "env-model");
        assert_eq!(config.voice.as_deref(), Some("Puck"));
    }

    #[test]
    fn flags_override_the_environment() {
        let cli = Cli::try_parse_from([
            "probe",
            "--model",
            "flag-model",
            "--text-output",
            "--transcribe",
            "tone",
        ])
        .unwrap();
        let config = cli.session_config(&probe_config());
        assert_eq!(config.model, "flag-model");
        assert_eq!(config.response_modalities, [ResponseModality::Text]);
        assert!(config.voice.is_none());
        assert!(config.input_transcription && config.output_transcription);
        assert_eq!(config.activity_detection, ActivityDetection::Automatic);
        assert_eq!(config.read_timeout, Some(Duration::from_secs(15)));
    }
}
