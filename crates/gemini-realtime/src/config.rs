//! Per-session configuration.

use gemini_realtime_types::{
    AudioTranscriptionConfig, AutomaticActivityDetection, Content, FunctionDeclaration,
    GenerationConfig, PrebuiltVoiceConfig, RealtimeInputConfig, ResponseModality, Setup,
    SpeechConfig, Tool, VoiceConfig,
};
use std::time::Duration;

/// Input sample rate the Live API expects for raw PCM.
pub const DEFAULT_INPUT_SAMPLE_RATE: u32 = 16_000;
/// Sample rate of audio produced by the Live API.
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_AUDIO_CHUNK: Duration = Duration::from_millis(100);

/// Raw PCM layout accepted on the input side: signed 16-bit little-endian,
/// mono, at `sample_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
}

impl AudioFormat {
    pub const BYTES_PER_SAMPLE: usize = 2;

    pub fn pcm16(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// MIME type announced for every chunk, e.g. `audio/pcm;rate=16000`.
    pub fn mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.sample_rate)
    }

    /// Number of bytes covering `duration`, rounded down to whole samples.
    pub fn bytes_for(&self, duration: Duration) -> usize {
        let samples = u128::from(self.sample_rate) * duration.as_micros() / 1_000_000;
        samples as usize * Self::BYTES_PER_SAMPLE
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::pcm16(DEFAULT_INPUT_SAMPLE_RATE)
    }
}

/// How user speech is delimited inside the audio stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActivityDetection {
    /// The remote infers speech boundaries; the client may only signal
    /// `audioStreamEnd`.
    #[default]
    Automatic,
    /// The client brackets speech with `activityStart`/`activityEnd`.
    Manual,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub model: String,
    pub response_modalities: Vec<ResponseModality>,
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    pub activity_detection: ActivityDetection,
    pub tools: Vec<FunctionDeclaration>,
    pub input_transcription: bool,
    pub output_transcription: bool,
    pub input_audio: AudioFormat,
    pub handshake_timeout: Duration,
    /// `None` waits for the next frame indefinitely.
    pub read_timeout: Option<Duration>,
    pub audio_chunk: Duration,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            response_modalities: vec![ResponseModality::Audio],
            voice: None,
            system_instruction: None,
            activity_detection: ActivityDetection::Automatic,
            tools: Vec::new(),
            input_transcription: false,
            output_transcription: false,
            input_audio: AudioFormat::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            audio_chunk: DEFAULT_AUDIO_CHUNK,
        }
    }

    pub fn with_response_modalities(mut self, modalities: Vec<ResponseModality>) -> Self {
        self.response_modalities = modalities;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_activity_detection(mut self, mode: ActivityDetection) -> Self {
        self.activity_detection = mode;
        self
    }

    pub fn with_tool(mut self, declaration: FunctionDeclaration) -> Self {
        self.tools.push(declaration);
        self
    }

    pub fn with_transcription(mut self, input: bool, output: bool) -> Self {
        self.input_transcription = input;
        self.output_transcription = output;
        self
    }

    pub fn with_input_audio(mut self, format: AudioFormat) -> Self {
        self.input_audio = format;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_audio_chunk(mut self, chunk: Duration) -> Self {
        self.audio_chunk = chunk;
        self
    }

    /// Model resource name as the wire expects it (`models/...`).
    pub fn model_resource(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Builds the `setup` payload sent as the first frame of the session.
    /// Only configured options appear on the wire.
    pub fn setup_message(&self) -> Setup {
        let speech_config = self.voice.as_ref().map(|voice| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: voice.clone(),
                },
            },
        });
        let generation_config = if self.response_modalities.is_empty() && speech_config.is_none()
        {
            None
        } else {
            Some(GenerationConfig {
                response_modalities: (!self.response_modalities.is_empty())
                    .then(|| self.response_modalities.clone()),
                speech_config,
            })
        };
        let realtime_input_config = match self.activity_detection {
            ActivityDetection::Automatic => None,
            ActivityDetection::Manual => Some(RealtimeInputConfig {
                automatic_activity_detection: Some(AutomaticActivityDetection {
                    disabled: Some(true),
                }),
            }),
        };

        Setup {
            model: self.model_resource(),
            generation_config,
            system_instruction: self
                .system_instruction
                .as_ref()
                .map(|text| Content::text(None, text.clone())),
            realtime_input_config,
            tools: (!self.tools.is_empty()).then(|| {
                vec![Tool {
                    function_declarations: self.tools.clone(),
                }]
            }),
            input_audio_transcription: self
                .input_transcription
                .then(AudioTranscriptionConfig::default),
            output_audio_transcription: self
                .output_transcription
                .then(AudioTranscriptionConfig::default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bytes_for_covers_whole_samples() {
        let format = AudioFormat::default();
        assert_eq!(format.bytes_for(Duration::from_millis(100)), 3_200);
        assert_eq!(format.bytes_for(Duration::from_millis(500)), 16_000);
        assert_eq!(AudioFormat::pcm16(8_000).bytes_for(Duration::from_millis(100)), 1_600);
        assert_eq!(format.mime_type(), "audio/pcm;rate=16000");
    }

    #[test]
    fn model_resource_adds_prefix_once() {
        assert_eq!(SessionConfig::new("gemini-x").model_resource(), "models/gemini-x");
        assert_eq!(SessionConfig::new("models/gemini-x").model_resource(), "models/gemini-x");
    }

    #[test]
    fn minimal_setup_only_carries_configured_fields() {
        let setup = SessionConfig::new("gemini-x")
            .with_response_modalities(vec![])
            .setup_message();
        assert_eq!(
            serde_json::to_value(&setup).unwrap(),
            json!({ "model": "models/gemini-x" })
        );
    }

    #[test]
    fn manual_activity_disables_automatic_detection() {
        let setup = SessionConfig::new("gemini-x")
            .with_voice("Puck")
            .with_system_instruction("Say hello.")
            .with_activity_detection(ActivityDetection::Manual)
            .with_transcription(true, false)
            .setup_message();
        assert_eq!(
            serde_json::to_value(&setup).unwrap(),
            json!({
                "model": "models/gemini-x",
                "generationConfig": {
                    "responseModalities": ["AUDIO"],
                    "speechConfig": { "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Puck" } } }
                },
                "systemInstruction": { "parts": [{ "text": "Say hello." }] },
                "realtimeInputConfig": { "automaticActivityDetection": { "disabled": true } },
                "inputAudioTranscription": {}
            })
        );
    }
}
