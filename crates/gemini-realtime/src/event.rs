//! Typed inbound events produced by the demultiplexer.

use bytes::Bytes;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    SetupAck,
    TextFragment {
        text: String,
    },
    AudioFragment {
        pcm: Bytes,
        mime: String,
    },
    ToolCallRequest {
        call_id: String,
        name: String,
        args: Value,
    },
    ToolCallCancelled {
        call_ids: Vec<String>,
    },
    /// Transcript of the user's audio, when enabled in the setup.
    InputTranscription {
        text: String,
    },
    /// Transcript of the model's audio, when enabled in the setup.
    OutputTranscription {
        text: String,
    },
    /// The model finished generating; playback of the turn may continue.
    GenerationComplete,
    /// Closes the pending model turn. `turn` holds only what arrived after
    /// the last interruption.
    TurnComplete {
        turn: ModelTurn,
    },
    /// The remote dropped the turn in progress because the user started
    /// speaking.
    Interrupted,
    ProtocolError {
        code: Option<i32>,
        message: String,
    },
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::SetupAck => "setupAck",
            InboundEvent::TextFragment { .. } => "textFragment",
            InboundEvent::AudioFragment { .. } => "audioFragment",
            InboundEvent::ToolCallRequest { .. } => "toolCallRequest",
            InboundEvent::ToolCallCancelled { .. } => "toolCallCancelled",
            InboundEvent::InputTranscription { .. } => "inputTranscription",
            InboundEvent::OutputTranscription { .. } => "outputTranscription",
            InboundEvent::GenerationComplete => "generationComplete",
            InboundEvent::TurnComplete { .. } => "turnComplete",
            InboundEvent::Interrupted => "interrupted",
            InboundEvent::ProtocolError { .. } => "protocolError",
        }
    }
}

/// The fragments of one model turn, assembled in arrival order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelTurn {
    pub text: String,
    pub audio: Vec<u8>,
    pub audio_mime: Option<String>,
    pub fragments: usize,
}

impl ModelTurn {
    pub fn is_empty(&self) -> bool {
        self.fragments == 0
    }
}

/// One item of the session's event sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Event(InboundEvent),
    /// The read timeout elapsed without a frame. Whether silence is fine is
    /// up to the caller.
    Timeout,
}
