//! Typed outbound units: everything a caller can put on the wire.

use crate::config::AudioFormat;
use bytes::Bytes;
use gemini_realtime_types::Setup;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "user" => Some(Role::User),
            "model" => Some(Role::Model),
            _ => None,
        }
    }
}

/// One message the client sends. Consumed by the codec and not retained.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundUnit {
    /// Session configuration. Sent exactly once, by [`crate::Session::open`].
    Setup(Setup),
    /// A text turn. `is_final` marks the user turn complete. An empty user
    /// turn is sent as a bare turn-complete signal.
    TextTurn {
        role: Role,
        text: String,
        is_final: bool,
    },
    /// Raw PCM16 LE mono audio.
    AudioChunk {
        pcm: Bytes,
        sample_rate: u32,
        mime: String,
    },
    AudioStreamEnd,
    ActivityStart,
    ActivityEnd,
    ToolResponse {
        call_id: String,
        name: String,
        result: Value,
    },
}

impl OutboundUnit {
    /// A final user text turn.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::TextTurn {
            role: Role::User,
            text: text.into(),
            is_final: true,
        }
    }

    /// An audio chunk labelled with `format`.
    pub fn audio(pcm: impl Into<Bytes>, format: &AudioFormat) -> Self {
        Self::AudioChunk {
            pcm: pcm.into(),
            sample_rate: format.sample_rate,
            mime: format.mime_type(),
        }
    }

    /// Short name used in logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundUnit::Setup(_) => "setup",
            OutboundUnit::TextTurn { .. } => "textTurn",
            OutboundUnit::AudioChunk { .. } => "audioChunk",
            OutboundUnit::AudioStreamEnd => "audioStreamEnd",
            OutboundUnit::ActivityStart => "activityStart",
            OutboundUnit::ActivityEnd => "activityEnd",
            OutboundUnit::ToolResponse { .. } => "toolResponse",
        }
    }
}
