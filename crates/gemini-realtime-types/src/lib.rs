//! Wire envelope for the Gemini Live `BidiGenerateContent` protocol.
//!
//! Every frame exchanged over the duplex connection is a JSON object keyed by
//! exactly one message kind (`setup`, `clientContent`, ... on the way out,
//! `setupComplete`, `serverContent`, ... on the way back). These types only
//! describe the shape; validation and state live in `gemini-realtime`.
//!
//! Optional fields are never serialized when unset, and unknown inbound
//! fields are ignored so newer servers stay readable.

pub mod client;
pub mod common;
pub mod server;

pub use client::{
    ActivityEnd, ActivityStart, AudioTranscriptionConfig, AutomaticActivityDetection,
    ClientContent, ClientMessage, FunctionDeclaration, FunctionResponse, GenerationConfig,
    PrebuiltVoiceConfig, RealtimeInput, RealtimeInputConfig, ResponseModality, Setup,
    SpeechConfig, Tool, ToolResponse, VoiceConfig,
};
pub use common::{Blob, Content, Part};
pub use server::{
    ErrorBody, FunctionCall, ServerContent, ServerMessage, SetupComplete, ToolCall,
    ToolCallCancellation, Transcription,
};
