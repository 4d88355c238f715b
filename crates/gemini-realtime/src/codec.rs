//! Mapping between typed units and JSON wire frames.
//!
//! Audio travels base64 encoded. Outbound audio must be PCM16 LE mono at the
//! session's input rate and labelled `audio/pcm;rate=<rate>`; anything else
//! is refused before it can reach the wire.

use crate::{
    config::AudioFormat,
    error::CodecError,
    unit::{OutboundUnit, Role},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use gemini_realtime_types::{
    ActivityEnd, ActivityStart, Blob, ClientContent, ClientMessage, Content, FunctionResponse,
    Part, RealtimeInput, ServerMessage, ToolResponse,
};

const PCM_MIME: &str = "audio/pcm";

pub fn encode_outbound(unit: &OutboundUnit, format: &AudioFormat) -> Result<String, CodecError> {
    let message = to_client_message(unit, format)?;
    Ok(serde_json::to_string(&message)?)
}

pub fn decode_outbound(raw: &str) -> Result<OutboundUnit, CodecError> {
    let message: ClientMessage = serde_json::from_str(raw)?;
    from_client_message(message)
}

pub fn encode_inbound(message: &ServerMessage) -> Result<String, CodecError> {
    Ok(serde_json::to_string(message)?)
}

/// Parses one inbound frame payload. Unknown fields are ignored.
pub fn decode_inbound(payload: &[u8]) -> Result<ServerMessage, CodecError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn encode_pcm(pcm: &[u8]) -> String {
    STANDARD.encode(pcm)
}

pub fn decode_pcm(data: &str) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(STANDARD.decode(data)?))
}

pub fn to_client_message(
    unit: &OutboundUnit,
    format: &AudioFormat,
) -> Result<ClientMessage, CodecError> {
    let message = match unit {
        OutboundUnit::Setup(setup) => ClientMessage::Setup(setup.clone()),
        OutboundUnit::TextTurn {
            role,
            text,
            is_final,
        } => {
            let turns = if text.is_empty() && *role == Role::User {
                None
            } else {
                Some(vec![Content::text(Some(role.as_str()), text.clone())])
            };
            ClientMessage::ClientContent(ClientContent {
                turns,
                turn_complete: Some(*is_final),
            })
        }
        OutboundUnit::AudioChunk {
            pcm,
            sample_rate,
            mime,
        } => {
            check_audio(pcm, *sample_rate, mime, format)?;
            ClientMessage::RealtimeInput(RealtimeInput {
                media_chunks: Some(vec![Blob {
                    mime_type: mime.clone(),
                    data: encode_pcm(pcm),
                }]),
                ..Default::default()
            })
        }
        OutboundUnit::AudioStreamEnd => ClientMessage::RealtimeInput(RealtimeInput {
            audio_stream_end: Some(true),
            ..Default::default()
        }),
        OutboundUnit::ActivityStart => ClientMessage::RealtimeInput(RealtimeInput {
            activity_start: Some(ActivityStart {}),
            ..Default::default()
        }),
        OutboundUnit::ActivityEnd => ClientMessage::RealtimeInput(RealtimeInput {
            activity_end: Some(ActivityEnd {}),
            ..Default::default()
        }),
        OutboundUnit::ToolResponse {
            call_id,
            name,
            result,
        } => ClientMessage::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id: call_id.clone(),
                name: name.clone(),
                response: result.clone(),
            }],
        }),
    };
    Ok(message)
}

pub fn from_client_message(message: ClientMessage) -> Result<OutboundUnit, CodecError> {
    match message {
        ClientMessage::Setup(setup) => Ok(OutboundUnit::Setup(setup)),
        ClientMessage::ClientContent(content) => {
            let is_final = content.turn_complete.unwrap_or(false);
            match content.turns.as_deref() {
                None | Some([]) => Ok(OutboundUnit::TextTurn {
                    role: Role::User,
                    text: String::new(),
                    is_final,
                }),
                Some([turn]) => {
                    let role = turn
                        .role
                        .as_deref()
                        .and_then(Role::parse)
                        .ok_or(CodecError::Unrecognised("clientContent role"))?;
                    match turn.parts.as_slice() {
                        [Part {
                            text: Some(text),
                            inline_data: None,
                        }] => Ok(OutboundUnit::TextTurn {
                            role,
                            text: text.clone(),
                            is_final,
                        }),
                        _ => Err(CodecError::Unrecognised("clientContent parts")),
                    }
                }
                Some(_) => Err(CodecError::Unrecognised("clientContent with several turns")),
            }
        }
        ClientMessage::RealtimeInput(input) => match input {
            RealtimeInput {
                media_chunks: Some(chunks),
                audio_stream_end: None,
                activity_start: None,
                activity_end: None,
            } => {
                let [blob] = chunks.as_slice() else {
                    return Err(CodecError::Unrecognised("mediaChunks must hold one chunk"));
                };
                let sample_rate = mime_rate(&blob.mime_type)
                    .ok_or(CodecError::Unrecognised("mediaChunks mime without rate"))?;
                Ok(OutboundUnit::AudioChunk {
                    pcm: decode_pcm(&blob.data)?,
                    sample_rate,
                    mime: blob.mime_type.clone(),
                })
            }
            RealtimeInput {
                media_chunks: None,
                audio_stream_end: Some(true),
                activity_start: None,
                activity_end: None,
            } => Ok(OutboundUnit::AudioStreamEnd),
            RealtimeInput {
                media_chunks: None,
                audio_stream_end: None,
                activity_start: Some(_),
                activity_end: None,
            } => Ok(OutboundUnit::ActivityStart),
            RealtimeInput {
                media_chunks: None,
                audio_stream_end: None,
                activity_start: None,
                activity_end: Some(_),
            } => Ok(OutboundUnit::ActivityEnd),
            _ => Err(CodecError::Unrecognised("realtimeInput")),
        },
        ClientMessage::ToolResponse(response) => match response.function_responses.as_slice() {
            [reply] => Ok(OutboundUnit::ToolResponse {
                call_id: reply.id.clone(),
                name: reply.name.clone(),
                result: reply.response.clone(),
            }),
            _ => Err(CodecError::Unrecognised("toolResponse must hold one response")),
        },
    }
}

fn check_audio(
    pcm: &[u8],
    sample_rate: u32,
    mime: &str,
    format: &AudioFormat,
) -> Result<(), CodecError> {
    let unsupported = |found: String| CodecError::UnsupportedAudioFormat {
        expected: format.mime_type(),
        found,
    };

    if sample_rate != format.sample_rate {
        return Err(unsupported(format!("{PCM_MIME};rate={sample_rate}")));
    }
    let base = mime.split(';').next().unwrap_or_default().trim();
    if !base.eq_ignore_ascii_case(PCM_MIME) || mime_rate(mime) != Some(sample_rate) {
        return Err(unsupported(mime.to_string()));
    }
    if pcm.len() % AudioFormat::BYTES_PER_SAMPLE != 0 {
        return Err(unsupported(format!(
            "{} bytes, not whole 16-bit samples",
            pcm.len()
        )));
    }
    Ok(())
}

/// The `rate=` parameter of a PCM MIME type.
pub fn mime_rate(mime: &str) -> Option<u32> {
    mime.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("rate")
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}
