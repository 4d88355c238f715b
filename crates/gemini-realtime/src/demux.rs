//! Splits decoded server frames into typed events and assembles model turns.

use crate::{
    codec,
    event::{InboundEvent, ModelTurn},
};
use gemini_realtime_types::{Part, ServerMessage};
use serde_json::Value;
use tracing::{debug, trace};

/// Holds the fragments of the model turn in progress. Every fragment is
/// emitted as its own event as well; the assembled turn rides on
/// [`InboundEvent::TurnComplete`].
#[derive(Debug, Default)]
pub struct Demultiplexer {
    pending: ModelTurn,
}

impl Demultiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments received since the last turn completion or interruption.
    pub fn pending(&self) -> &ModelTurn {
        &self.pending
    }

    /// Maps one server frame to events, in this order: setup ack,
    /// interruption, input transcription, model parts, output transcription,
    /// generation complete, turn complete, tool calls, cancellations, error.
    pub fn process(&mut self, message: ServerMessage) -> Vec<InboundEvent> {
        let mut events = Vec::new();

        if message.setup_complete.is_some() {
            events.push(InboundEvent::SetupAck);
        }

        if let Some(content) = message.server_content {
            if content.interrupted == Some(true) {
                if !self.pending.is_empty() {
                    debug!(
                        fragments = self.pending.fragments,
                        "Discarding interrupted model turn."
                    );
                }
                self.pending = ModelTurn::default();
                events.push(InboundEvent::Interrupted);
            }
            if let Some(transcription) = content.input_transcription {
                events.push(InboundEvent::InputTranscription {
                    text: transcription.text,
                });
            }
            if let Some(turn) = content.model_turn {
                for part in turn.parts {
                    self.route_part(part, &mut events);
                }
            }
            if let Some(transcription) = content.output_transcription {
                events.push(InboundEvent::OutputTranscription {
                    text: transcription.text,
                });
            }
            if content.generation_complete == Some(true) {
                events.push(InboundEvent::GenerationComplete);
            }
            if content.turn_complete == Some(true) {
                let turn = std::mem::take(&mut self.pending);
                trace!(fragments = turn.fragments, "Model turn complete.");
                events.push(InboundEvent::TurnComplete { turn });
            }
        }

        if let Some(call) = message.tool_call {
            for function in call.function_calls {
                events.push(InboundEvent::ToolCallRequest {
                    call_id: function.id,
                    name: function.name,
                    args: function.args.unwrap_or(Value::Object(Default::default())),
                });
            }
        }

        if let Some(cancellation) = message.tool_call_cancellation {
            events.push(InboundEvent::ToolCallCancelled {
                call_ids: cancellation.ids,
            });
        }

        if let Some(error) = message.error {
            let message = match error.status {
                Some(status) if !error.message.is_empty() => format!("{status}: {}", error.message),
                Some(status) => status,
                None => error.message,
            };
            events.push(InboundEvent::ProtocolError {
                code: error.code,
                message,
            });
        }

        events
    }

    fn route_part(&mut self, part: Part, events: &mut Vec<InboundEvent>) {
        if let Some(text) = part.text {
            self.pending.text.push_str(&text);
            self.pending.fragments += 1;
            events.push(InboundEvent::TextFragment { text });
        }
        if let Some(blob) = part.inline_data {
            match codec::decode_pcm(&blob.data) {
                Ok(pcm) => {
                    self.pending.audio.extend_from_slice(&pcm);
                    self.pending.fragments += 1;
                    if self.pending.audio_mime.is_none() {
                        self.pending.audio_mime = Some(blob.mime_type.clone());
                    }
                    events.push(InboundEvent::AudioFragment {
                        pcm,
                        mime: blob.mime_type,
                    });
                }
                Err(err) => events.push(InboundEvent::ProtocolError {
                    code: None,
                    message: format!("undecodable {} payload: {err}", blob.mime_type),
                }),
            }
        }
    }
}
