//! Session state machine.
//!
//! `Connecting → AwaitingSetupAck → Open ⇄ Streaming → Closing → Closed`,
//! with `Failed` absorbing. The machine is synchronous and owned by the
//! session behind a single mutex, so outbound and inbound transitions are
//! serialized.

use crate::{
    config::ActivityDetection, error::SessionError, event::InboundEvent, unit::OutboundUnit,
};
use std::{collections::HashMap, fmt};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    AwaitingSetupAck,
    Open,
    Streaming,
    Closing,
    Closed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }

    /// Whether caller input may be sent at all in this state.
    pub fn accepts_input(self) -> bool {
        matches!(self, SessionState::Open | SessionState::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::AwaitingSetupAck => "awaiting-setup-ack",
            SessionState::Open => "open",
            SessionState::Streaming => "streaming",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct StateMachine {
    state: SessionState,
    activity: ActivityDetection,
    activity_open: bool,
    /// Automatic detection only: audio was sent and `audioStreamEnd` has not
    /// closed the stream yet.
    audio_stream_open: bool,
    /// The user turn was closed by a final text turn or `audioStreamEnd`;
    /// input resumes after the remote's `TurnComplete`.
    turn_submitted: bool,
    /// Outstanding tool calls, `call_id → function name`.
    tool_calls: HashMap<String, String>,
}

impl StateMachine {
    pub fn new(activity: ActivityDetection) -> Self {
        Self {
            state: SessionState::Connecting,
            activity,
            activity_open: false,
            audio_stream_open: false,
            turn_submitted: false,
            tool_calls: HashMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn activity_open(&self) -> bool {
        self.activity_open
    }

    pub fn audio_stream_open(&self) -> bool {
        self.audio_stream_open
    }

    pub fn turn_submitted(&self) -> bool {
        self.turn_submitted
    }

    pub fn has_tool_call(&self, call_id: &str) -> bool {
        self.tool_calls.contains_key(call_id)
    }

    /// Checks `unit` against the current state without changing anything.
    pub fn check_send(&self, unit: &OutboundUnit) -> Result<(), SessionError> {
        match self.state {
            SessionState::Closing | SessionState::Closed => return Err(SessionError::SessionClosed),
            SessionState::Failed => return Err(SessionError::SessionFailed),
            _ => {}
        }
        let invalid = |reason| {
            Err(SessionError::InvalidStateTransition {
                state: self.state,
                unit: unit.kind(),
                reason,
            })
        };

        if let OutboundUnit::Setup(_) = unit {
            return if self.state == SessionState::Connecting {
                Ok(())
            } else {
                invalid("setup was already sent")
            };
        }
        if !self.state.accepts_input() {
            return invalid("setup has not been acknowledged");
        }

        let manual = self.activity == ActivityDetection::Manual;
        match unit {
            OutboundUnit::Setup(_) => Ok(()),
            OutboundUnit::TextTurn { .. } if self.turn_submitted => {
                invalid("turn already submitted; wait for turn completion")
            }
            OutboundUnit::TextTurn { .. } => Ok(()),
            OutboundUnit::AudioChunk { .. } if self.turn_submitted => {
                invalid("turn already submitted; wait for turn completion")
            }
            OutboundUnit::AudioChunk { .. } if manual && !self.activity_open => {
                invalid("manual activity detection requires activityStart before audio")
            }
            OutboundUnit::AudioChunk { .. } => Ok(()),
            OutboundUnit::AudioStreamEnd if manual => {
                invalid("audioStreamEnd requires automatic activity detection")
            }
            OutboundUnit::AudioStreamEnd if self.turn_submitted => {
                invalid("turn already submitted; wait for turn completion")
            }
            OutboundUnit::AudioStreamEnd if !self.audio_stream_open => {
                invalid("no audio stream in progress")
            }
            OutboundUnit::AudioStreamEnd => Ok(()),
            OutboundUnit::ActivityStart | OutboundUnit::ActivityEnd if !manual => {
                invalid("activity markers require manual activity detection")
            }
            OutboundUnit::ActivityStart if self.activity_open => {
                invalid("activity already started")
            }
            OutboundUnit::ActivityStart if self.turn_submitted => {
                invalid("turn already submitted; wait for turn completion")
            }
            OutboundUnit::ActivityStart => Ok(()),
            OutboundUnit::ActivityEnd if !self.activity_open => invalid("no activity in progress"),
            OutboundUnit::ActivityEnd => Ok(()),
            OutboundUnit::ToolResponse { call_id, .. } if !self.has_tool_call(call_id) => {
                invalid("no outstanding tool call with this id")
            }
            OutboundUnit::ToolResponse { .. } => Ok(()),
        }
    }

    /// Validates `unit` and applies its transition. Returns the new state.
    pub fn apply_send(&mut self, unit: &OutboundUnit) -> Result<SessionState, SessionError> {
        self.check_send(unit)?;
        match unit {
            OutboundUnit::Setup(_) => self.state = SessionState::AwaitingSetupAck,
            OutboundUnit::TextTurn { is_final, .. } => {
                self.state = SessionState::Streaming;
                self.turn_submitted = *is_final;
            }
            OutboundUnit::AudioChunk { .. } => {
                self.audio_stream_open = self.activity == ActivityDetection::Automatic;
                self.state = SessionState::Streaming;
            }
            OutboundUnit::AudioStreamEnd => {
                self.audio_stream_open = false;
                self.turn_submitted = true;
            }
            OutboundUnit::ActivityStart => {
                self.activity_open = true;
                self.state = SessionState::Streaming;
            }
            OutboundUnit::ActivityEnd => self.activity_open = false,
            OutboundUnit::ToolResponse { call_id, .. } => {
                self.tool_calls.remove(call_id);
            }
        }
        Ok(self.state)
    }

    /// Applies an inbound event. Returns the new state.
    pub fn apply_event(&mut self, event: &InboundEvent) -> SessionState {
        match self.state {
            SessionState::AwaitingSetupAck => match event {
                InboundEvent::SetupAck => self.state = SessionState::Open,
                other => {
                    warn!(event = other.kind(), "Unexpected event before setupComplete.");
                    self.state = SessionState::Failed;
                }
            },
            SessionState::Open | SessionState::Streaming => match event {
                InboundEvent::TurnComplete { .. } => {
                    self.turn_submitted = false;
                    self.state = if self.activity_open || self.audio_stream_open {
                        SessionState::Streaming
                    } else {
                        SessionState::Open
                    };
                }
                InboundEvent::ToolCallRequest { call_id, name, .. } => {
                    self.tool_calls.insert(call_id.clone(), name.clone());
                }
                InboundEvent::ToolCallCancelled { call_ids } => {
                    for id in call_ids {
                        self.tool_calls.remove(id);
                    }
                }
                InboundEvent::SetupAck => debug!("Ignoring repeated setupComplete."),
                _ => {}
            },
            _ => {}
        }
        self.state
    }

    pub fn begin_closing(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Closing;
        }
    }

    pub fn finish_closing(&mut self) {
        if self.state != SessionState::Failed {
            self.state = SessionState::Closed;
        }
    }

    pub fn fail(&mut self) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Failed;
        }
    }
}
