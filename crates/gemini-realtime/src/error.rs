use crate::state::SessionState;
use std::time::Duration;
use thiserror::Error;

/// Failures of the duplex connection itself.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    Refused(String),

    #[error("invalid connection request: {0}")]
    InvalidRequest(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("connection is closed")]
    Closed,
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Failures mapping between typed units and wire frames.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported audio format: expected {expected}, found {found}")]
    UnsupportedAudioFormat { expected: String, found: String },

    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("frame does not map to a single unit: {0}")]
    Unrecognised(&'static str),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential variable {0} is not set")]
    MissingVar(String),

    #[error("credential variable {0} is empty")]
    Empty(String),
}

/// Everything a [`crate::Session`] operation can fail with.
///
/// Remote-reported errors, interruptions and read timeouts are not here:
/// they arrive as ordinary events.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no setupComplete within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("setup rejected by remote (code {code:?}): {message}")]
    HandshakeRejected { code: Option<i32>, message: String },

    #[error("cannot send {unit} while {state}: {reason}")]
    InvalidStateTransition {
        state: SessionState,
        unit: &'static str,
        reason: &'static str,
    },

    #[error("failed to connect: {0}")]
    ConnectFailed(#[source] TransportError),

    #[error("failed to send {unit} while {state}: {source}")]
    SendFailed {
        state: SessionState,
        unit: &'static str,
        source: TransportError,
    },

    #[error("transport lost while {state} (last frame: {last_frame}): {source}")]
    TransportLost {
        state: SessionState,
        last_frame: &'static str,
        source: TransportError,
    },

    #[error("unsupported audio format: expected {expected}, found {found}")]
    UnsupportedAudioFormat { expected: String, found: String },

    #[error("codec error: {0}")]
    Codec(#[source] CodecError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("session is closed")]
    SessionClosed,

    #[error("session has failed")]
    SessionFailed,

    #[error("input multiplexer halted after an earlier send failure")]
    InputHalted,
}

impl From<CodecError> for SessionError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnsupportedAudioFormat { expected, found } => {
                Self::UnsupportedAudioFormat { expected, found }
            }
            other => Self::Codec(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_audio_errors_surface_as_their_own_variant() {
        let err: SessionError = CodecError::UnsupportedAudioFormat {
            expected: "audio/pcm;rate=16000".into(),
            found: "audio/pcm;rate=8000".into(),
        }
        .into();
        assert!(matches!(err, SessionError::UnsupportedAudioFormat { .. }));
        assert_eq!(
            err.to_string(),
            "unsupported audio format: expected audio/pcm;rate=16000, found audio/pcm;rate=8000"
        );
    }

    #[test]
    fn invalid_transition_names_state_and_unit() {
        let err = SessionError::InvalidStateTransition {
            state: SessionState::AwaitingSetupAck,
            unit: "textTurn",
            reason: "setup has not been acknowledged",
        };
        assert_eq!(
            err.to_string(),
            "cannot send textTurn while awaiting-setup-ack: setup has not been acknowledged"
        );
    }
}
