//! Input multiplexer: turns caller text, audio and tool results into
//! outbound units on one session.
//!
//! Audio is cut into fixed-duration frames before it is sent. Buffered audio
//! is always flushed before a text turn or an end-of-input marker, so the
//! remote sees inputs in the order the caller produced them.

use crate::{
    config::AudioFormat,
    error::SessionError,
    session::Session,
    unit::{OutboundUnit, Role},
};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tracing::{debug, warn};

/// Accumulates PCM bytes and yields frames of exactly `frame_bytes`.
#[derive(Debug)]
pub struct AudioChunker {
    frame_bytes: usize,
    buffer: BytesMut,
}

impl AudioChunker {
    /// `frame_bytes` is rounded down to whole samples, and at least one.
    pub fn new(frame_bytes: usize) -> Self {
        let sample = AudioFormat::BYTES_PER_SAMPLE;
        let frame_bytes = (frame_bytes / sample).max(1) * sample;
        Self {
            frame_bytes,
            buffer: BytesMut::with_capacity(frame_bytes),
        }
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Appends `pcm` and returns every complete frame now available.
    pub fn push(&mut self, pcm: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(pcm);
        let mut frames = Vec::with_capacity(self.buffer.len() / self.frame_bytes);
        while self.buffer.len() >= self.frame_bytes {
            frames.push(self.buffer.split_to(self.frame_bytes).freeze());
        }
        frames
    }

    /// Takes whatever is buffered, shorter than a frame.
    pub fn finish(&mut self) -> Option<Bytes> {
        (!self.buffer.is_empty()).then(|| self.buffer.split().freeze())
    }
}

pub struct InputMultiplexer {
    session: Session,
    chunker: AudioChunker,
    format: AudioFormat,
    halted: bool,
}

impl InputMultiplexer {
    /// Chunks audio at the session's configured input format and chunk
    /// duration.
    pub fn new(session: Session) -> Self {
        let config = session.config();
        let format = config.input_audio;
        let chunker = AudioChunker::new(format.bytes_for(config.audio_chunk));
        Self {
            session,
            chunker,
            format,
            halted: false,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Set once any send has failed. Further input is refused with
    /// [`SessionError::InputHalted`].
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Sends a user text turn after flushing buffered audio. With
    /// `turn_complete` the remote starts generating.
    pub async fn send_text(
        &mut self,
        text: impl Into<String>,
        turn_complete: bool,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.flush_audio().await?;
        self.dispatch(OutboundUnit::TextTurn {
            role: Role::User,
            text: text.into(),
            is_final: turn_complete,
        })
        .await
    }

    /// Buffers `pcm` and sends every complete frame. A trailing partial frame
    /// stays buffered for the next call.
    pub async fn stream_audio(&mut self, pcm: &[u8]) -> Result<(), SessionError> {
        self.guard()?;
        for frame in self.chunker.push(pcm) {
            self.dispatch(OutboundUnit::audio(frame, &self.format)).await?;
        }
        Ok(())
    }

    /// Sends `pcm` in full: complete frames, then the remainder.
    pub async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), SessionError> {
        self.stream_audio(pcm).await?;
        self.flush_audio().await
    }

    /// Sends any buffered partial frame.
    pub async fn flush_audio(&mut self) -> Result<(), SessionError> {
        self.guard()?;
        if let Some(rest) = self.chunker.finish() {
            debug!(bytes = rest.len(), "Flushing partial audio frame.");
            self.dispatch(OutboundUnit::audio(rest, &self.format)).await?;
        }
        Ok(())
    }

    /// Flushes and marks the end of the audio stream (automatic detection).
    pub async fn end_audio_stream(&mut self) -> Result<(), SessionError> {
        self.flush_audio().await?;
        self.dispatch(OutboundUnit::AudioStreamEnd).await
    }

    /// Opens a speech segment (manual detection).
    pub async fn start_activity(&mut self) -> Result<(), SessionError> {
        self.guard()?;
        self.dispatch(OutboundUnit::ActivityStart).await
    }

    /// Flushes and closes the speech segment (manual detection).
    pub async fn end_activity(&mut self) -> Result<(), SessionError> {
        self.flush_audio().await?;
        self.dispatch(OutboundUnit::ActivityEnd).await
    }

    pub async fn respond_to_tool(
        &mut self,
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: Value,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.dispatch(OutboundUnit::ToolResponse {
            call_id: call_id.into(),
            name: name.into(),
            result,
        })
        .await
    }

    fn guard(&self) -> Result<(), SessionError> {
        if self.halted {
            Err(SessionError::InputHalted)
        } else {
            Ok(())
        }
    }

    async fn dispatch(&mut self, unit: OutboundUnit) -> Result<(), SessionError> {
        self.guard()?;
        let kind = unit.kind();
        if let Err(err) = self.session.send(unit).await {
            warn!(unit = kind, error = %err, "Input halted.");
            self.halted = true;
            return Err(err);
        }
        Ok(())
    }
}
