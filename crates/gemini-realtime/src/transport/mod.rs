//! The duplex connection seam.
//!
//! A [`Connector`] yields the two halves of one connection: a [`FrameSink`]
//! used by the send path and a [`FrameSource`] drained by the receive path.
//! The halves are independent so sends and reads can proceed concurrently.

pub mod channel;
pub mod websocket;

use crate::{credential::Credential, error::TransportError};
use async_trait::async_trait;
use bytes::Bytes;

/// One discrete message on the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
    Close(Option<CloseReason>),
}

impl Frame {
    /// JSON payload of a data frame. Live servers send JSON in both text and
    /// binary frames.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Frame::Text(text) => Some(text.as_bytes()),
            Frame::Binary(data) => Some(data),
            Frame::Close(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

impl CloseReason {
    pub const NORMAL: u16 = 1000;

    pub fn is_normal(&self) -> bool {
        self.code == Self::NORMAL
    }
}

/// Endpoint plus the credential to authenticate with.
#[derive(Debug)]
pub struct ConnectRequest {
    pub endpoint: String,
    pub credential: Credential,
}

impl ConnectRequest {
    pub fn new(endpoint: impl Into<String>, credential: Credential) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential,
        }
    }

    /// Endpoint without its query string, safe to log.
    pub fn redacted_endpoint(&self) -> &str {
        self.endpoint
            .split_once('?')
            .map_or(self.endpoint.as_str(), |(base, _)| base)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Closes the write half. Closing an already closed sink succeeds.
    async fn close(&mut self) -> Result<(), TransportError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the remote has ended the stream.
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_endpoint_drops_query() {
        let request = ConnectRequest::new("wss://host/path?key=secret", Credential::None);
        assert_eq!(request.redacted_endpoint(), "wss://host/path");
        let request = ConnectRequest::new("wss://host/path", Credential::None);
        assert_eq!(request.redacted_endpoint(), "wss://host/path");
    }

    #[test]
    fn close_frames_have_no_payload() {
        assert_eq!(Frame::Text("{}".into()).payload(), Some(&b"{}"[..]));
        assert_eq!(Frame::Binary(Bytes::from_static(b"{}")).payload(), Some(&b"{}"[..]));
        assert!(Frame::Close(None).payload().is_none());
    }
}
