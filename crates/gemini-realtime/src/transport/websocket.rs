//! [`Connector`] over a real WebSocket, via tokio-tungstenite.

use super::{CloseReason, ConnectRequest, Connector, Frame, FrameSink, FrameSource};
use crate::{credential::Credential, error::TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use secrecy::ExposeSecret;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError,
        client::IntoClientRequest,
        http::{HeaderName, HeaderValue},
        protocol::{CloseFrame, Message as WsMessage, frame::coding::CloseCode},
    },
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(
        &self,
        request: &ConnectRequest,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
        let url = match &request.credential {
            Credential::QueryParam { name, value } => {
                let separator = if request.endpoint.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}{}={}",
                    request.endpoint,
                    separator,
                    name,
                    value.expose_secret()
                )
            }
            _ => request.endpoint.clone(),
        };

        let mut ws_request = url.into_client_request()?;
        if let Credential::Header { name, value } = &request.credential {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let mut value = HeaderValue::from_str(value.expose_secret())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            value.set_sensitive(true);
            ws_request.headers_mut().insert(name, value);
        }

        let (ws_stream, response) = connect_async(ws_request).await?;
        info!(
            endpoint = request.redacted_endpoint(),
            status = %response.status(),
            "Connected to Live WebSocket."
        );
        Ok(split(ws_stream))
    }
}

/// Splits an established WebSocket into boxed frame halves.
pub fn split<S>(stream: WebSocketStream<S>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = stream.split();
    (
        Box::new(WebSocketSink { inner: tx }),
        Box::new(WebSocketSource { inner: rx }),
    )
}

struct WebSocketSink<S> {
    inner: SplitSink<WebSocketStream<S>, WsMessage>,
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let message = match frame {
            Frame::Text(text) => WsMessage::Text(text.into()),
            Frame::Binary(data) => WsMessage::Binary(data.into()),
            Frame::Close(reason) => WsMessage::Close(reason.map(|r| CloseFrame {
                code: CloseCode::from(r.code),
                reason: r.reason.into(),
            })),
        };
        self.inner.send(message).await.map_err(map_closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.inner.close().await {
            Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct WebSocketSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

#[async_trait]
impl<S> FrameSource for WebSocketSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            let frame = match self.inner.next().await? {
                Ok(WsMessage::Text(text)) => Frame::Text(text.as_str().to_owned()),
                Ok(WsMessage::Binary(data)) => Frame::Binary(Bytes::from(data)),
                Ok(WsMessage::Close(close_frame)) => Frame::Close(close_frame.map(|c| CloseReason {
                    code: u16::from(c.code),
                    reason: c.reason.as_str().to_owned(),
                })),
                // Pongs are queued by tungstenite and flushed on the next write.
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) | Ok(WsMessage::Frame(_)) => {
                    debug!("Skipping control frame.");
                    continue;
                }
                Err(WsError::ConnectionClosed) => return None,
                Err(e) => return Some(Err(e.into())),
            };
            return Some(Ok(frame));
        }
    }
}

fn map_closed(err: WsError) -> TransportError {
    match err {
        WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::Closed,
        other => other.into(),
    }
}
