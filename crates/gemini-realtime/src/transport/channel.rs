//! In-process transport backed by unbounded channels.
//!
//! [`pair`] returns a [`ChannelConnector`] for the session side and a
//! [`RemoteEnd`] that plays the server: it observes every frame the session
//! writes and pushes frames, errors or a hang-up back.

use super::{ConnectRequest, Connector, Frame, FrameSink, FrameSource};
use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::{Mutex, mpsc};

type Inbound = Result<Frame, TransportError>;

/// Connects exactly once to its paired [`RemoteEnd`].
pub struct ChannelConnector {
    halves: Mutex<Option<(ChannelSink, ChannelSource)>>,
    refuse: Option<String>,
}

impl ChannelConnector {
    /// A connector whose every attempt fails with `TransportError::Refused`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            halves: Mutex::new(None),
            refuse: Some(reason.into()),
        }
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(
        &self,
        _request: &ConnectRequest,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
        if let Some(reason) = &self.refuse {
            return Err(TransportError::Refused(reason.clone()));
        }
        let (sink, source) = self
            .halves
            .lock()
            .await
            .take()
            .ok_or_else(|| TransportError::Refused("channel already connected".into()))?;
        Ok((Box::new(sink), Box::new(source)))
    }
}

struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<Frame>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.tx.take().is_some() {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.rx.recv().await
    }
}

/// The server side of a channel pair.
pub struct RemoteEnd {
    to_client: Option<mpsc::UnboundedSender<Inbound>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
    closes: Arc<AtomicUsize>,
}

impl RemoteEnd {
    /// Queues a data frame for the session. Returns `false` once the
    /// session side is gone.
    pub fn send_frame(&self, frame: Frame) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(frame)).is_ok())
    }

    pub fn send_json(&self, value: &serde_json::Value) -> bool {
        self.send_frame(Frame::Text(value.to_string()))
    }

    /// Delivers a read error to the session.
    pub fn fail(&self, error: TransportError) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(Err(error)).is_ok())
    }

    /// Ends the inbound stream without a close frame.
    pub fn hang_up(&mut self) {
        self.to_client = None;
    }

    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }

    pub fn try_recv_frame(&mut self) -> Option<Frame> {
        self.from_client.try_recv().ok()
    }

    /// Next frame written by the session, parsed as JSON.
    pub async fn recv_json(&mut self) -> Option<serde_json::Value> {
        let frame = self.recv_frame().await?;
        serde_json::from_slice(frame.payload()?).ok()
    }

    /// How many times the session closed its write half.
    pub fn sink_closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub fn pair() -> (ChannelConnector, RemoteEnd) {
    let (client_tx, from_client) = mpsc::unbounded_channel();
    let (to_client, client_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));

    let connector = ChannelConnector {
        halves: Mutex::new(Some((
            ChannelSink {
                tx: Some(client_tx),
                closes: closes.clone(),
            },
            ChannelSource { rx: client_rx },
        ))),
        refuse: None,
    };
    let remote = RemoteEnd {
        to_client: Some(to_client),
        from_client,
        closes,
    };
    (connector, remote)
}
