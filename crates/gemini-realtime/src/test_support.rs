//! Fixtures shared by the unit tests.

use crate::{
    config::SessionConfig,
    credential::StaticCredential,
    error::TransportError,
    session::Session,
    transport::{
        ConnectRequest, Connector, Frame, FrameSink, FrameSource,
        channel::{self, RemoteEnd},
    },
};
use async_trait::async_trait;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Opens a session over a channel pair with `setupComplete` already queued.
/// The setup frame has been consumed from the remote end.
pub(crate) async fn open_test_session(config: SessionConfig) -> (Session, RemoteEnd) {
    let (connector, mut remote) = channel::pair();
    assert!(remote.send_json(&serde_json::json!({ "setupComplete": {} })));
    let session = Session::open(config, &connector, "wss://test/live", &StaticCredential::none())
        .await
        .expect("session should open");
    let setup = remote.recv_json().await.expect("setup frame");
    assert!(setup.get("setup").is_some(), "first frame was {setup}");
    (session, remote)
}

/// Hands out a fixed pair of halves once.
pub(crate) struct PreparedConnector {
    halves: Mutex<Option<(Box<dyn FrameSink>, Box<dyn FrameSource>)>>,
}

impl PreparedConnector {
    pub(crate) fn new(sink: Box<dyn FrameSink>, source: Box<dyn FrameSource>) -> Self {
        Self {
            halves: Mutex::new(Some((sink, source))),
        }
    }
}

#[async_trait]
impl Connector for PreparedConnector {
    async fn connect(
        &self,
        _request: &ConnectRequest,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
        self.halves
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Refused("already connected".into()))
    }
}

/// A connector whose `connect` never completes.
pub(crate) struct StalledConnector;

#[async_trait]
impl Connector for StalledConnector {
    async fn connect(
        &self,
        _request: &ConnectRequest,
    ) -> Result<(Box<dyn FrameSink>, Box<dyn FrameSource>), TransportError> {
        std::future::pending().await
    }
}

/// A sink that accepts `accepted` frames and then never completes a send.
/// The counter tracks calls to `close`.
pub(crate) fn stalled_sink(accepted: usize) -> (Box<dyn FrameSink>, Arc<AtomicUsize>) {
    let closes = Arc::new(AtomicUsize::new(0));
    let sink = StalledSink {
        remaining: accepted,
        closes: Arc::clone(&closes),
    };
    (Box::new(sink), closes)
}

struct StalledSink {
    remaining: usize,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl FrameSink for StalledSink {
    async fn send(&mut self, _frame: Frame) -> Result<(), TransportError> {
        if self.remaining == 0 {
            std::future::pending::<()>().await;
        }
        self.remaining -= 1;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
