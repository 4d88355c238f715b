//! One live session over one duplex connection.
//!
//! [`Session`] is a cheap clonable handle. Sends from any number of tasks are
//! serialized through the write half; events are pulled by one reader at a
//! time through [`Session::next_event`] or [`Session::events`]. [`Session::close`]
//! cancels any in-flight send or read.

use crate::{
    codec,
    config::SessionConfig,
    credential::CredentialProvider,
    demux::Demultiplexer,
    error::{SessionError, TransportError},
    event::{InboundEvent, Received},
    state::{SessionState, StateMachine},
    transport::{ConnectRequest, Connector, Frame, FrameSink, FrameSource},
    unit::OutboundUnit,
};
use futures::stream::{self, BoxStream, StreamExt};
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, watch};
use tracing::{Instrument, Span, debug, info, info_span, trace, warn};

/// Upper bound on waiting for the transport to acknowledge a close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("Session");
        out.field("model", &self.inner.config.model);
        match self.inner.machine.try_lock() {
            Ok(machine) => out.field("state", &machine.state()),
            Err(_) => out.field("state", &format_args!("<locked>")),
        };
        out.finish_non_exhaustive()
    }
}

struct Inner {
    config: SessionConfig,
    machine: Mutex<StateMachine>,
    /// Write half. The lock is held for the whole of a send, so frames reach
    /// the wire in the order their sends acquired it.
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    receiver: Mutex<Inbound>,
    closed_tx: watch::Sender<bool>,
    close_started: AtomicBool,
    span: Span,
}

struct Inbound {
    source: Option<Box<dyn FrameSource>>,
    demux: Demultiplexer,
    /// Events decoded but not yet handed out. A frame can carry several.
    queued: VecDeque<InboundEvent>,
    last_frame: &'static str,
}

enum Read {
    Frame(Frame),
    Timeout,
    End,
    Failed(TransportError),
}

impl Session {
    /// Connects, sends the setup built from `config` and waits for
    /// `setupComplete`. The handshake timeout covers all three steps. On any
    /// failure the connection is closed before the error is returned.
    pub async fn open(
        config: SessionConfig,
        connector: &dyn Connector,
        endpoint: &str,
        credentials: &dyn CredentialProvider,
    ) -> Result<Self, SessionError> {
        let request = ConnectRequest::new(endpoint, credentials.credential()?);
        let span = info_span!(
            "live_session",
            model = %config.model,
            endpoint = request.redacted_endpoint()
        );

        let limit = config.handshake_timeout;
        async move {
            let deadline = tokio::time::Instant::now() + limit;
            let (sink, source) = tokio::time::timeout_at(deadline, connector.connect(&request))
                .await
                .map_err(|_| SessionError::HandshakeTimeout(limit))?
                .map_err(SessionError::ConnectFailed)?;
            debug!("Transport connected.");

            let (closed_tx, _) = watch::channel(false);
            let session = Session {
                inner: Arc::new(Inner {
                    machine: Mutex::new(StateMachine::new(config.activity_detection)),
                    sink: Mutex::new(Some(sink)),
                    receiver: Mutex::new(Inbound {
                        source: Some(source),
                        demux: Demultiplexer::new(),
                        queued: VecDeque::new(),
                        last_frame: "none",
                    }),
                    closed_tx,
                    close_started: AtomicBool::new(false),
                    span: Span::current(),
                    config,
                }),
            };

            let handshake = tokio::time::timeout_at(deadline, session.handshake())
                .await
                .unwrap_or(Err(SessionError::HandshakeTimeout(limit)));
            if let Err(err) = handshake {
                warn!(error = %err, "Setup failed.");
                session.inner.machine.lock().await.fail();
                session.close_inner().await;
                return Err(err);
            }
            info!("Session open.");
            Ok(session)
        }
        .instrument(span)
        .await
    }

    async fn handshake(&self) -> Result<(), SessionError> {
        let setup = OutboundUnit::Setup(self.inner.config.setup_message());
        self.send_inner(setup).await?;
        self.await_setup_ack().await
    }

    async fn await_setup_ack(&self) -> Result<(), SessionError> {
        let mut guard = self.inner.receiver.lock().await;
        let inbound = &mut *guard;
        let Some(source) = inbound.source.as_deref_mut() else {
            return Err(SessionError::SessionClosed);
        };

        loop {
            let frame = match source.next_frame().await {
                None => return Err(rejected(None, "connection closed before setupComplete")),
                Some(Err(err)) => {
                    return Err(SessionError::TransportLost {
                        state: self.state().await,
                        last_frame: inbound.last_frame,
                        source: err,
                    });
                }
                Some(Ok(Frame::Close(reason))) => {
                    return Err(match reason {
                        Some(reason) if !reason.reason.is_empty() => {
                            rejected(Some(i32::from(reason.code)), reason.reason)
                        }
                        Some(reason) => rejected(
                            Some(i32::from(reason.code)),
                            "connection closed before setupComplete",
                        ),
                        None => rejected(None, "connection closed before setupComplete"),
                    });
                }
                Some(Ok(frame)) => frame,
            };
            let Some(payload) = frame.payload() else {
                continue;
            };
            let message = match codec::decode_inbound(payload) {
                Ok(message) => message,
                Err(err) => {
                    warn!(error = %err, "Skipping malformed frame during setup.");
                    continue;
                }
            };

            let mut events = inbound.demux.process(message).into_iter();
            let Some(first) = events.next() else {
                continue;
            };
            inbound.last_frame = first.kind();
            let mut machine = self.inner.machine.lock().await;
            machine.apply_event(&first);
            return match first {
                InboundEvent::SetupAck => {
                    for event in events {
                        machine.apply_event(&event);
                        inbound.last_frame = event.kind();
                        inbound.queued.push_back(event);
                    }
                    Ok(())
                }
                InboundEvent::ProtocolError { code, message } => Err(rejected(code, message)),
                other => Err(rejected(
                    None,
                    format!("unexpected {} before setupComplete", other.kind()),
                )),
            };
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    pub async fn state(&self) -> SessionState {
        self.inner.machine.lock().await.state()
    }

    /// Validates `unit` against the current state, encodes it and writes it.
    ///
    /// Invalid units and unsupported audio are rejected before anything
    /// reaches the wire. A failed write moves the session to `Failed`.
    pub async fn send(&self, unit: OutboundUnit) -> Result<(), SessionError> {
        self.send_inner(unit)
            .instrument(self.inner.span.clone())
            .await
    }

    async fn send_inner(&self, unit: OutboundUnit) -> Result<(), SessionError> {
        let kind = unit.kind();
        let mut sink = self.inner.sink.lock().await;

        let frame = {
            let mut machine = self.inner.machine.lock().await;
            machine.check_send(&unit)?;
            let text = codec::encode_outbound(&unit, &self.inner.config.input_audio)?;
            machine.apply_send(&unit)?;
            Frame::Text(text)
        };
        let Some(sink) = sink.as_mut() else {
            return Err(SessionError::SessionClosed);
        };

        let closed = closed_signal(self.inner.closed_tx.subscribe());
        let result = tokio::select! {
            biased;
            _ = closed => return Err(SessionError::SessionClosed),
            result = sink.send(frame) => result,
        };

        match result {
            Ok(()) => {
                trace!(unit = kind, "Sent.");
                Ok(())
            }
            Err(source) => {
                let mut machine = self.inner.machine.lock().await;
                let state = machine.state();
                machine.fail();
                warn!(unit = kind, %state, error = %source, "Send failed.");
                Err(SessionError::SendFailed {
                    state,
                    unit: kind,
                    source,
                })
            }
        }
    }

    /// Next item of the event sequence, or `None` once the session has
    /// closed and every queued event has been handed out.
    ///
    /// With a read timeout configured, [`Received::Timeout`] is yielded each
    /// time it elapses without a frame; the session stays usable.
    pub async fn next_event(&self) -> Option<Result<Received, SessionError>> {
        self.next_event_inner()
            .instrument(self.inner.span.clone())
            .await
    }

    async fn next_event_inner(&self) -> Option<Result<Received, SessionError>> {
        let mut guard = self.inner.receiver.lock().await;
        let inbound = &mut *guard;

        loop {
            if let Some(event) = inbound.queued.pop_front() {
                return Some(Ok(Received::Event(event)));
            }
            if *self.inner.closed_tx.borrow() {
                return None;
            }
            let source = inbound.source.as_deref_mut()?;

            let closed = closed_signal(self.inner.closed_tx.subscribe());
            let read = tokio::select! {
                biased;
                _ = closed => return None,
                read = read_frame(source, self.inner.config.read_timeout) => read,
            };

            match read {
                Read::Frame(frame) => self.route_frame(inbound, frame).await,
                Read::Timeout => return Some(Ok(Received::Timeout)),
                Read::End => {
                    info!(last_frame = inbound.last_frame, "Remote ended the stream.");
                    inbound.source = None;
                    self.inner.machine.lock().await.begin_closing();
                }
                Read::Failed(source) => {
                    inbound.source = None;
                    let mut machine = self.inner.machine.lock().await;
                    let state = machine.state();
                    machine.fail();
                    warn!(%state, last_frame = inbound.last_frame, error = %source, "Transport lost.");
                    return Some(Err(SessionError::TransportLost {
                        state,
                        last_frame: inbound.last_frame,
                        source,
                    }));
                }
            }
        }
    }

    async fn route_frame(&self, inbound: &mut Inbound, frame: Frame) {
        if let Frame::Close(reason) = frame {
            inbound.last_frame = "close";
            match reason {
                Some(reason) if !reason.is_normal() => {
                    warn!(code = reason.code, reason = %reason.reason, "Remote closed the connection.");
                    inbound.queued.push_back(InboundEvent::ProtocolError {
                        code: Some(i32::from(reason.code)),
                        message: reason.reason,
                    });
                }
                _ => info!("Remote closed the connection."),
            }
            inbound.source = None;
            self.inner.machine.lock().await.begin_closing();
            return;
        }

        let Some(payload) = frame.payload() else {
            return;
        };
        let message = match codec::decode_inbound(payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "Skipping malformed frame.");
                return;
            }
        };

        let events = inbound.demux.process(message);
        let mut machine = self.inner.machine.lock().await;
        for event in events {
            machine.apply_event(&event);
            trace!(event = event.kind(), state = %machine.state(), "Received.");
            inbound.last_frame = event.kind();
            inbound.queued.push_back(event);
        }
    }

    /// The event sequence as an owned stream. Ends when the session closes.
    pub fn events(&self) -> BoxStream<'static, Result<Received, SessionError>> {
        stream::unfold(self.clone(), |session| async move {
            let item = session.next_event().await?;
            Some((item, session))
        })
        .boxed()
    }

    /// Closes the connection. Idempotent; pending sends fail with
    /// `SessionClosed` and pending reads end. Events already decoded can
    /// still be drained afterwards.
    ///
    /// The session ends `Closed`, except that a `Failed` session stays
    /// `Failed`: the transport is still released, but the failure remains
    /// visible through [`Session::state`].
    pub async fn close(&self) {
        self.close_inner()
            .instrument(self.inner.span.clone())
            .await
    }

    async fn close_inner(&self) {
        if self.inner.close_started.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.machine.lock().await.begin_closing();
        self.inner.closed_tx.send_replace(true);

        let sink = self.inner.sink.lock().await.take();
        if let Some(mut sink) = sink {
            match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(error = %err, "Error closing connection."),
                Err(_) => warn!("Timed out closing connection."),
            }
        }
        self.inner.receiver.lock().await.source = None;

        let mut machine = self.inner.machine.lock().await;
        machine.finish_closing();
        info!(state = %machine.state(), "Session closed.");
    }
}

fn rejected(code: Option<i32>, message: impl Into<String>) -> SessionError {
    SessionError::HandshakeRejected {
        code,
        message: message.into(),
    }
}

async fn read_frame(source: &mut dyn FrameSource, limit: Option<Duration>) -> Read {
    let next = match limit {
        Some(limit) => match tokio::time::timeout(limit, source.next_frame()).await {
            Ok(next) => next,
            Err(_) => return Read::Timeout,
        },
        None => source.next_frame().await,
    };
    match next {
        Some(Ok(frame)) => Read::Frame(frame),
        Some(Err(err)) => Read::Failed(err),
        None => Read::End,
    }
}

/// Resolves once the session has been asked to close.
async fn closed_signal(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
