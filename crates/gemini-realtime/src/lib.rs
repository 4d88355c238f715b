//! Realtime bidirectional client for the Gemini Live protocol.
//!
//! A [`Session`] owns one duplex connection. Callers push [`OutboundUnit`]s
//! (directly or through an [`InputMultiplexer`]) and pull [`InboundEvent`]s
//! from [`Session::events`]. Every send is checked against the session
//! [`state`] machine before it reaches the [`codec`] and the wire.
//!
//! ```no_run
//! use gemini_realtime::{
//!     Received, Session, SessionConfig, StaticCredential, transport::websocket::WebSocketConnector,
//! };
//! use secrecy::SecretString;
//!
//! # async fn run(key: SecretString) -> anyhow::Result<()> {
//! let config = SessionConfig::new("gemini-2.0-flash-live-001");
//! let credential = StaticCredential::query_param("key", key);
//! let session = Session::open(config, &WebSocketConnector, gemini_realtime::DEFAULT_ENDPOINT, &credential).await?;
//! session.send(gemini_realtime::OutboundUnit::user_text("Hello")).await?;
//! while let Some(item) = session.next_event().await {
//!     if let Received::Event(event) = item? {
//!         println!("{event:?}");
//!     }
//! }
//! session.close().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod credential;
pub mod demux;
pub mod error;
pub mod event;
pub mod mux;
pub mod session;
pub mod state;
pub mod transport;
pub mod unit;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{ActivityDetection, AudioFormat, SessionConfig};
pub use credential::{Credential, CredentialProvider, EnvCredential, StaticCredential};
pub use demux::Demultiplexer;
pub use error::{CodecError, CredentialError, SessionError, TransportError};
pub use event::{InboundEvent, ModelTurn, Received};
pub use mux::{AudioChunker, InputMultiplexer};
pub use session::Session;
pub use state::SessionState;
pub use unit::{OutboundUnit, Role};

pub use gemini_realtime_types as types;

/// Public `v1beta` Live endpoint. The credential is appended by the connector.
pub const DEFAULT_ENDPOINT: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";
