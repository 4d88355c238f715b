//! End-to-end runs of a session against a local WebSocket server.

use futures_util::{SinkExt, StreamExt};
use gemini_realtime::{
    InboundEvent, OutboundUnit, Received, Session, SessionConfig, SessionError, SessionState,
    StaticCredential, transport::websocket::WebSocketConnector,
};
use secrecy::SecretString;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
};
use tokio_tungstenite::{
    WebSocketStream, accept_async, accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};

async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("client went away: {other:?}"),
        }
    }
}

async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

fn config() -> SessionConfig {
    SessionConfig::new("test-model").with_read_timeout(Some(Duration::from_secs(5)))
}

#[tokio::test]
async fn text_round_trip_over_websocket() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (query_tx, query_rx) = oneshot::channel();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let capture_query =
            |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                let _ = query_tx.send(request.uri().query().map(str::to_owned));
                Ok(response)
            };
        let mut ws = accept_hdr_async(stream, capture_query).await.unwrap();

        let setup = next_json(&mut ws).await;
        assert_eq!(setup["setup"]["model"], "models/test-model");
        send_json(&mut ws, json!({ "setupComplete": {} })).await;

        let turn = next_json(&mut ws).await;
        assert_eq!(turn["clientContent"]["turns"][0]["parts"][0]["text"], "ping");
        send_json(
            &mut ws,
            json!({ "serverContent": {
                "modelTurn": { "parts": [{ "text": "pong" }] },
                "turnComplete": true,
            }}),
        )
        .await;

        while let Some(message) = ws.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    });

    let endpoint = format!("ws://{addr}/live");
    let credential =
        StaticCredential::query_param("key", SecretString::from("test-key".to_owned()));
    let session = Session::open(config(), &WebSocketConnector, &endpoint, &credential).await?;
    assert_eq!(query_rx.await?, Some("key=test-key".to_owned()));

    session.send(OutboundUnit::user_text("ping")).await?;
    let mut text = String::new();
    loop {
        match session.next_event().await {
            Some(Ok(Received::Event(InboundEvent::TextFragment { text: fragment }))) => {
                text.push_str(&fragment)
            }
            Some(Ok(Received::Event(InboundEvent::TurnComplete { turn }))) => {
                assert_eq!(turn.text, "pong");
                break;
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }
    assert_eq!(text, "pong");

    session.close().await;
    assert_eq!(session.state().await, SessionState::Closed);
    server.await?;
    Ok(())
}

#[tokio::test]
async fn policy_close_during_setup_is_a_rejection() -> anyhow::Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        next_json(&mut ws).await;
        ws.close(Some(CloseFrame {
            code: CloseCode::Policy,
            reason: "API key not valid".into(),
        }))
        .await
        .unwrap();
    });

    let endpoint = format!("ws://{addr}/live");
    let err = Session::open(config(), &WebSocketConnector, &endpoint, &StaticCredential::none())
        .await
        .unwrap_err();
    match err {
        SessionError::HandshakeRejected { code, message } => {
            assert_eq!(code, Some(1008));
            assert_eq!(message, "API key not valid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    server.await?;
    Ok(())
}

#[tokio::test]
async fn unreachable_endpoint_fails_to_connect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = format!("ws://{addr}/live");
    let err = Session::open(config(), &WebSocketConnector, &endpoint, &StaticCredential::none())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ConnectFailed(_)), "{err:?}");
}
