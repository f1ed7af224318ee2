//! Tests for the session lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use copilot_bridge::copilot::{
    ClientConfig, ClientError, CopilotClient, MessagePayload, SessionState,
};
use tokio::sync::mpsc;

use super::{script, ECHO, EXIT_3, IGNORES_TERM, READY_THEN_IDLE, SILENT};

#[tokio::test]
async fn silent_cli_connects_after_grace_period() {
    let (_dir, command) = script(SILENT);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let start = Instant::now();
    client.connect().await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(1900), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(5), "elapsed: {elapsed:?}");
    assert!(client.is_connected());
    assert!(client.pid().is_some());

    client.disconnect().await;
    assert_eq!(client.state(), SessionState::Closed);
    assert!(client.pid().is_none());
}

#[tokio::test]
async fn ready_message_connects_early() {
    let (_dir, command) = script(READY_THEN_IDLE);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let start = Instant::now();
    client.connect().await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(1500));
    assert_eq!(client.state(), SessionState::Connected);
    client.disconnect().await;
}

#[tokio::test]
async fn hard_timeout_shorter_than_grace_fails() {
    let (_dir, command) = script(SILENT);
    let config = ClientConfig {
        timeout: Some(Duration::from_millis(300)),
        ..ClientConfig::default()
    };
    let mut client = CopilotClient::new(command, config);

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, ClientError::HandshakeTimeout(_)));
    assert_eq!(err.to_string(), "Copilot initialization timeout (300ms)");
    assert_eq!(client.state(), SessionState::Connecting);

    client.disconnect().await;
    assert_eq!(client.state(), SessionState::Closed);
}

#[tokio::test]
async fn second_connect_is_refused() {
    let (_dir, command) = script(READY_THEN_IDLE);
    let mut client = CopilotClient::new(command, ClientConfig::default());
    client.connect().await.unwrap();

    assert!(matches!(
        client.connect().await,
        Err(ClientError::AlreadyStarted)
    ));
    client.disconnect().await;
}

#[tokio::test]
async fn prompt_round_trip() {
    let (_dir, command) = script(ECHO);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_message(move |message| {
        let _ = tx.send(message.clone());
    });

    client.connect().await.unwrap();
    client.send_prompt("Explain this repository").await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let message = rx.recv().await.unwrap();
            if !message.is_ready() {
                return message;
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(reply.kind(), "assistant_message");
    assert_eq!(reply.text(), Some("ack"));
    client.disconnect().await;
}

#[tokio::test]
async fn abort_is_written() {
    let (_dir, command) = script(ECHO);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_message(move |message| {
        if let MessagePayload::Error { error, .. } = &message.payload {
            let _ = tx.send(error.clone());
        }
    });

    client.connect().await.unwrap();
    client.abort().await;

    let error = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(error, "aborted");
    client.disconnect().await;
}

#[tokio::test]
async fn exit_is_published_and_blocks_sends() {
    let (_dir, command) = script(EXIT_3);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_exit(move |code| {
        let _ = tx.send(code);
    });

    // Nothing arrives, so the grace period still completes the handshake.
    client.connect().await.unwrap();

    let code = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, Some(3));
    assert!(!client.is_connected());
    assert!(matches!(
        client.send_prompt("hello").await,
        Err(ClientError::NotConnected)
    ));

    client.disconnect().await;
}

#[tokio::test]
async fn unsubscribed_callback_stops_receiving() {
    let (_dir, command) = script(ECHO);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let subscription = client.on_message(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_message(move |message| {
        let _ = tx.send(message.kind().to_string());
    });

    client.connect().await.unwrap();
    assert_eq!(rx.recv().await.as_deref(), Some("ready"));
    let seen_before = count.load(Ordering::SeqCst);
    subscription.unsubscribe();

    client.send_prompt("one").await.unwrap();
    let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap();
    assert_eq!(reply.as_deref(), Some("assistant_message"));
    assert_eq!(count.load(Ordering::SeqCst), seen_before);

    client.disconnect().await;
}

#[tokio::test]
async fn reconnect_after_disconnect() {
    let (_dir, command) = script(READY_THEN_IDLE);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    client.connect().await.unwrap();
    let first = client.pid();
    client.disconnect().await;

    client.connect().await.unwrap();
    assert!(client.is_connected());
    assert_ne!(client.pid(), first);
    client.disconnect().await;
}

#[tokio::test]
async fn disconnect_kills_cli_that_ignores_sigterm() {
    let (_dir, command) = script(IGNORES_TERM);
    let mut client = CopilotClient::new(command, ClientConfig::default());

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_exit(move |code| {
        let _ = tx.send(code);
    });

    client.connect().await.unwrap();
    assert!(client.pid().is_some());

    let start = Instant::now();
    client.disconnect().await;
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_millis(2900), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(6), "elapsed: {elapsed:?}");
    assert_eq!(client.state(), SessionState::Closed);
    assert!(client.pid().is_none());

    // Killed by a signal, so there is no exit code.
    let code = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap();
    assert_eq!(code, Some(None));
}
