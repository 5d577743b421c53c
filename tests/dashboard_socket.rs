//! Integration tests for the dashboard socket.

mod common;

use common::{TestApp, viewer};
use futures_util::{SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn next_json<S>(ws: &mut S) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .expect("socket error");
    match frame {
        Message::Text(text) => serde_json::from_str(&text).expect("json frame"),
        other => panic!("unexpected frame: {other:?}"),
    }
}

fn is_active(t: &TestApp, secret: &str) -> bool {
    t.app
        .db
        .sessions()
        .by_secret(secret)
        .unwrap()
        .is_some_and(|s| s.active)
}

#[tokio::test]
async fn test_socket_marks_session_active() {
    let t = TestApp::new();
    let session = t.app.sessions.login(&viewer("alice")).unwrap();
    let addr = t.serve_socket().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws.send(Message::Text(session.secret.clone())).await.unwrap();

    let hello = next_json(&mut ws).await;
    assert_eq!(hello["status"], "ok");
    assert_eq!(hello["userId"], "id-alice");
    assert_eq!(hello["userName"], "alice");
    assert!(is_active(&t, &session.secret));

    ws.close(None).await.unwrap();
    let mut cleared = false;
    for _ in 0..50 {
        if !is_active(&t, &session.secret) {
            cleared = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(cleared, "session still active after disconnect");
}

#[tokio::test]
async fn test_socket_rejects_unknown_secret() {
    let t = TestApp::new();
    let addr = t.serve_socket().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws.send(Message::Text("nope".to_string())).await.unwrap();

    let reply = next_json(&mut ws).await;
    assert_eq!(reply["text"], "unauthorized");
}

async fn wait_until_inactive(t: &TestApp, secret: &str) -> bool {
    for _ in 0..50 {
        if !is_active(t, secret) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_session_active_while_any_socket_open() {
    let t = TestApp::new();
    let session = t.app.sessions.login(&viewer("alice")).unwrap();
    let addr = t.serve_socket().await;

    let (mut first, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    first.send(Message::Text(session.secret.clone())).await.unwrap();
    assert_eq!(next_json(&mut first).await["status"], "ok");

    let (mut second, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    second.send(Message::Text(session.secret.clone())).await.unwrap();
    assert_eq!(next_json(&mut second).await["status"], "ok");

    first.close(None).await.unwrap();
    // drain until the server acknowledges the close
    while let Ok(Some(Ok(_))) = tokio::time::timeout(Duration::from_secs(5), first.next()).await {}
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(is_active(&t, &session.secret), "closing one socket cleared the session");

    second.close(None).await.unwrap();
    assert!(wait_until_inactive(&t, &session.secret).await);
}

#[tokio::test]
async fn test_non_text_first_frame_is_closed() {
    let t = TestApp::new();
    let session = t.app.sessions.login(&viewer("alice")).unwrap();
    let addr = t.serve_socket().await;

    let frames = [
        Message::Ping(b"hi".to_vec()),
        Message::Binary(session.secret.clone().into_bytes()),
    ];
    for first in frames {
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        ws.send(first).await.unwrap();

        // a pong may precede the close
        let closed = loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("server should close promptly");
            match frame {
                Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => break true,
                _ => break false,
            }
        };
        assert!(closed, "socket left open after a non-text first frame");
        assert!(!is_active(&t, &session.secret));
    }
}
