#![allow(clippy::unwrap_used)]
// Integration tests for the feed framing against a local WebSocket server.

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use url::Url;

use floorsync_api::feed::{self, PatchOp};
use floorsync_api::{Error, TlsMode, TransportConfig};

fn insecure() -> TransportConfig {
    TransportConfig {
        tls: TlsMode::DangerAcceptInvalid,
        ..TransportConfig::default()
    }
}

async fn listener() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = Url::parse(&format!("ws://{addr}/module_state")).unwrap();
    (listener, url)
}

#[tokio::test]
async fn test_batch_round_trip_through_server() {
    let (listener, url) = listener().await;

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();

        let frame = ws.next().await.unwrap().unwrap();
        let received: serde_json::Value =
            serde_json::from_str(frame.to_text().unwrap()).unwrap();

        ws.send(Message::Text(
            json!([{"op": "add", "path": "/07", "value": {"1": {"relay": true}}}])
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
        ws.close(None).await.unwrap();
        received
    });

    let (mut sink, mut source) = feed::connect(&url, &TransportConfig::default())
        .await
        .unwrap();
    sink.send_batch(&[PatchOp::add("/07", json!(true))])
        .await
        .unwrap();

    let text = source.next_text().await.unwrap().unwrap();
    let batch = feed::parse_batch(&text).unwrap();
    assert_eq!(
        batch,
        vec![PatchOp::add("/07", json!({"1": {"relay": true}}))]
    );

    // Server closes after one frame.
    assert!(source.next_text().await.is_none());

    let err = sink
        .send_batch(&[PatchOp::remove("/07")])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WebSocketClosed { .. }), "{err:?}");

    let received = server.await.unwrap();
    assert_eq!(received, json!([{"op": "add", "path": "/07", "value": true}]));
}

#[tokio::test]
async fn test_connect_refused_is_transient() {
    let (listener, url) = listener().await;
    drop(listener);

    let Err(err) = feed::connect(&url, &TransportConfig::default()).await else {
        panic!("connect should fail once the listener is gone");
    };
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_abnormal_close_reports_code() {
    let (listener, url) = listener().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.close(Some(CloseFrame {
            code: CloseCode::Away,
            reason: "restarting".into(),
        }))
        .await
        .unwrap();
    });

    let (_sink, mut source) = feed::connect(&url, &TransportConfig::default())
        .await
        .unwrap();
    let err = source.next_text().await.unwrap().unwrap_err();
    match err {
        Error::WebSocketClosed { code, reason } => {
            assert_eq!(code, 1001);
            assert_eq!(reason, "restarting");
        }
        other => panic!("expected a close error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insecure_transport_connects_to_plain_feed() {
    let (listener, url) = listener().await;

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text("[]".into())).await.unwrap();
    });

    let (_sink, mut source) = feed::connect(&url, &insecure()).await.unwrap();
    assert_eq!(source.next_text().await.unwrap().unwrap(), "[]");
}
