#![allow(clippy::unwrap_used)]
// Integration tests for the dashboard feed against a local WebSocket server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use floorsync_core::{ConnectionState, Dashboard, DashboardConfig, Listener, ModuleAddress, TlsMode};

const WAIT: Duration = Duration::from_secs(5);

type ServerWs = WebSocketStream<TcpStream>;

async fn server() -> (TcpListener, DashboardConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut config = DashboardConfig::new(Url::parse(&format!("http://{addr}")).unwrap());
    config.calibrate_clock = false;
    (listener, config)
}

async fn accept(listener: &TcpListener) -> ServerWs {
    let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
    tokio_tungstenite::accept_async(tcp).await.unwrap()
}

async fn next_json(ws: &mut ServerWs) -> Value {
    loop {
        let frame = timeout(WAIT, ws.next()).await.unwrap().unwrap().unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn send(ws: &mut ServerWs, text: String) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn wait_for_state(dashboard: &Dashboard, state: ConnectionState) {
    let mut rx = dashboard.connection_state();
    timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap()
        .unwrap();
}

fn recorder() -> (Arc<Mutex<Vec<Option<Value>>>>, Arc<dyn Listener>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener: Arc<dyn Listener> = Arc::new(move |_: ModuleAddress, state: Option<&Value>| {
        sink.lock().unwrap().push(state.cloned());
    });
    (seen, listener)
}

#[tokio::test]
async fn test_open_sends_tracked_addresses_and_applies_patches() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();

    let (seen, l) = recorder();
    dashboard.subscribe(0x07, Arc::clone(&l));
    dashboard.subscribe(0x07, recorder().1);
    dashboard.start().await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(
        next_json(&mut ws).await,
        json!([{"op": "add", "path": "/07", "value": true}])
    );
    wait_for_state(&dashboard, ConnectionState::Open).await;
    assert!(dashboard.is_online());

    send(
        &mut ws,
        json!([
            {"op": "add", "path": "/07", "value": {"1": {"relay": false}}},
            {"op": "replace", "path": "/07/1/relay", "value": true}
        ])
        .to_string(),
    )
    .await;

    let mut stream = dashboard.watch_module(0x07);
    while stream.current().is_none() {
        timeout(WAIT, stream.changed()).await.unwrap().unwrap();
    }
    assert_eq!(
        stream.current().as_deref(),
        Some(&json!({"1": {"relay": true}}))
    );
    assert_eq!(*seen.lock().unwrap(), vec![Some(json!({"1": {"relay": true}}))]);

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_changes_while_open_are_sent_one_by_one() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    dashboard.start().await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!([]));
    wait_for_state(&dashboard, ConnectionState::Open).await;

    let stream = dashboard.watch_module(0x2c);
    assert_eq!(
        next_json(&mut ws).await,
        json!([{"op": "add", "path": "/2c", "value": true}])
    );

    drop(stream);
    assert_eq!(
        next_json(&mut ws).await,
        json!([{"op": "remove", "path": "/2c"}])
    );

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_reconnect_resubscribes_exactly_the_tracked_set() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    let (_seen, a) = recorder();
    let (_seen_b, b) = recorder();
    dashboard.subscribe(0x07, Arc::clone(&a));
    dashboard.subscribe(0x1a3, Arc::clone(&b));
    dashboard.start().await.unwrap();

    let mut first = accept(&listener).await;
    assert_eq!(
        next_json(&mut first).await,
        json!([
            {"op": "add", "path": "/07", "value": true},
            {"op": "add", "path": "/1a3", "value": true}
        ])
    );
    wait_for_state(&dashboard, ConnectionState::Open).await;

    send(
        &mut first,
        json!([{"op": "add", "path": "/07", "value": {"1": {}}}]).to_string(),
    )
    .await;
    first.close(None).await.unwrap();
    drop(first);
    let closed_at = Instant::now();

    wait_for_state(&dashboard, ConnectionState::Closed).await;
    // Changed while offline: must not be sent individually, only via the
    // next resubscription batch.
    dashboard.unsubscribe(0x1a3, &b);

    let mut second = accept(&listener).await;
    assert!(closed_at.elapsed() >= Duration::from_millis(500));
    assert_eq!(
        next_json(&mut second).await,
        json!([{"op": "add", "path": "/07", "value": true}])
    );

    // Nothing else queued behind the batch.
    let extra = timeout(Duration::from_millis(300), second.next()).await;
    assert!(extra.is_err(), "unexpected frame after resubscription");

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_failed_handshakes_back_off() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    dashboard.start().await.unwrap();

    let mut accepted = Vec::new();
    for _ in 0..3 {
        let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        accepted.push(Instant::now());
        drop(tcp);
    }

    let first_gap = accepted[1] - accepted[0];
    let second_gap = accepted[2] - accepted[1];
    assert!(first_gap >= Duration::from_millis(500), "{first_gap:?}");
    assert!(second_gap >= Duration::from_millis(1000), "{second_gap:?}");
    assert!(second_gap < Duration::from_millis(5000) + WAIT);

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_malformed_frames_do_not_close_the_feed() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    let mut stream = dashboard.watch_module(0x07);
    dashboard.start().await.unwrap();

    let mut ws = accept(&listener).await;
    next_json(&mut ws).await;

    send(&mut ws, "definitely not json".to_owned()).await;
    send(&mut ws, json!({"op": "add"}).to_string()).await;
    send(
        &mut ws,
        json!([{"op": "replace", "path": "/07/9/relay", "value": true}]).to_string(),
    )
    .await;
    send(
        &mut ws,
        json!([{"op": "add", "path": "/07", "value": {"2": {"relay": true}}}]).to_string(),
    )
    .await;

    let snap = timeout(WAIT, stream.changed()).await.unwrap().unwrap();
    assert_eq!(snap.as_deref(), Some(&json!({"2": {"relay": true}})));
    assert_eq!(*dashboard.connection_state().borrow(), ConnectionState::Open);

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_reconnecting() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    dashboard.start().await.unwrap();

    let mut ws = accept(&listener).await;
    next_json(&mut ws).await;
    wait_for_state(&dashboard, ConnectionState::Open).await;

    dashboard.shutdown().await;
    assert_eq!(
        *dashboard.connection_state().borrow(),
        ConnectionState::Closed
    );

    let again = timeout(Duration::from_millis(1500), listener.accept()).await;
    assert!(again.is_err(), "dashboard reconnected after shutdown");
    assert!(dashboard.start().await.is_err());
}

#[tokio::test]
async fn test_start_reports_connecting_before_the_first_open() {
    let (listener, config) = server().await;
    let dashboard = Dashboard::new(config).unwrap();
    assert_eq!(*dashboard.connection_state().borrow(), ConnectionState::Closed);

    dashboard.start().await.unwrap();
    assert_eq!(*dashboard.connection_state().borrow(), ConnectionState::Connecting);

    let mut ws = accept(&listener).await;
    next_json(&mut ws).await;
    wait_for_state(&dashboard, ConnectionState::Open).await;

    dashboard.shutdown().await;
}

#[tokio::test]
async fn test_insecure_transport_still_opens_the_feed() {
    let (listener, mut config) = server().await;
    config.transport.tls = TlsMode::DangerAcceptInvalid;
    let dashboard = Dashboard::new(config).unwrap();
    dashboard.start().await.unwrap();

    let mut ws = accept(&listener).await;
    assert_eq!(next_json(&mut ws).await, json!([]));
    wait_for_state(&dashboard, ConnectionState::Open).await;

    dashboard.shutdown().await;
}
