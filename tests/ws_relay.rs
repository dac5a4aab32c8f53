//! End-to-end tests: real server, real WebSocket clients.

use campus_signal::config::Config;
use campus_signal::web::{run_http_server, SharedState};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start the server on a random port and return its address.
async fn start_test_server(config: Config) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (state, _hub) = SharedState::start(config).unwrap();

    tokio::spawn(async move {
        run_http_server(listener, state, std::future::pending())
            .await
            .unwrap();
    });

    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{}{}", addr, path))
        .await
        .expect("Failed to connect to WebSocket");
    client
}

async fn send(client: &mut Client, frame: Value) {
    client
        .send(Message::Text(frame.to_string()))
        .await
        .expect("send failed");
}

/// Next text frame as JSON
async fn recv(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timed out waiting for frame")
            .expect("Connection closed")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Round-trip a heartbeat so everything sent before it has been handled
async fn sync(client: &mut Client) {
    send(client, json!({"type": "heartbeat"})).await;
    assert_eq!(recv(client).await, json!({"type": "heartbeat-ack"}));
}

async fn assert_silent(client: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(300), client.next()).await;
    assert!(result.is_err(), "Expected no frame, got {:?}", result);
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_study_room_offer_answer_scenario() {
    let addr = start_test_server(Config::default()).await;
    let mut relay = connect(addr, "/ws").await;
    let mut alice = connect(addr, "/ws").await;
    let mut bob = connect(addr, "/ws").await;

    send(&mut relay, json!({"type": "declare-primary-relay"})).await;
    sync(&mut relay).await;

    send(&mut alice, json!({"type": "start", "data": {"roomId": "study-1", "userId": "A"}})).await;
    assert_eq!(
        recv(&mut relay).await,
        json!({"type": "add-peer", "data": {"roomId": "study-1", "index": 0}})
    );
    send(&mut bob, json!({"type": "start", "data": {"roomId": "study-1", "userId": "B"}})).await;
    assert_eq!(
        recv(&mut relay).await,
        json!({"type": "add-peer", "data": {"roomId": "study-1", "index": 1}})
    );

    send(&mut relay, json!({"type": "relay-ack-add-peer", "data": {"roomId": "study-1", "index": 0}})).await;
    assert_eq!(
        recv(&mut alice).await,
        json!({"type": "start", "data": {"roomId": "study-1", "index": 0}})
    );

    send(&mut alice, json!({"type": "offer", "data": {"roomId": "study-1", "userId": "A", "sdpOffer": "X"}})).await;
    assert_eq!(
        recv(&mut relay).await,
        json!({"type": "offer", "data": {"roomId": "study-1", "index": 0, "sdpOffer": "X"}})
    );

    send(&mut relay, json!({"type": "answer", "data": {"roomId": "study-1", "index": 0, "sdpAnswer": "Y"}})).await;
    assert_eq!(
        recv(&mut alice).await,
        json!({"type": "answer-ready", "data": {"sdpAnswer": "Y"}})
    );

    assert_silent(&mut bob).await;
}

#[tokio::test]
async fn test_relay_frames_before_declaration_are_rejected() {
    let addr = start_test_server(Config::default()).await;
    let mut alice = connect(addr, "/ws").await;

    send(&mut alice, json!({"type": "offer", "data": {"roomId": "r", "userId": "A", "sdpOffer": "X"}})).await;
    let reply = recv(&mut alice).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["kind"], "NotReady");
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let addr = start_test_server(Config::default()).await;
    let mut alice = connect(addr, "/ws").await;

    alice.send(Message::Text("{oops".to_string())).await.unwrap();
    let reply = recv(&mut alice).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["data"]["kind"], "MalformedFrame");

    send(&mut alice, json!({"type": "start", "data": {"roomId": "r"}})).await;
    assert_eq!(recv(&mut alice).await["data"]["kind"], "MalformedFrame");

    sync(&mut alice).await;
}

#[tokio::test]
async fn test_presence_on_join_and_close() {
    let addr = start_test_server(Config::default()).await;
    let mut alice = connect(addr, "/ws").await;
    let mut bob = connect(addr, "/signaling").await;
    sync(&mut alice).await;
    sync(&mut bob).await;

    send(&mut alice, json!({"type": "join", "data": {"userId": "alice"}})).await;
    let online = json!({"type": "status", "data": {"userId": "alice", "online": true}});
    assert_eq!(recv(&mut alice).await, online);
    assert_eq!(recv(&mut bob).await, online);

    alice.close(None).await.unwrap();
    assert_eq!(
        recv(&mut bob).await,
        json!({"type": "status", "data": {"userId": "alice", "online": false}})
    );
}

#[tokio::test]
async fn test_relay_token_required_when_configured() {
    let mut config = Config::default();
    config.relay.token = Some("s3cret".to_string());
    let addr = start_test_server(config).await;
    let mut relay = connect(addr, "/ws").await;

    send(&mut relay, json!({"type": "declare-primary-relay"})).await;
    assert_eq!(recv(&mut relay).await["data"]["kind"], "Unauthorized");

    send(&mut relay, json!({"type": "declare-primary-relay", "data": {"token": "s3cret"}})).await;
    sync(&mut relay).await;
}

#[tokio::test]
async fn test_health_and_stats_endpoints() {
    let addr = start_test_server(Config::default()).await;
    let mut relay = connect(addr, "/ws").await;
    send(&mut relay, json!({"type": "declare-primary-relay"})).await;
    sync(&mut relay).await;

    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains("\"status\":\"healthy\""));

    let stats = http_get(addr, "/stats").await;
    assert!(stats.starts_with("HTTP/1.1 200"));
    assert!(stats.contains("\"primary_relay\":true"));

    let metrics = http_get(addr, "/metrics").await;
    assert!(metrics.contains("campus_signal_frames_total"));
}
