// Shared helpers for booting a server and driving it with WebSocket clients.
#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::{net::SocketAddr, time::Duration};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Upper bound for any single expected frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

// Start a fresh server (fresh session state) on an ephemeral port.
pub async fn spawn_server() -> SocketAddr {
    // Bind first so connections queue in the backlog before `run` starts accepting.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral test port");
    let addr = listener.local_addr().expect("get local addr");
    tokio::spawn(async move {
        sync_server::run(listener).await.expect("server failed");
    });
    addr
}

pub async fn connect(addr: SocketAddr) -> Client {
    let (ws, _response) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("websocket handshake should succeed");
    ws
}

pub fn envelope(message_type: &str, source: &str, payload: Value) -> Value {
    json!({
        "type": message_type,
        "timestamp": 1_700_000_000_000u64,
        "source": source,
        "payload": payload,
    })
}

pub async fn send_json(ws: &mut Client, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send should succeed");
}

// Next text frame parsed as JSON; `None` once the server closed the socket.
pub async fn next_json(ws: &mut Client) -> Option<Value> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a frame");
        match frame {
            Some(Ok(Message::Text(text))) => {
                return Some(serde_json::from_str(&text).expect("server sent invalid json"));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

// Skip text frames until the server closes; returns the close code and reason, if any.
pub async fn recv_close(ws: &mut Client) -> Option<(u16, String)> {
    loop {
        let frame = tokio::time::timeout(RECV_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for close");
        match frame {
            Some(Ok(Message::Close(Some(close)))) => {
                return Some((u16::from(close.code), String::from(&*close.reason)));
            }
            Some(Ok(Message::Close(None))) | None | Some(Err(_)) => return None,
            Some(Ok(_)) => continue,
        }
    }
}

pub async fn recv_json(ws: &mut Client) -> Value {
    next_json(ws).await.expect("connection closed unexpectedly")
}

// Skip frames until one of `message_type` arrives.
pub async fn recv_type(ws: &mut Client, message_type: &str) -> Value {
    loop {
        let value = recv_json(ws).await;
        if value["type"] == message_type {
            return value;
        }
    }
}

// Skip frames until a `state_sync` payload satisfies `accept`; returns that payload.
pub async fn recv_state_until(ws: &mut Client, accept: impl Fn(&Value) -> bool) -> Value {
    loop {
        let value = recv_type(ws, "state_sync").await;
        if accept(&value["payload"]) {
            return value["payload"].clone();
        }
    }
}

// Register `role` and wait for the acknowledgement.
pub async fn register(ws: &mut Client, role: &str, device_id: &str) -> Value {
    send_json(
        ws,
        envelope(
            "register",
            role,
            json!({"clientType": role, "deviceId": device_id, "deviceName": format!("{role} device")}),
        ),
    )
    .await;
    recv_json(ws).await
}

// Connect a TV and a Remote and wait until both observe the paired state.
pub async fn paired(addr: SocketAddr) -> (Client, Client) {
    let mut tv = connect(addr).await;
    let ack = register(&mut tv, "tv", "tv-1").await;
    assert_eq!(ack["type"], "ack");

    let mut remote = connect(addr).await;
    let ack = register(&mut remote, "remote", "remote-1").await;
    assert_eq!(ack["type"], "ack");

    recv_state_until(&mut tv, |state| state["fsmState"] == "ready").await;
    recv_state_until(&mut remote, |state| state["fsmState"] == "ready").await;
    (tv, remote)
}

pub async fn get_state(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{addr}/state"))
        .await
        .expect("request should succeed")
        .json()
        .await
        .expect("expected json body")
}
