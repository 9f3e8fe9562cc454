//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, RawQuery},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    accept_hdr_async, connect_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};

use relay_proxy::config::RelayConfig;
use relay_proxy::lifecycle::{startup::Relay, Shutdown};
use relay_proxy::ws::SessionRegistry;

pub const WAIT: Duration = Duration::from_secs(5);

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A relay serving on loopback ports.
pub struct RunningRelay {
    pub http_addr: SocketAddr,
    pub ws_addr: SocketAddr,
    pub sessions: SessionRegistry,
    pub shutdown: Shutdown,
}

impl RunningRelay {
    pub fn proxy_url(&self) -> String {
        format!("http://{}/proxy", self.http_addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.ws_addr)
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn loopback_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.http.bind_address = "127.0.0.1:0".into();
    config.ws.bind_address = "127.0.0.1:0".into();
    config
}

pub async fn start_relay() -> RunningRelay {
    start_relay_with(loopback_config()).await
}

pub async fn start_relay_with(config: RelayConfig) -> RunningRelay {
    let relay = Relay::bind(&config).await.unwrap();
    let running = RunningRelay {
        http_addr: relay.http_addr().unwrap(),
        ws_addr: relay.ws_addr().unwrap(),
        sessions: relay.sessions(),
        shutdown: Shutdown::new(),
    };

    let shutdown = running.shutdown.clone();
    tokio::spawn(async move {
        let _ = relay.serve(shutdown).await;
    });
    running
}

/// HTTP backend that reports what it received.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl MockBackend {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Routes:
/// - `/x` → `200 {"ok":true}`
/// - `/echo` (any method) → `200 {method, headers, query, body}`
/// - `/status/{code}` → `code {"code": code}`
/// - `/text` → `200 hello`
/// - `/empty` → `204`
/// - `/slow` → `200` after three seconds
pub async fn start_mock_backend() -> MockBackend {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    let app = Router::new()
        .route("/x", get(|| async { Json(json!({ "ok": true })) }))
        .route("/echo", any(echo))
        .route(
            "/status/{code}",
            any(|Path(code): Path<u16>| async move {
                let status = StatusCode::from_u16(code).unwrap_or(StatusCode::IM_A_TEAPOT);
                (status, Json(json!({ "code": code })))
            }),
        )
        .route("/text", get(|| async { "hello" }))
        .route("/empty", any(|| async { StatusCode::NO_CONTENT }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({ "late": true }))
            }),
        )
        .layer(axum::middleware::from_fn(
            move |req: axum::extract::Request, next: axum::middleware::Next| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    next.run(req).await
                }
            },
        ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockBackend { addr, hits }
}

async fn echo(method: Method, headers: HeaderMap, RawQuery(query): RawQuery, body: Bytes) -> impl IntoResponse {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    Json(json!({
        "method": method.as_str(),
        "headers": headers,
        "query": query,
        "body": body,
    }))
}

/// What a mock upstream observed.
#[derive(Debug)]
pub enum Seen {
    Handshake(HashMap<String, String>),
    Frame(Message),
    Closed,
}

/// WebSocket upstream that echoes text and binary frames.
///
/// A text frame `{"burst": n}` is not echoed; instead the upstream sends
/// `{"seq": 0}` .. `{"seq": n-1}` in order. `{"hangup": true}` makes the
/// upstream close the connection itself.
pub struct MockUpstream {
    pub addr: SocketAddr,
    pub seen: mpsc::UnboundedReceiver<Seen>,
}

impl MockUpstream {
    pub fn url(&self) -> String {
        format!("ws://{}/", self.addr)
    }

    pub async fn next(&mut self) -> Seen {
        tokio::time::timeout(WAIT, self.seen.recv())
            .await
            .expect("upstream observed nothing")
            .expect("upstream task ended")
    }

    /// Skip the handshake and return the next frame.
    pub async fn next_frame(&mut self) -> Message {
        loop {
            match self.next().await {
                Seen::Frame(frame) => return frame,
                Seen::Handshake(_) => continue,
                Seen::Closed => panic!("upstream closed while waiting for a frame"),
            }
        }
    }

    pub async fn wait_closed(&mut self) {
        loop {
            if let Seen::Closed = self.next().await {
                return;
            }
        }
    }
}

pub async fn start_mock_upstream() -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, seen) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let handshake_tx = tx.clone();
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    let headers: HashMap<String, String> = req
                        .headers()
                        .iter()
                        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                        .collect();
                    let _ = handshake_tx.send(Seen::Handshake(headers));
                    Ok(resp)
                };
                let Ok(mut ws) = accept_hdr_async(socket, callback).await else {
                    return;
                };

                while let Some(Ok(frame)) = ws.next().await {
                    let command = match &frame {
                        Message::Text(text) => serde_json::from_str::<Value>(text.as_str()).ok(),
                        Message::Binary(_) => None,
                        Message::Close(_) => break,
                        _ => continue,
                    };
                    let _ = tx.send(Seen::Frame(frame.clone()));

                    let command = command.unwrap_or(Value::Null);
                    if command.get("hangup") == Some(&Value::Bool(true)) {
                        let _ = ws.close(None).await;
                        break;
                    }
                    let burst = command.get("burst").and_then(Value::as_u64);

                    let sent = match burst {
                        Some(n) => {
                            let mut ok = true;
                            for seq in 0..n {
                                let msg = json!({ "seq": seq }).to_string();
                                if ws.send(Message::Text(msg.into())).await.is_err() {
                                    ok = false;
                                    break;
                                }
                            }
                            ok
                        }
                        None => ws.send(frame).await.is_ok(),
                    };
                    if !sent {
                        break;
                    }
                }
                let _ = tx.send(Seen::Closed);
            });
        }
    });

    MockUpstream { addr, seen }
}

pub async fn connect_client(relay: &RunningRelay) -> Client {
    let (client, _) = connect_async(relay.ws_url()).await.unwrap();
    client
}

pub async fn send_text(client: &mut Client, text: impl Into<String>) {
    let text: String = text.into();
    client.send(Message::Text(text.into())).await.unwrap();
}

/// Next text or binary frame from the relay.
pub async fn next_frame(client: &mut Client) -> Message {
    loop {
        let frame = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("relay sent nothing")
            .expect("relay closed the stream")
            .unwrap();
        match frame {
            Message::Text(_) | Message::Binary(_) => return frame,
            _ => continue,
        }
    }
}

pub async fn next_text(client: &mut Client) -> String {
    match next_frame(client).await {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("expected text frame, got {:?}", other),
    }
}

/// Poll until `check` holds or the wait elapses.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
