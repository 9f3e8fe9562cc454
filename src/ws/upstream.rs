//! Upstream WebSocket connection.
//!
//! Each upstream runs in its own task. The session talks to it through a
//! bounded outbound queue (client → upstream) and receives `UpstreamEvent`s
//! back (upstream → client). Frames queued before the handshake completes
//! are flushed in order once it does. Dropping the handle closes the
//! upstream.
//!
//! Every handle carries a generation. Terminal events name the generation
//! they belong to, so a session can tell a replaced upstream's late close
//! from the close of its current one.

use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderName, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::net::ConnectionId;
use crate::ws::frame::ConnectFrame;

type UpstreamStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported upstream scheme '{0}'")]
    Scheme(String),

    #[error("invalid upstream request: {0}")]
    Request(#[source] tungstenite::Error),

    #[error("invalid upstream header: {0}")]
    InvalidHeader(String),

    #[error("upstream connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("upstream transport error: {0}")]
    Transport(#[source] tungstenite::Error),
}

/// Why a frame could not be queued for the upstream.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ForwardError {
    #[error("upstream queue is full")]
    Full,

    #[error("upstream is closed")]
    Closed,
}

/// Notifications from an upstream task to its session.
#[derive(Debug)]
pub enum UpstreamEvent {
    /// Text or binary frame to pass to the client unmodified.
    Frame(Message),
    /// The upstream failed to connect or broke mid-stream. The task has ended.
    Error {
        generation: u64,
        url: String,
        message: String,
    },
    /// The upstream closed the connection.
    Closed { generation: u64, url: String },
}

/// Session-side handle to a running upstream task.
#[derive(Debug)]
pub struct UpstreamHandle {
    generation: u64,
    url: String,
    outbound: mpsc::Sender<Message>,
}

impl UpstreamHandle {
    /// Start connecting to `target` in the background.
    pub fn spawn(
        target: ConnectFrame,
        events: mpsc::Sender<UpstreamEvent>,
        capacity: usize,
        connection_id: ConnectionId,
    ) -> Self {
        let (outbound, rx) = mpsc::channel(capacity);
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        let url = target.url.clone();
        let task = Task {
            target,
            generation,
            connection_id,
            events,
        };
        tokio::spawn(task.run(rx));
        Self {
            generation,
            url,
            outbound,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Queue a frame without waiting.
    pub fn forward(&self, frame: Message) -> Result<(), ForwardError> {
        self.outbound.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ForwardError::Full,
            TrySendError::Closed(_) => ForwardError::Closed,
        })
    }

    /// Close the upstream after flushing already queued frames.
    pub fn close(self) {
        tracing::debug!(url = %self.url, "Releasing upstream");
    }
}

/// Build the handshake request, attaching caller-supplied headers.
pub fn build_request(target: &ConnectFrame) -> Result<Request, UpstreamError> {
    let url = Url::parse(&target.url)?;
    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(UpstreamError::Scheme(url.scheme().to_string()));
    }

    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(UpstreamError::Request)?;

    for (name, value) in &target.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| UpstreamError::InvalidHeader(name.clone()))?;
        let header_value =
            HeaderValue::from_str(value).map_err(|_| UpstreamError::InvalidHeader(name.clone()))?;
        request.headers_mut().insert(header_name, header_value);
    }

    Ok(request)
}

async fn connect(target: &ConnectFrame) -> Result<UpstreamStream, UpstreamError> {
    let request = build_request(target)?;
    let (stream, _) = connect_async(request).await.map_err(UpstreamError::Connect)?;
    Ok(stream)
}

struct Task {
    target: ConnectFrame,
    generation: u64,
    connection_id: ConnectionId,
    events: mpsc::Sender<UpstreamEvent>,
}

impl Task {
    async fn run(self, mut outbound: mpsc::Receiver<Message>) {
        let id = self.connection_id;
        let url = self.target.url.as_str();

        let connected = tokio::select! {
            result = connect(&self.target) => result,
            _ = self.events.closed() => {
                tracing::debug!(connection_id = %id, url = %url, "Session ended before upstream opened");
                return;
            }
        };

        let stream = match connected {
            Ok(stream) => stream,
            Err(e) => {
                self.report(&e).await;
                return;
            }
        };

        tracing::info!(connection_id = %id, url = %url, "WS proxy open");
        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                frame = outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = write.send(frame).await {
                            self.report(&UpstreamError::Transport(e)).await;
                            break;
                        }
                    }
                    None => {
                        // Handle dropped: the client left or replaced this upstream.
                        let _ = write.send(Message::Close(None)).await;
                        tracing::debug!(connection_id = %id, url = %url, "Upstream closed by relay");
                        break;
                    }
                },
                incoming = read.next() => match incoming {
                    Some(Ok(frame @ (Message::Text(_) | Message::Binary(_)))) => {
                        if self.events.send(UpstreamEvent::Frame(frame)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        // No reconnect; the session keeps running without an upstream.
                        let _ = self
                            .events
                            .send(UpstreamEvent::Closed {
                                generation: self.generation,
                                url: url.to_string(),
                            })
                            .await;
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        self.report(&UpstreamError::Transport(e)).await;
                        break;
                    }
                },
            }
        }
    }

    async fn report(&self, error: &UpstreamError) {
        tracing::error!(
            connection_id = %self.connection_id,
            url = %self.target.url,
            error = %error,
            "WS proxy error"
        );
        let _ = self
            .events
            .send(UpstreamEvent::Error {
                generation: self.generation,
                url: self.target.url.clone(),
                message: error.to_string(),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn target(url: &str, headers: &[(&str, &str)]) -> ConnectFrame {
        ConnectFrame {
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn request_carries_headers() {
        let request = build_request(&target("ws://upstream.test/feed", &[("Authorization", "Bearer t")])).unwrap();
        assert_eq!(request.uri(), "ws://upstream.test/feed");
        assert_eq!(request.headers()["authorization"], "Bearer t");
    }

    #[test]
    fn rejects_non_websocket_url() {
        assert!(matches!(
            build_request(&target("not a url", &[])),
            Err(UpstreamError::Url(_))
        ));
        assert!(matches!(
            build_request(&target("http://upstream.test/feed", &[])),
            Err(UpstreamError::Scheme(ref s)) if s == "http"
        ));
    }

    #[test]
    fn rejects_invalid_header() {
        assert!(matches!(
            build_request(&target("ws://upstream.test", &[("bad header", "v")])),
            Err(UpstreamError::InvalidHeader(_))
        ));
    }

    #[tokio::test]
    async fn failed_connect_reports_error_and_closes_queue() {
        let (events_tx, mut events_rx) = mpsc::channel(8);
        let handle = UpstreamHandle::spawn(
            target("ws://127.0.0.1:1/", &[]),
            events_tx,
            8,
            ConnectionId::new(),
        );

        let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            UpstreamEvent::Error { generation, ref url, .. }
                if url == "ws://127.0.0.1:1/" && generation == handle.generation()
        ));

        tokio::time::timeout(Duration::from_secs(1), handle.outbound.closed())
            .await
            .unwrap();
        assert_eq!(
            handle.forward(Message::Text("late".into())),
            Err(ForwardError::Closed)
        );
    }

    #[tokio::test]
    async fn generations_are_distinct() {
        let (events_tx, _events_rx) = mpsc::channel(1);
        let a = UpstreamHandle::spawn(target("ws://127.0.0.1:1/", &[]), events_tx.clone(), 1, ConnectionId::new());
        let b = UpstreamHandle::spawn(target("ws://127.0.0.1:1/", &[]), events_tx, 1, ConnectionId::new());
        assert_ne!(a.generation(), b.generation());
    }

    #[tokio::test]
    async fn full_queue_rejects_frames_before_open() {
        // Accepts TCP but never answers the handshake, so the upstream stays unopened.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        let (events_tx, _events_rx) = mpsc::channel(8);
        let handle = UpstreamHandle::spawn(target(&url, &[]), events_tx, 1, ConnectionId::new());

        assert_eq!(handle.forward(Message::Text("first".into())), Ok(()));
        assert_eq!(
            handle.forward(Message::Text("second".into())),
            Err(ForwardError::Full)
        );
        drop(listener);
    }
}
