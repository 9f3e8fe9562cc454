//! Per-client relay sessions.
//!
//! # Data Flow
//! ```text
//! client frame ──► classify ──► connect: spawn UpstreamHandle, replace old
//!                            └► data:    registry.forward(id) ──► upstream
//!
//! upstream frame ──► UpstreamEvent::Frame ──► client (unmodified)
//! ```
//!
//! Upstream handles live in a `SessionRegistry` keyed by `ConnectionId`,
//! so concurrent clients never share an upstream.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use dashmap::DashMap;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use crate::lifecycle::Shutdown;
use crate::net::ConnectionId;
use crate::ws::frame::{self, ClientFrame};
use crate::ws::upstream::{ForwardError, UpstreamEvent, UpstreamHandle};

/// Live upstreams, one per client connection at most.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<ConnectionId, UpstreamHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handle` as the upstream of `id`, returning the one it replaces.
    pub fn attach(&self, id: ConnectionId, handle: UpstreamHandle) -> Option<UpstreamHandle> {
        self.sessions.insert(id, handle)
    }

    /// Remove and return the upstream of `id`.
    pub fn detach(&self, id: ConnectionId) -> Option<UpstreamHandle> {
        self.sessions.remove(&id).map(|(_, handle)| handle)
    }

    /// Remove the upstream of `id` only if it is still `generation`.
    pub fn detach_generation(&self, id: ConnectionId, generation: u64) -> Option<UpstreamHandle> {
        self.sessions
            .remove_if(&id, |_, handle| handle.generation() == generation)
            .map(|(_, handle)| handle)
    }

    /// Queue a frame for the upstream of `id`. `None` when there is no upstream.
    pub fn forward(
        &self,
        id: ConnectionId,
        frame: UpstreamMessage,
    ) -> Option<Result<(), ForwardError>> {
        self.sessions.get(&id).map(|handle| handle.forward(frame))
    }

    pub fn upstream_url(&self, id: ConnectionId) -> Option<String> {
        self.sessions.get(&id).map(|handle| handle.url().to_string())
    }

    /// Number of clients that currently hold an upstream.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Settings shared by every session of a server.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub registry: SessionRegistry,
    pub report_upstream_errors: bool,
    pub queue_capacity: usize,
}

struct Session {
    id: ConnectionId,
    ctx: SessionContext,
    events: mpsc::Sender<UpstreamEvent>,
}

/// Relay one client connection until it closes or shutdown fires.
pub async fn run(
    socket: WebSocket,
    id: ConnectionId,
    ctx: SessionContext,
    shutdown: Shutdown,
) {
    tracing::info!(connection_id = %id, "WS open");

    let (mut client_tx, mut client_rx) = socket.split();
    let (events_tx, mut events_rx) = mpsc::channel(ctx.queue_capacity);
    let session = Session {
        id,
        ctx,
        events: events_tx,
    };

    let shutdown = shutdown.wait();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            incoming = client_rx.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(msg)) => session.on_client_frame(msg),
                Some(Err(e)) => {
                    tracing::debug!(connection_id = %id, error = %e, "Client socket error");
                    break;
                }
            },
            Some(event) = events_rx.recv() => {
                if session.on_upstream_event(event, &mut client_tx).await.is_err() {
                    break;
                }
            }
            _ = &mut shutdown => {
                let _ = client_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }

    tracing::info!(connection_id = %id, "WS close");
    if let Some(upstream) = session.ctx.registry.detach(id) {
        upstream.close();
    }
}

impl Session {
    fn on_client_frame(&self, msg: Message) {
        let payload: &[u8] = match &msg {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(bytes) => bytes.as_ref(),
            // Pings are answered by axum; pongs carry nothing to relay.
            _ => return,
        };

        tracing::debug!(connection_id = %self.id, bytes = payload.len(), "received frame");

        match frame::classify(payload) {
            Ok(ClientFrame::Connect(target)) => {
                tracing::info!(connection_id = %self.id, url = %target.url, "Opening upstream");
                let handle = UpstreamHandle::spawn(
                    target,
                    self.events.clone(),
                    self.ctx.queue_capacity,
                    self.id,
                );
                if let Some(previous) = self.ctx.registry.attach(self.id, handle) {
                    tracing::info!(connection_id = %self.id, url = %previous.url(), "Replacing upstream");
                    previous.close();
                }
            }
            Ok(ClientFrame::Data) => {
                let Some(frame) = to_upstream(msg) else {
                    return;
                };
                match self.ctx.registry.forward(self.id, frame) {
                    Some(Ok(())) => {}
                    Some(Err(e)) => {
                        tracing::warn!(connection_id = %self.id, error = %e, "Dropping frame for upstream");
                    }
                    None => {
                        tracing::debug!(connection_id = %self.id, "No upstream, dropping frame");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(connection_id = %self.id, error = %e, "Dropping malformed frame");
            }
        }
    }

    async fn on_upstream_event(
        &self,
        event: UpstreamEvent,
        client_tx: &mut SplitSink<WebSocket, Message>,
    ) -> Result<(), axum::Error> {
        match event {
            UpstreamEvent::Frame(frame) => {
                if let Some(msg) = to_client(frame) {
                    client_tx.send(msg).await?;
                }
            }
            UpstreamEvent::Error {
                generation,
                url,
                message,
            } => {
                self.ctx.registry.detach_generation(self.id, generation);
                if self.ctx.report_upstream_errors {
                    let notice = frame::upstream_error(&url, &message);
                    client_tx.send(Message::Text(notice.into())).await?;
                }
            }
            UpstreamEvent::Closed { generation, url } => {
                tracing::info!(connection_id = %self.id, url = %url, "WS proxy close");
                self.ctx.registry.detach_generation(self.id, generation);
            }
        }
        Ok(())
    }
}

fn to_upstream(msg: Message) -> Option<UpstreamMessage> {
    match msg {
        Message::Text(text) => Some(UpstreamMessage::Text(text.as_str().to_owned().into())),
        Message::Binary(bytes) => Some(UpstreamMessage::Binary(bytes)),
        _ => None,
    }
}

fn to_client(msg: UpstreamMessage) -> Option<Message> {
    match msg {
        UpstreamMessage::Text(text) => Some(Message::Text(text.as_str().to_owned().into())),
        UpstreamMessage::Binary(bytes) => Some(Message::Binary(bytes)),
        _ => None,
    }
}
