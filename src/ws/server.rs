//! WebSocket relay server setup.
//!
//! Upgrades are accepted on any path; each accepted client becomes a
//! session with its own `ConnectionId`.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::any,
    Router,
};
use tokio::net::TcpListener;

use crate::config::WsConfig;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionId;
use crate::ws::session::{self, SessionContext, SessionRegistry};

#[derive(Clone)]
struct WsState {
    sessions: SessionContext,
    shutdown: Shutdown,
}

/// WebSocket relay server.
pub struct WsServer {
    sessions: SessionContext,
}

impl WsServer {
    pub fn new(config: &WsConfig) -> Self {
        Self {
            sessions: SessionContext {
                registry: SessionRegistry::new(),
                report_upstream_errors: config.report_upstream_errors,
                queue_capacity: config.upstream_queue_capacity,
            },
        }
    }

    /// Registry of live upstreams, shared with every session.
    pub fn registry(&self) -> SessionRegistry {
        self.sessions.registry.clone()
    }

    /// Run the server until `shutdown` fires. Open sessions are closed too.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(port = addr.port(), address = %addr, "WsServer: start listening");

        let state = WsState {
            sessions: self.sessions,
            shutdown: shutdown.clone(),
        };
        let router = Router::new()
            .route("/", any(upgrade_handler))
            .route("/{*path}", any(upgrade_handler))
            .with_state(state);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("WsServer: stopped");
        Ok(())
    }
}

async fn upgrade_handler(State(state): State<WsState>, ws: WebSocketUpgrade) -> Response {
    let id = ConnectionId::new();

    ws.on_failed_upgrade(move |e| {
        tracing::warn!(connection_id = %id, error = %e, "WebSocket upgrade failed");
    })
    .on_upgrade(move |socket| session::run(socket, id, state.sessions, state.shutdown))
}
