//! Startup orchestration.
//!
//! # Responsibilities
//! - Build both servers from a validated configuration
//! - Bind both listeners before serving anything
//! - Run both servers until shutdown, failing as a unit
//!
//! # Design Decisions
//! - Fail fast: any bind error is fatal
//! - `EACCES` and `EADDRINUSE` are reported with a dedicated message

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::RelayConfig;
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::net::{self, BindError};
use crate::ws::{SessionRegistry, WsServer};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("HttpServer: {0}")]
    HttpBind(#[source] BindError),

    #[error("WsServer: {0}")]
    WsBind(#[source] BindError),

    #[error("failed to build downstream client: {0}")]
    Client(#[from] reqwest::Error),
}

impl StartupError {
    /// Bind failures with a dedicated message (privileged port, port taken).
    pub fn is_recognized(&self) -> bool {
        match self {
            StartupError::HttpBind(e) | StartupError::WsBind(e) => e.is_recognized(),
            StartupError::Client(_) => false,
        }
    }
}

/// Both servers, bound and ready to serve.
pub struct Relay {
    http: HttpServer,
    http_listener: TcpListener,
    ws: WsServer,
    ws_listener: TcpListener,
}

impl Relay {
    /// Build both servers and bind both listeners.
    pub async fn bind(config: &RelayConfig) -> Result<Self, StartupError> {
        let http = HttpServer::new(&config.http)?;
        let ws = WsServer::new(&config.ws);

        let http_listener = net::bind(&config.http.bind_address)
            .await
            .map_err(StartupError::HttpBind)?;
        let ws_listener = net::bind(&config.ws.bind_address)
            .await
            .map_err(StartupError::WsBind)?;

        Ok(Self {
            http,
            http_listener,
            ws,
            ws_listener,
        })
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    pub fn ws_addr(&self) -> std::io::Result<SocketAddr> {
        self.ws_listener.local_addr()
    }

    pub fn sessions(&self) -> SessionRegistry {
        self.ws.registry()
    }

    /// Serve both listeners until `shutdown` fires or one of them fails.
    pub async fn serve(self, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let http = self.http.run(self.http_listener, shutdown.clone());
        let ws = self.ws.run(self.ws_listener, shutdown.clone());

        let result = tokio::try_join!(http, ws).map(|_| ());
        if result.is_err() {
            // Wake whichever side is still running.
            shutdown.trigger();
        }
        result
    }
}
