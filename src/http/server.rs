//! HTTP relay server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the single `/proxy` route
//! - Wire up middleware (CORS, body limit, request ID, tracing)
//! - Serve on a pre-bound listener until shutdown

use std::time::Duration;

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::HttpConfig;
use crate::http::client::DownstreamClient;
use crate::http::proxy::proxy_handler;
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: DownstreamClient,
}

/// HTTP relay server.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        let client = DownstreamClient::new(config.downstream_timeout_secs.map(Duration::from_secs))?;
        Ok(Self::with_client(config, client))
    }

    /// Create a server around an existing downstream client.
    pub fn with_client(config: &HttpConfig, client: DownstreamClient) -> Self {
        let state = AppState { client };
        Self {
            router: Self::build_router(config, state),
        }
    }

    fn build_router(config: &HttpConfig, state: AppState) -> Router {
        Router::new()
            .route("/proxy", post(proxy_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.max_body_bytes))
            .layer(CorsLayer::permissive())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(port = addr.port(), address = %addr, "HttpServer: start listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("HttpServer: stopped");
        Ok(())
    }
}
